// Both bindings hold the same heap address. Dropping through each one
// frees the same cell twice, and nothing stops it.

fn main() {
    let p1 = Box::new(42);
    let p2 = p1;
    drop(p2);
    drop(p1);
    println!("p1 = {}, p2 = {}", p1, p2);
}
