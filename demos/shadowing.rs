// Shadowing binds a new slot; the old one keeps its value.

fn main() {
    let x = 5;
    let x = x * 2;
    println!("x = {}", x);
}
