// Pointer arithmetic walks off `guard` and into its neighbour.

fn main() {
    let secret = 42;
    let guard = 7;
    let p = &guard;
    let q = p + 1;
    *q = 0;
    println!("secret = {}", secret);
}
