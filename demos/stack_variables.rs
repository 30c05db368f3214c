// Locals live in main's frame at the top of memory.
// Each `let` takes the next free slot below the previous one.

fn main() {
    let a = 1 + 1;
    let b = a * 2;
    let c = b - a;
    println!("a = {}, b = {}, c = {}", a, b, c);
}
