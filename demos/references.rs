// A reference is the address of another stack slot.

fn bump(x: &mut i32) {
    *x += 1;
}

fn main() {
    let mut n = 5;
    let r = &n;
    bump(&mut n);
    println!("n = {}, *r = {}", n, *r);
}
