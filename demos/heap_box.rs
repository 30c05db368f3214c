// A Box is one stack slot holding the address of one heap cell.

fn main() {
    let b = Box::new(41);
    *b += 1;
    println!("*b = {}", *b);

    // clone copies the pointee into a fresh heap cell
    let c = b.clone();
    drop(b);
    println!("clone still holds {}", *c);
}
