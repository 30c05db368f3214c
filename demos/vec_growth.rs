// A Vec is three stack words (cap, len, ptr) plus a heap buffer.
// Pushing into a full buffer allocates one twice as large, copies the
// elements over and frees the old run.

fn main() {
    let mut v = vec![1, 2, 3];
    v.push(4);
    v.push(5);
    println!("{:?} has len {}", v, v.len());
}
