// Passing `&v` hands over the address of the metadata.
// Passing `v` copies the three metadata words into the callee's frame;
// both copies then point at the same heap buffer.

fn total(v: &Vec<i32>) -> i32 {
    let mut sum = 0;
    let mut i = 0;
    while i < v.len() {
        sum += v[i];
        i += 1;
    }
    return sum;
}

fn take(v: Vec<i32>) -> i32 {
    return v.len();
}

fn main() {
    let v = vec![3, 4, 5];
    let s = total(&v);
    let n = take(v);
    println!("sum = {}, len = {}", s, n);
}
