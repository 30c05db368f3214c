// Every call pushes a frame below its caller's; watch the stack grow
// and shrink as the recursion unwinds.

fn fib(n: i32) -> i32 {
    if n < 2 {
        return n;
    }
    return fib(n - 1) + fib(n - 2);
}

fn main() {
    let r = fib(6);
    println!("fib(6) = {}", r);
}
