//! Instrumented demo workload profiled by `sampling-prof record`.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::frame;
use crate::profiling::ShadowStacks;

/// Naive Fibonacci, one shadow frame per call
pub fn fib(stacks: &ShadowStacks, n: u32) -> u64 {
    let _frame = stacks.enter(frame!("workload::fib"));
    if n < 2 {
        return u64::from(n);
    }
    fib(stacks, n - 1) + fib(stacks, n - 2)
}

/// Sum of digits of `value`, a cheap second leaf
pub fn digit_sum(stacks: &ShadowStacks, mut value: u64) -> u64 {
    let _frame = stacks.enter(frame!("workload::digit_sum"));
    let mut sum = 0;
    while value > 0 {
        sum += value % 10;
        value /= 10;
    }
    sum
}

/// Run rounds of `fib(depth)` until `stop` is set; returns the rounds completed
pub fn run(stacks: &ShadowStacks, depth: u32, stop: &AtomicBool) -> u64 {
    let _frame = stacks.enter(frame!("workload::run"));
    let mut rounds = 0;
    while !stop.load(Ordering::Relaxed) {
        let value = fib(stacks, depth);
        digit_sum(stacks, value);
        rounds += 1;
    }
    rounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ThreadHandle;
    use crate::profiling::StackCapture;

    #[test]
    fn test_fib_values() {
        let stacks = ShadowStacks::new();
        assert_eq!(fib(&stacks, 0), 0);
        assert_eq!(fib(&stacks, 1), 1);
        assert_eq!(fib(&stacks, 10), 55);
    }

    #[test]
    fn test_frames_popped_after_return() {
        let stacks = ShadowStacks::new();
        fib(&stacks, 5);
        assert!(stacks.capture(ThreadHandle::current()).unwrap().is_empty());
    }

    #[test]
    fn test_digit_sum() {
        assert_eq!(digit_sum(&ShadowStacks::new(), 6765), 24);
    }

    #[test]
    fn test_run_stops_when_flagged() {
        let stop = AtomicBool::new(true);
        assert_eq!(run(&ShadowStacks::new(), 3, &stop), 0);
    }
}
