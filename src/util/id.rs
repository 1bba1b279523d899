//! Process-unique identifier generation
//!
//! Identifiers keep the `prefix_<number>` wire shape but draw from a single
//! monotonic counter seeded with the wall clock, so rapid re-entry can never
//! mint the same id twice within a process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::util::time::unix_nanos;

fn counter() -> &'static AtomicU64 {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    COUNTER.get_or_init(|| AtomicU64::new(unix_nanos()))
}

/// Mint the next id with the given prefix, e.g. `t_1759161600123456789`.
pub fn next_id(prefix: &str) -> String {
    format!("{}_{}", prefix, counter().fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = next_id("t");
        let b = next_id("t");
        assert!(a.starts_with("t_"));
        assert!(b.starts_with("t_"));
        assert_ne!(a, b);
    }

    #[test]
    fn ids_are_monotonic() {
        let a: u64 = next_id("m")[2..].parse().unwrap();
        let b: u64 = next_id("m")[2..].parse().unwrap();
        assert!(b > a);
    }
}
