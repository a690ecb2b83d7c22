//! Last observed gateway sequence number.
//!
//! Written by the receive loop, read by the heartbeat task without taking
//! the write lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Nullable, non-decreasing sequence counter
#[derive(Debug, Default)]
pub struct Sequence {
    value: AtomicU64,
    set: AtomicBool,
}

impl Sequence {
    /// Create an unset sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an observed value by taking the maximum; returns the merged value
    pub fn merge(&self, observed: Option<u64>) -> Option<u64> {
        if let Some(value) = observed {
            // value must land before the flag so readers never see set=true with a stale 0
            self.value.fetch_max(value, Ordering::AcqRel);
            self.set.store(true, Ordering::Release);
        }
        self.get()
    }

    /// Current value, `None` until the first sequence arrives
    pub fn get(&self) -> Option<u64> {
        if self.set.load(Ordering::Acquire) {
            Some(self.value.load(Ordering::Acquire))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_unset_until_first_value() {
        let seq = Sequence::new();
        assert_eq!(seq.get(), None);
        assert_eq!(seq.merge(None), None);
        assert_eq!(seq.merge(Some(0)), Some(0));
        assert_eq!(seq.merge(None), Some(0));
    }

    #[test]
    fn test_out_of_order_keeps_maximum() {
        let seq = Sequence::new();
        let observed = [3, 7, 5, 1, 7, 12, 11];
        for value in observed {
            seq.merge(Some(value));
        }
        assert_eq!(seq.get(), observed.iter().copied().max());
    }

    #[test]
    fn test_concurrent_merges() {
        let seq = Arc::new(Sequence::new());
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let seq = Arc::clone(&seq);
                std::thread::spawn(move || {
                    for i in 0..1000u64 {
                        seq.merge(Some(i * 4 + t));
                        assert!(seq.get().is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(seq.get(), Some(3999));
    }
}
