//! Once-flag: `not-yet-run -> running -> done` with exactly one executor.

use crate::sys::{RawOnce, RawOnceOps};

/// Statically initializable one-shot gate.
#[repr(transparent)]
pub struct OnceFlag {
    raw: RawOnce,
}

/// Initializer for a flag that has not run.
pub const ONCE_FLAG_INIT: OnceFlag = OnceFlag::new();

impl Default for OnceFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl OnceFlag {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: <RawOnce as RawOnceOps>::INIT,
        }
    }

    /// Run `f` if no call on this flag has completed yet. Every caller
    /// returns only after the winning call finished.
    pub fn call_once(&self, f: impl FnOnce()) {
        self.raw.call_once(f);
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.raw.is_completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::time::Duration;

    #[test]
    fn static_flag_runs_once() {
        static FLAG: OnceFlag = ONCE_FLAG_INIT;
        static COUNT: AtomicUsize = AtomicUsize::new(0);
        for _ in 0..3 {
            FLAG.call_once(|| {
                COUNT.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(COUNT.load(Ordering::SeqCst), 1);
        assert!(FLAG.is_completed());
    }

    #[test]
    fn racing_callers_see_completed_work() {
        let flag = Arc::new(OnceFlag::new());
        let count = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let flag = Arc::clone(&flag);
                let count = Arc::clone(&count);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    flag.call_once(|| {
                        std::thread::sleep(Duration::from_millis(10));
                        count.fetch_add(1, Ordering::SeqCst);
                    });
                    // the initializer finished before any caller returns
                    count.load(Ordering::SeqCst)
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 1);
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
