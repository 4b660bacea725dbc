//! Lock-free cooling trigger
//!
//! Counts ticks down from the cooling period; exactly one caller sees the
//! counter reach zero per period and runs the cooling pass.

use std::sync::atomic::{AtomicI32, Ordering};

/// Periodic gate shared by all worker threads
#[derive(Debug)]
pub struct CoolingGate {
    remaining: AtomicI32,
    period: i32,
}

impl CoolingGate {
    pub fn new(period: i32) -> Self {
        let period = period.max(1);
        Self {
            remaining: AtomicI32::new(period),
            period,
        }
    }

    /// Count one tick; true for the caller that completes a period
    ///
    /// The decrement never takes the counter below zero: a caller that
    /// finds it at zero lost the race to the thread now re-arming it, and
    /// retries its decrement against the new period.
    pub fn tick(&self) -> bool {
        loop {
            let taken = self
                .remaining
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| (r > 0).then(|| r - 1));
            match taken {
                Ok(1) => {
                    self.remaining.fetch_add(self.period, Ordering::AcqRel);
                    return true;
                }
                Ok(_) => return false,
                Err(_) => std::hint::spin_loop(),
            }
        }
    }

    /// Ticks left before the next cooling pass
    pub fn remaining(&self) -> i32 {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn period(&self) -> i32 {
        self.period
    }
}
