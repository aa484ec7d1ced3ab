//! Requests-per-minute and tokens-per-minute limiters.
//!
//! Both keep a one-minute window: when the budget inside the current
//! window is exhausted, `wait` sleeps until the window rolls over. A
//! single request larger than the whole token budget is admitted alone
//! after a rollover rather than blocking forever.

use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

struct Window {
    started: Instant,
    counter: usize,
}

/// Requests-per-minute limiter.
pub struct Rpm {
    limit: usize,
    window: Mutex<Window>,
}

impl Rpm {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            window: Mutex::new(Window {
                started: Instant::now(),
                counter: 0,
            }),
        }
    }

    /// Count one request, sleeping past the window edge if the budget is
    /// spent.
    pub async fn wait(&self) {
        loop {
            let sleep_for = {
                let mut w = self.window.lock().unwrap_or_else(|e| e.into_inner());
                let elapsed = w.started.elapsed();
                if elapsed >= WINDOW {
                    w.started = Instant::now();
                    w.counter = 0;
                }
                if w.counter < self.limit {
                    w.counter += 1;
                    return;
                }
                WINDOW.saturating_sub(elapsed)
            };
            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Requests counted in the current window.
    pub fn current(&self) -> usize {
        self.window
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .counter
    }
}

/// Tokens-per-minute limiter.
pub struct Tpm {
    limit: usize,
    window: Mutex<Window>,
}

impl Tpm {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            window: Mutex::new(Window {
                started: Instant::now(),
                counter: 0,
            }),
        }
    }

    /// Count `tokens`, sleeping past the window edge when the addition
    /// would exceed the budget.
    pub async fn wait(&self, tokens: usize) {
        loop {
            let sleep_for = {
                let mut w = self.window.lock().unwrap_or_else(|e| e.into_inner());
                let elapsed = w.started.elapsed();
                if elapsed >= WINDOW {
                    w.started = Instant::now();
                    w.counter = 0;
                }
                if w.counter + tokens <= self.limit || w.counter == 0 {
                    // an oversized single request is admitted into a
                    // fresh window rather than waiting forever
                    w.counter += tokens;
                    return;
                }
                WINDOW.saturating_sub(elapsed)
            };
            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Tokens counted in the current window.
    pub fn current(&self) -> usize {
        self.window
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rpm_counts_requests() {
        let rpm = Rpm::new(2);
        rpm.wait().await;
        assert_eq!(rpm.current(), 1);
        rpm.wait().await;
        assert_eq!(rpm.current(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rpm_blocks_until_window_rolls() {
        let rpm = Rpm::new(1);
        rpm.wait().await;
        // second request needs the next window; paused time makes the
        // sleep instantaneous while preserving the rollover logic
        rpm.wait().await;
        assert_eq!(rpm.current(), 1);
    }

    #[tokio::test]
    async fn tpm_accumulates_within_budget() {
        let tpm = Tpm::new(10);
        tpm.wait(5).await;
        assert_eq!(tpm.current(), 5);
        tpm.wait(5).await;
        assert_eq!(tpm.current(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn tpm_resets_after_overflow() {
        let tpm = Tpm::new(10);
        tpm.wait(5).await;
        tpm.wait(6).await;
        assert_eq!(tpm.current(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_request_is_admitted_alone() {
        let tpm = Tpm::new(4);
        tpm.wait(9).await;
        assert_eq!(tpm.current(), 9);
    }
}
