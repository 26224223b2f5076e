//! Per-file progress line with elapsed and estimated remaining time.

use std::fmt;
use std::time::Duration;

/// Snapshot taken just before file `index` (1-based) starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub index: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl Progress {
    pub fn new(index: usize, total: usize, elapsed: Duration) -> Self {
        Self {
            index,
            total,
            elapsed,
        }
    }

    /// Files finished before this one
    pub fn completed(&self) -> usize {
        self.index.saturating_sub(1)
    }

    /// Percentage of files already processed, excluding the current one
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed() as f64 / self.total as f64 * 100.0
    }

    /// Average time so far times files left; unknown for the first file
    pub fn estimated_remaining(&self) -> Option<Duration> {
        let done = self.completed();
        if done == 0 {
            return None;
        }
        let per_file = self.elapsed.as_secs_f64() / done as f64;
        let left = self.total.saturating_sub(done) as f64;
        Some(Duration::from_secs_f64(per_file * left))
    }

    /// `elapsed …, est. remaining …`, once there is something to average
    pub fn timing(&self) -> Option<String> {
        self.estimated_remaining().map(|remaining| {
            format!(
                "elapsed {:.1}s, est. remaining {:.1}s",
                self.elapsed.as_secs_f64(),
                remaining.as_secs_f64()
            )
        })
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{} - {:.1}%]",
            self.index,
            self.total,
            self.percent_complete()
        )
    }
}
