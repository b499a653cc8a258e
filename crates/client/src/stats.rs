//! Archiver statistics.

use std::fmt;
use std::time::Duration;

/// One push attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadStat {
    pub duration: Duration,
    pub size: i64,
}

/// Aggregate statistics of an archiver run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Sizes of items already present on the server.
    pub hits: Vec<i64>,
    /// Sizes of items the server was missing.
    pub misses: Vec<i64>,
    /// One record per push attempt, successful or not.
    pub pushed: Vec<UploadStat>,
}

impl Stats {
    pub fn total_hits(&self) -> i64 {
        self.hits.iter().sum()
    }

    pub fn total_misses(&self) -> i64 {
        self.misses.iter().sum()
    }

    pub fn total_pushed(&self) -> i64 {
        self.pushed.iter().map(|p| p.size).sum()
    }

    /// Sum of the durations of all push attempts.
    pub fn push_time(&self) -> Duration {
        self.pushed.iter().map(|p| p.duration).sum()
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits: {} ({} bytes), misses: {} ({} bytes), pushed: {} ({} bytes in {:.2?})",
            self.hits.len(),
            self.total_hits(),
            self.misses.len(),
            self.total_misses(),
            self.pushed.len(),
            self.total_pushed(),
            self.push_time()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals() {
        let stats = Stats {
            hits: vec![3, 4],
            misses: vec![10],
            pushed: vec![
                UploadStat {
                    duration: Duration::from_millis(5),
                    size: 10,
                },
                UploadStat {
                    duration: Duration::from_millis(7),
                    size: 1,
                },
            ],
        };
        assert_eq!(stats.total_hits(), 7);
        assert_eq!(stats.total_misses(), 10);
        assert_eq!(stats.total_pushed(), 11);
        assert_eq!(stats.push_time(), Duration::from_millis(12));
        assert!(stats.to_string().starts_with("hits: 2 (7 bytes), misses: 1 (10 bytes)"));
    }
}
