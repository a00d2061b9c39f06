//! Parallelism estimation

use std::thread;

/// Chooses the degree of parallelism for a plan
pub trait ParallelProcessor: Send + Sync {
    fn calculate_optimal_parallelism(&self) -> usize;
}

/// Available CPU parallelism, optionally capped
#[derive(Debug, Clone, Default)]
pub struct CpuParallelism {
    cap: Option<usize>,
}

impl CpuParallelism {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cap(cap: usize) -> Self {
        Self { cap: Some(cap.max(1)) }
    }
}

impl ParallelProcessor for CpuParallelism {
    fn calculate_optimal_parallelism(&self) -> usize {
        let cpus = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        match self.cap {
            Some(cap) => cpus.min(cap),
            None => cpus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_least_one() {
        assert!(CpuParallelism::new().calculate_optimal_parallelism() >= 1);
    }

    #[test]
    fn test_cap() {
        assert_eq!(CpuParallelism::with_cap(1).calculate_optimal_parallelism(), 1);
        assert_eq!(CpuParallelism::with_cap(0).calculate_optimal_parallelism(), 1);
    }
}
