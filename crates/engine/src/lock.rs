//! Logical per-job-type locks.
//!
//! The only cross-job coordination primitive: a job holds the lock for its
//! (job_type, direction) key for its whole run, and a second job with the
//! same key fails fast with `already_running`. Guards release on drop, so
//! a panicking job cannot strand its key.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use parcelsync_core::jobs::JobType;

/// Registry of currently held job locks.
#[derive(Debug, Default)]
pub struct JobLockRegistry {
    held: Mutex<HashSet<String>>,
}

impl JobLockRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Lock key for a job type: job type plus direction.
    pub fn key_for(job_type: JobType) -> String {
        format!("{}:{:?}", job_type.as_str(), job_type.direction())
    }

    /// Try to acquire the lock for a job type. `None` means a job with the
    /// same key is already running.
    pub fn try_acquire(self: &Arc<Self>, job_type: JobType) -> Option<JobLockGuard> {
        let key = Self::key_for(job_type);
        let mut held = self.held.lock().expect("lock registry poisoned");
        if !held.insert(key.clone()) {
            return None;
        }
        Some(JobLockGuard {
            registry: Arc::clone(self),
            key,
        })
    }

    fn release(&self, key: &str) {
        let mut held = self.held.lock().expect("lock registry poisoned");
        held.remove(key);
    }
}

/// RAII guard for a held job lock.
#[derive(Debug)]
pub struct JobLockGuard {
    registry: Arc<JobLockRegistry>,
    key: String,
}

impl Drop for JobLockGuard {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_of_same_key_fails() {
        let registry = JobLockRegistry::new();
        let guard = registry.try_acquire(JobType::IncrementalSync);
        assert!(guard.is_some());
        assert!(registry.try_acquire(JobType::IncrementalSync).is_none());
    }

    #[test]
    fn different_job_types_do_not_conflict() {
        let registry = JobLockRegistry::new();
        let _down = registry.try_acquire(JobType::DownSync).unwrap();
        assert!(registry.try_acquire(JobType::UpSync).is_some());
    }

    #[test]
    fn drop_releases_the_lock() {
        let registry = JobLockRegistry::new();
        {
            let _guard = registry.try_acquire(JobType::FullSync).unwrap();
            assert!(registry.try_acquire(JobType::FullSync).is_none());
        }
        assert!(registry.try_acquire(JobType::FullSync).is_some());
    }
}
