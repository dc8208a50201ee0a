//! Bookkeeping for command invocations in flight.
//!
//! Every `CallFunction` occupies a slot for as long as its callback runs.
//! Slots are reused once freed, so indices stay small. A job that outlives
//! the soft timeout is flagged as unhealthy and left running.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{info, warn};

use crate::types::Value;

#[derive(Debug, Clone)]
pub struct Job {
    pub command: String,
    pub started: Instant,
    pub healthy: bool,
}

/// Snapshot of a job for listing.
#[derive(Debug, Clone, PartialEq)]
pub struct JobInfo {
    pub index: usize,
    pub command: String,
    pub healthy: bool,
    pub elapsed: Duration,
}

impl JobInfo {
    pub fn to_value(&self) -> Value {
        json!({
            "index": self.index,
            "command": self.command,
            "healthy": self.healthy,
            "elapsed_ms": self.elapsed.as_millis() as u64,
        })
    }
}

impl fmt::Display for JobInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = if self.healthy { "running" } else { "unhealthy" };
        write!(
            f,
            "[{}] {} ({}, {}ms)",
            self.index,
            self.command,
            state,
            self.elapsed.as_millis()
        )
    }
}

/// Shared handle to the sparse job slot list.
#[derive(Debug, Clone, Default)]
pub struct JobTable {
    slots: Arc<Mutex<Vec<Option<Job>>>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, Vec<Option<Job>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a job in the first free slot and returns its index.
    pub fn start(&self, command: &str) -> usize {
        let job = Job {
            command: command.to_string(),
            started: Instant::now(),
            healthy: true,
        };
        let mut slots = self.slots();
        let index = match slots.iter().position(Option::is_none) {
            Some(free) => {
                slots[free] = Some(job);
                free
            }
            None => {
                slots.push(Some(job));
                slots.len() - 1
            }
        };
        info!(job = index, command, "job started");
        index
    }

    pub fn mark_unhealthy(&self, index: usize) {
        if let Some(Some(job)) = self.slots().get_mut(index) {
            job.healthy = false;
            warn!(
                job = index,
                command = %job.command,
                elapsed_ms = job.started.elapsed().as_millis() as u64,
                "job exceeded its timeout"
            );
        }
    }

    /// Frees the slot; trailing empty slots are dropped.
    pub fn finish(&self, index: usize) -> Option<Job> {
        let mut slots = self.slots();
        let job = slots.get_mut(index).and_then(Option::take);
        while matches!(slots.last(), Some(None)) {
            slots.pop();
        }
        if let Some(job) = &job {
            info!(
                job = index,
                command = %job.command,
                healthy = job.healthy,
                elapsed_ms = job.started.elapsed().as_millis() as u64,
                "job finished"
            );
        }
        job
    }

    pub fn get(&self, index: usize) -> Option<JobInfo> {
        self.slots()
            .get(index)
            .and_then(Option::as_ref)
            .map(|job| info_for(index, job))
    }

    pub fn list(&self) -> Vec<JobInfo> {
        self.slots()
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|job| info_for(index, job)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots().iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn info_for(index: usize, job: &Job) -> JobInfo {
    JobInfo {
        index,
        command: job.command.clone(),
        healthy: job.healthy,
        elapsed: job.started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_reused() {
        let jobs = JobTable::new();
        let a = jobs.start("print");
        let b = jobs.start("help");
        assert_eq!((a, b), (0, 1));
        jobs.finish(a);
        assert_eq!(jobs.start("alias"), 0);
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn unhealthy_jobs_are_reported() {
        let jobs = JobTable::new();
        let index = jobs.start("slow");
        jobs.mark_unhealthy(index);
        let info = jobs.get(index).unwrap();
        assert!(!info.healthy);
        assert!(info.to_string().contains("unhealthy"));
        assert_eq!(info.to_value()["command"], "slow");
        let job = jobs.finish(index).unwrap();
        assert!(!job.healthy);
        assert!(jobs.is_empty());
    }

    #[test]
    fn clones_share_the_table() {
        let jobs = JobTable::new();
        let other = jobs.clone();
        jobs.start("print");
        assert_eq!(other.list().len(), 1);
        assert!(other.finish(5).is_none());
    }
}
