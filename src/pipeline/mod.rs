//! Monitoring pipeline: change detection, digests, runs and scheduling.

mod diff;
pub mod digest;
mod monitor;
mod scheduler;

pub use diff::{ChangeDetector, ChangeSet};
pub use digest::Digest;
pub use monitor::{Monitor, RunOutcome, RunReport};
pub use scheduler::{Clock, JobRunner, RunState, Schedule, Scheduler, SystemClock};
