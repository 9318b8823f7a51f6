//! Rule-driven wordlist password-recovery engine.
//!
//! Given a target digest, a hash-type identifier, a wordlist and an
//! optional hashcat-style rule set, the engine searches the word × rule
//! candidate space for a match, in batches, under a wall-clock budget,
//! cooperatively yielding to the host event loop and cancellable at any
//! point. At most one search job runs at a time.

pub mod backend;
pub mod error;
#[cfg(feature = "wgpu")]
pub mod gpu;
pub mod hash;
pub mod job;
pub mod ntlm;
pub mod rules;
pub mod scheduler;
pub mod wordlist;

use std::time::Duration;

pub use backend::{Capability, ComputeBackend, DispatchStrategy};
pub use error::{WordbreakError, WordbreakResult};
pub use hash::{HashDescriptor, HashFunctionRegistry, HashOptions};
pub use job::{JobController, JobState, JobStatus};
pub use rules::{CandidateSet, Rule, RuleSet};
pub use scheduler::{
    SearchHandle, SearchOptions, SearchOutcome, SearchRequest, SearchScheduler, WordlistSource,
};
pub use wordlist::{WordlistEntry, WordlistStore};

/// The default number of words pulled per batch. Timeout and cancellation
/// are checked, and the task yields, once per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// The default wall-clock budget of a search job.
pub const DEFAULT_MAX_TIME: Duration = Duration::from_secs(300);
