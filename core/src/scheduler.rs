//! The batched, time-boxed, cancellable search loop.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    backend::{ComputeBackend, DispatchStrategy},
    error::WordbreakResult,
    hash::{HashDescriptor, HashFunctionRegistry, HashOptions},
    job::{JobController, JobState, JobStatus},
    rules::RuleSet,
    wordlist::{WordlistEntry, WordlistStore},
    DEFAULT_BATCH_SIZE, DEFAULT_MAX_TIME,
};

#[cfg(feature = "wgpu")]
use crate::gpu::WgpuHasher;

/// Where the candidates of a search come from.
#[derive(Debug, Clone)]
pub enum WordlistSource {
    /// A wordlist previously loaded into the store.
    Named(String),
    /// Raw wordlist text, loaded for this search only.
    Inline(String),
}

/// Tuning knobs of a search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Wall-clock budget. The job terminates with `TimedOut` at the first
    /// batch boundary past it.
    pub max_time: Duration,
    /// Number of words pulled per batch.
    pub batch_size: usize,
    /// Per-job parameters forwarded to the hash function.
    pub hash_options: HashOptions,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_time: DEFAULT_MAX_TIME,
            batch_size: DEFAULT_BATCH_SIZE,
            hash_options: HashOptions::default(),
        }
    }
}

/// A request to search for the password behind a digest.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// The digest to attack. Compared case-insensitively.
    pub target: String,
    /// The hash-type identifier, resolved case-insensitively.
    pub hash_type: String,
    pub wordlist: WordlistSource,
    /// Optional hashcat rule file contents.
    pub rules: Option<String>,
    pub options: SearchOptions,
}

/// The terminal result of a search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub found: bool,
    pub password: Option<String>,
    /// The digest of the found password, as computed.
    pub digest: Option<String>,
    /// Candidates actually hashed.
    pub tested: u64,
    pub elapsed: Duration,
    /// The backend the job ended on. Degrades to CPU after a GPU failure.
    pub backend: ComputeBackend,
    /// The termination reason: `Found`, `Exhausted`, `TimedOut` or `Stopped`.
    pub state: JobState,
}

/// A handle on a running search.
pub struct SearchHandle {
    handle: JoinHandle<SearchOutcome>,
    controller: Arc<JobController>,
}

impl SearchHandle {
    /// Returns the terminal result. Blocks until the search is finished.
    pub async fn join(self) -> SearchOutcome {
        self.handle.await.expect("search task panicked")
    }

    /// Snapshots the progress of the search.
    pub fn status(&self) -> JobStatus {
        self.controller.status()
    }

    /// Requests cooperative cancellation.
    pub fn stop(&self) {
        self.controller.stop();
    }
}

/// Drives search jobs: pulls words from the store, expands them through
/// the rule set, hashes candidates on the chosen backend and compares
/// them against the target.
pub struct SearchScheduler {
    wordlists: Arc<WordlistStore>,
    registry: Arc<HashFunctionRegistry>,
    dispatch: Arc<DispatchStrategy>,
    controller: Arc<JobController>,
}

impl SearchScheduler {
    pub fn new(
        wordlists: Arc<WordlistStore>,
        registry: Arc<HashFunctionRegistry>,
        dispatch: Arc<DispatchStrategy>,
    ) -> Self {
        Self {
            wordlists,
            registry,
            dispatch,
            controller: Arc::new(JobController::new()),
        }
    }

    /// The controller owning the single job slot.
    pub fn controller(&self) -> Arc<JobController> {
        self.controller.clone()
    }

    /// Snapshots the current job.
    pub fn status(&self) -> JobStatus {
        self.controller.status()
    }

    /// Requests cooperative cancellation of the current job.
    pub fn stop(&self) {
        self.controller.stop();
    }

    /// Starts a search job and returns a handle on it.
    ///
    /// Fails with `AlreadyRunning` if a job is in flight. The hash type,
    /// the wordlist and the rules are all resolved BEFORE the job slot is
    /// acquired, so a resolution failure can never leave the slot locked.
    pub fn start(&self, request: SearchRequest) -> WordbreakResult<SearchHandle> {
        let descriptor = self.registry.resolve(&request.hash_type)?;
        let wordlist = match &request.wordlist {
            WordlistSource::Named(name) => self.wordlists.get(name)?,
            WordlistSource::Inline(text) => Arc::new(WordlistEntry::from_text("inline", text)),
        };
        let rules = request.rules.as_deref().map(RuleSet::parse).unwrap_or_default();

        // upper bound: deduplication within a candidate set can only shrink it
        let total = wordlist.count() as u64 * (rules.len() as u64 + 1);
        self.controller.acquire(total)?;

        info!(
            hash_type = descriptor.id(),
            wordlist = wordlist.name.as_str(),
            words = wordlist.count(),
            rules = rules.len(),
            "starting search job"
        );

        let job = SearchJob {
            target: request.target.trim().to_lowercase(),
            descriptor,
            wordlist,
            rules,
            options: request.options,
            dispatch: self.dispatch.clone(),
            controller: self.controller.clone(),
            #[cfg(feature = "wgpu")]
            gpu: None,
        };

        let controller = self.controller.clone();
        let handle = tokio::spawn(async move {
            let outcome = job.run().await;
            // the slot is released on every exit path
            controller.release();

            info!(
                state = %outcome.state,
                tested = outcome.tested,
                backend = %outcome.backend,
                "search job finished"
            );

            outcome
        });

        Ok(SearchHandle {
            handle,
            controller: self.controller.clone(),
        })
    }
}

/// What scoring a batch concluded.
enum BatchScore {
    Hit { password: String, digest: String },
    Stopped,
    Done,
}

/// The in-flight state of one search job, owned by its tokio task.
struct SearchJob {
    target: String,
    descriptor: Arc<HashDescriptor>,
    wordlist: Arc<WordlistEntry>,
    rules: RuleSet,
    options: SearchOptions,
    dispatch: Arc<DispatchStrategy>,
    controller: Arc<JobController>,
    #[cfg(feature = "wgpu")]
    gpu: Option<WgpuHasher>,
}

impl SearchJob {
    async fn run(mut self) -> SearchOutcome {
        let started = Instant::now();
        let mut backend = self.dispatch.choose(self.descriptor.id());
        let words = self.wordlist.clone();

        for batch in words.candidates.chunks(self.options.batch_size.max(1)) {
            // expand the whole batch up front, keeping word order × rule order
            let mut candidates: Vec<String> = Vec::with_capacity(batch.len());
            if self.rules.is_empty() {
                candidates.extend(batch.iter().cloned());
            } else {
                for word in batch {
                    candidates.extend(self.rules.expand(word));
                }
            }

            let score = match backend {
                ComputeBackend::Gpu => match self.score_gpu(&candidates).await {
                    Ok(score) => score,
                    Err(err) => {
                        // GPU failure is never fatal: re-run the batch on the
                        // CPU and stay there for the rest of the job
                        warn!(%err, "GPU batch failed, falling back to the CPU path");
                        backend = ComputeBackend::Cpu;
                        self.score_cpu(&candidates).await
                    }
                },
                ComputeBackend::Cpu => self.score_cpu(&candidates).await,
            };

            match score {
                BatchScore::Hit { password, digest } => {
                    return self.outcome(JobState::Found, Some(password), Some(digest), started, backend);
                }
                BatchScore::Stopped => {
                    return self.outcome(JobState::Stopped, None, None, started, backend);
                }
                BatchScore::Done => (),
            }

            if started.elapsed() > self.options.max_time {
                return self.outcome(JobState::TimedOut, None, None, started, backend);
            }
            if self.controller.stop_requested() {
                return self.outcome(JobState::Stopped, None, None, started, backend);
            }

            // one cooperative yield per batch, so the host event loop is
            // never starved for longer than one batch's hashing time
            tokio::task::yield_now().await;
        }

        self.outcome(JobState::Exhausted, None, None, started, backend)
    }

    /// Hashes and compares candidates one by one on the CPU.
    ///
    /// Candidates are tested in deterministic order and the first hit
    /// wins. A failing hash computation skips that candidate only.
    async fn score_cpu(&self, candidates: &[String]) -> BatchScore {
        for candidate in candidates {
            if self.controller.stop_requested() {
                return BatchScore::Stopped;
            }

            let digest = match self
                .descriptor
                .compute(candidate, &self.options.hash_options)
                .await
            {
                Ok(digest) => digest,
                Err(err) => {
                    debug!(%err, "skipping candidate after hash failure");
                    continue;
                }
            };

            self.controller.record_tested();

            if digest.eq_ignore_ascii_case(&self.target) {
                return BatchScore::Hit {
                    password: candidate.clone(),
                    digest,
                };
            }
        }

        BatchScore::Done
    }

    /// Submits the whole batch to the GPU, then scores the returned
    /// digests in candidate order.
    #[cfg(feature = "wgpu")]
    async fn score_gpu(&mut self, candidates: &[String]) -> WordbreakResult<BatchScore> {
        if self.gpu.is_none() {
            self.gpu = Some(WgpuHasher::new()?);
        }
        let hasher = self.gpu.as_ref().expect("hasher just initialized");

        let digests = hasher.hash_batch(candidates)?;

        for (candidate, digest) in candidates.iter().zip(&digests) {
            if self.controller.stop_requested() {
                return Ok(BatchScore::Stopped);
            }

            self.controller.record_tested();

            if digest.eq_ignore_ascii_case(&self.target) {
                return Ok(BatchScore::Hit {
                    password: candidate.clone(),
                    digest: digest.clone(),
                });
            }
        }

        Ok(BatchScore::Done)
    }

    #[cfg(not(feature = "wgpu"))]
    async fn score_gpu(&mut self, _candidates: &[String]) -> WordbreakResult<BatchScore> {
        Err(crate::error::WordbreakError::NoGpu)
    }

    fn outcome(
        &self,
        state: JobState,
        password: Option<String>,
        digest: Option<String>,
        started: Instant,
        backend: ComputeBackend,
    ) -> SearchOutcome {
        SearchOutcome {
            found: state == JobState::Found,
            password,
            digest,
            tested: self.controller.tested(),
            elapsed: started.elapsed(),
            backend,
            state,
        }
    }
}
