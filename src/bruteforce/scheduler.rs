use crate::config::{BruteForceConfig, FatalPolicy};
use crate::error::Result;
use crate::events::EventLog;
use crate::trial::TrialRunner;
use crate::types::{ArchiveTarget, Event, TrialOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::charset::{Candidate, CandidateSpace};

/// Result of one brute-force search
#[derive(Clone, Debug, PartialEq)]
pub struct BruteForceReport {
    /// The winning candidate, `None` when the space was exhausted (or the search aborted)
    pub password: Option<String>,
    /// Number of candidates tried
    pub tested: u64,
    /// Wall-clock duration of the search
    pub elapsed_secs: f64,
    /// Set when a fatal trial stopped the search under [`FatalPolicy::Abort`]
    pub aborted: Option<String>,
}

impl BruteForceReport {
    /// Candidates tried per second
    pub fn speed(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.tested as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

/// Shared result slot of one search
///
/// The lowest enumeration index among successful trials wins, so the reported password does
/// not depend on which worker happened to finish first.
#[derive(Debug, Default)]
struct SearchState {
    inner: std::sync::Mutex<SearchInner>,
}

#[derive(Debug, Default)]
struct SearchInner {
    found: Option<(u64, String)>,
    aborted: Option<String>,
}

impl SearchState {
    fn lock(&self) -> std::sync::MutexGuard<'_, SearchInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn record_success(&self, candidate: &Candidate) {
        let mut inner = self.lock();
        match &inner.found {
            Some((index, _)) if *index <= candidate.index => {}
            _ => inner.found = Some((candidate.index, candidate.password.clone())),
        }
    }

    fn record_abort(&self, reason: String) {
        let mut inner = self.lock();
        if inner.aborted.is_none() {
            inner.aborted = Some(reason);
        }
    }

    fn take(&self) -> (Option<String>, Option<String>) {
        let mut inner = self.lock();
        let found = inner.found.take().map(|(_, password)| password);
        (found, inner.aborted.take())
    }
}

/// Everything a worker shares with its siblings
struct WorkerContext {
    runner: TrialRunner,
    target: ArchiveTarget,
    queue: Mutex<mpsc::Receiver<Candidate>>,
    cancel_token: CancellationToken,
    state: SearchState,
    tested: AtomicU64,
    on_fatal: FatalPolicy,
}

/// Exhaustive charset search over a worker pool
///
/// One producer enumerates the [`CandidateSpace`] into a bounded queue; `workers` tasks pull
/// candidates and run trials. The first success cancels the producer and every worker.
/// Each worker extracts into its own scratch directory, so the winner's output is left to
/// the caller to reproduce in the real destination.
#[derive(Debug)]
pub struct BruteForceScheduler {
    runner: TrialRunner,
    space: CandidateSpace,
    config: BruteForceConfig,
    scratch_root: Option<PathBuf>,
    events: EventLog,
}

impl BruteForceScheduler {
    /// Create a scheduler from configuration
    pub fn new(runner: TrialRunner, config: &BruteForceConfig, events: EventLog) -> Self {
        Self {
            runner,
            space: CandidateSpace::new(config.tiers.clone(), config.min_length, config.max_length),
            config: config.clone(),
            scratch_root: None,
            events,
        }
    }

    /// Create worker scratch directories under `dir` instead of the system temp dir
    pub fn with_scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(dir.into());
        self
    }

    /// The space this scheduler enumerates
    pub fn space(&self) -> &CandidateSpace {
        &self.space
    }

    /// Search for the password of `target` with `workers` concurrent workers
    ///
    /// Returns once the producer and every worker have stopped. Trials run against private
    /// scratch directories; `target.output_dir` is never written.
    pub async fn search(&self, target: &ArchiveTarget, workers: usize) -> Result<BruteForceReport> {
        let workers = workers.max(1);
        let capacity = self.config.queue_capacity_for(workers);
        let start = Instant::now();

        info!(
            archive_path = ?target.path,
            workers,
            queue_capacity = capacity,
            candidates = self.space.len(),
            "starting brute force"
        );

        // Scratch dirs first: nothing has been spawned if this fails
        let mut scratch_dirs = Vec::with_capacity(workers);
        for _ in 0..workers {
            scratch_dirs.push(self.scratch_dir()?);
        }

        let (tx, rx) = mpsc::channel(capacity);
        let cancel_token = CancellationToken::new();
        let ctx = Arc::new(WorkerContext {
            runner: self.runner.clone(),
            target: target.clone(),
            queue: Mutex::new(rx),
            cancel_token: cancel_token.clone(),
            state: SearchState::default(),
            tested: AtomicU64::new(0),
            on_fatal: self.config.on_fatal,
        });

        let producer = tokio::spawn(produce(
            self.space.clone(),
            tx,
            cancel_token.clone(),
            self.events.clone(),
            target.path.clone(),
        ));

        let mut pool = JoinSet::new();
        for (worker, scratch) in scratch_dirs.into_iter().enumerate() {
            pool.spawn(run_worker(Arc::clone(&ctx), worker, scratch));
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                warn!(archive_path = ?target.path, error = %e, "brute-force worker failed");
            }
        }

        // No consumer is left; release a producer blocked on a full queue
        cancel_token.cancel();
        if let Err(e) = producer.await {
            warn!(archive_path = ?target.path, error = %e, "brute-force producer failed");
        }

        let (password, aborted) = ctx.state.take();
        let report = BruteForceReport {
            password,
            tested: ctx.tested.load(Ordering::Relaxed),
            elapsed_secs: start.elapsed().as_secs_f64(),
            aborted,
        };

        info!(
            archive_path = ?target.path,
            found = report.password.is_some(),
            tested = report.tested,
            elapsed_secs = report.elapsed_secs,
            speed = report.speed(),
            "brute force finished"
        );
        self.events.emit(Event::BruteForceFinished {
            archive: target.path.clone(),
            tested: report.tested,
            elapsed_secs: report.elapsed_secs,
            found: report.password.is_some(),
        });

        Ok(report)
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("archive-unlock-");
        let dir = match &self.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

/// Enumerate `space` into the queue until it is exhausted or the search is cancelled
async fn produce(
    space: CandidateSpace,
    tx: mpsc::Sender<Candidate>,
    cancel_token: CancellationToken,
    events: EventLog,
    archive: PathBuf,
) {
    let mut current_tier = None;

    for candidate in space.iter() {
        if current_tier != Some(candidate.tier) {
            current_tier = Some(candidate.tier);
            debug!(archive_path = ?archive, tier = %candidate.tier, "brute force tier");
            events.emit(Event::BruteForceTier {
                archive: archive.clone(),
                tier: candidate.tier.description().to_string(),
                alphabet_len: candidate.tier.alphabet().len(),
            });
        }

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                trace!(archive_path = ?archive, "producer cancelled");
                return;
            }
            sent = tx.send(candidate) => {
                // Every worker is gone
                if sent.is_err() {
                    return;
                }
            }
        }
    }

    debug!(archive_path = ?archive, "candidate space exhausted");
}

/// Pull candidates and try them until the queue closes or the search is cancelled
async fn run_worker(ctx: Arc<WorkerContext>, worker: usize, scratch: tempfile::TempDir) {
    let scratch_out = scratch.path().join("out");
    let trial_target = ctx.target.with_output_dir(&scratch_out);

    loop {
        let next = {
            let mut queue = ctx.queue.lock().await;
            tokio::select! {
                biased;
                _ = ctx.cancel_token.cancelled() => None,
                candidate = queue.recv() => candidate,
            }
        };
        let Some(candidate) = next else {
            break;
        };

        let tested = ctx.tested.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(
            worker,
            index = candidate.index,
            tested,
            password_length = candidate.password.len(),
            "brute-force attempt"
        );

        // An in-flight trial always completes, so a lower-index success is never lost
        match ctx.runner.try_password(&trial_target, &candidate.password).await {
            TrialOutcome::Success { .. } => {
                debug!(worker, index = candidate.index, "brute force candidate accepted");
                ctx.state.record_success(&candidate);
                ctx.cancel_token.cancel();
                break;
            }
            TrialOutcome::WrongPassword => {}
            TrialOutcome::Fatal(reason) => match ctx.on_fatal {
                FatalPolicy::Continue => {
                    trace!(worker, index = candidate.index, %reason, "fatal trial, continuing");
                }
                FatalPolicy::Abort => {
                    warn!(worker, index = candidate.index, %reason, "fatal trial, aborting brute force");
                    ctx.state.record_abort(reason);
                    ctx.cancel_token.cancel();
                    break;
                }
            },
        }

        clear_scratch(&scratch_out).await;
    }

    debug!(worker, "brute-force worker stopped");
}

/// Drop whatever a failed trial left behind
async fn clear_scratch(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        trace!(?dir, error = %e, "failed to clear scratch directory");
    }
}
