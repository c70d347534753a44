//! Password discovery pipeline
//!
//! [`Unlocker`] drives one archive through the stages in order:
//!
//! 1. the empty password
//! 2. every candidate of the password list, in file order
//! 3. operator-supplied passwords, until the operator cancels
//! 4. brute force over the charset tiers
//!
//! A successful stage extracts the archive into its output directory, saves the password to
//! the list (stages 2-4) and hands the output to the nested archive walker in the background.

use crate::bruteforce::BruteForceScheduler;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::EventLog;
use crate::extraction::BackendSet;
use crate::nested::{self, ProcessedSet};
use crate::password_list::PasswordStore;
use crate::prompt::{NoPrompt, PasswordPrompter, PasswordRequest, PromptResponse};
use crate::trial::TrialRunner;
use crate::types::{ArchiveTarget, DiscoveryOutcome, Event, Stage, TrialOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// State shared by the pipeline and every nested walk task
pub(crate) struct Shared {
    pub(crate) config: Config,
    pub(crate) runner: TrialRunner,
    pub(crate) passwords: PasswordStore,
    pub(crate) prompter: Arc<dyn PasswordPrompter>,
    pub(crate) events: EventLog,
}

impl Shared {
    /// Run the stages over `target` until one extracts it or all are exhausted
    ///
    /// `nested` marks archives found by the walker; they go through the same stages but
    /// report that they need operator help before prompting.
    pub(crate) async fn discover(
        &self,
        target: &ArchiveTarget,
        nested: bool,
    ) -> Result<DiscoveryOutcome> {
        // Stage 1
        self.stage_started(target, Stage::NoPassword);
        match self.runner.try_password(target, "").await {
            TrialOutcome::Success { files } => {
                return Ok(self
                    .extracted(target, String::new(), Stage::NoPassword, files)
                    .await);
            }
            outcome => self.trial_failed(target, &outcome),
        }

        // Stage 2
        if let Some(outcome) = self.try_password_list(target).await {
            return Ok(outcome);
        }

        // Stage 3
        if nested {
            info!(archive_path = ?target.path, "nested archive needs a password");
            self.events.emit(Event::NestedNeedsManual {
                archive: target.path.clone(),
            });
        }
        if let Some(outcome) = self.prompt_for_password(target, nested).await {
            return Ok(outcome);
        }

        // Stage 4
        if let Some(outcome) = self.brute_force(target).await? {
            return Ok(outcome);
        }

        warn!(archive_path = ?target.path, "could not determine password");
        self.events.emit(Event::Exhausted {
            archive: target.path.clone(),
        });
        Ok(DiscoveryOutcome::Exhausted)
    }

    async fn try_password_list(&self, target: &ArchiveTarget) -> Option<DiscoveryOutcome> {
        let list = match self.passwords.load().await {
            Ok(Some(list)) => list,
            Ok(None) => {
                debug!("no password list configured");
                self.events.emit(Event::PasswordListUnavailable {
                    reason: "no password list configured".into(),
                });
                return None;
            }
            Err(e) => {
                warn!(error = %e, "password list unavailable");
                self.events.emit(Event::PasswordListUnavailable {
                    reason: e.to_string(),
                });
                return None;
            }
        };

        self.events.emit(Event::PasswordListLoaded {
            path: list.path().to_path_buf(),
            count: list.len(),
        });
        self.stage_started(target, Stage::PasswordList);

        for (i, password) in list.iter().enumerate() {
            debug!(
                archive_path = ?target.path,
                attempt = i + 1,
                total = list.len(),
                password_length = password.len(),
                "trying password {}/{}",
                i + 1,
                list.len()
            );
            self.events.emit(Event::PasswordListAttempt {
                archive: target.path.clone(),
                attempt: i + 1,
                total: list.len(),
            });

            match self.runner.try_password(target, password).await {
                TrialOutcome::Success { files } => {
                    return Some(
                        self.extracted(target, password.clone(), Stage::PasswordList, files)
                            .await,
                    );
                }
                outcome => self.trial_failed(target, &outcome),
            }
        }

        self.events.emit(Event::PasswordListExhausted {
            archive: target.path.clone(),
            count: list.len(),
        });
        None
    }

    async fn prompt_for_password(
        &self,
        target: &ArchiveTarget,
        nested: bool,
    ) -> Option<DiscoveryOutcome> {
        self.stage_started(target, Stage::Manual);

        let mut attempt = 1;
        loop {
            self.events.emit(Event::ManualPasswordRequired {
                archive: target.path.clone(),
            });

            let request = PasswordRequest {
                archive: target.path.clone(),
                output_dir: target.output_dir.clone(),
                attempt,
                nested,
            };
            let password = match self.prompter.request_password(request).await {
                PromptResponse::Password(password) => password,
                PromptResponse::Cancel => {
                    info!(archive_path = ?target.path, "password prompt cancelled");
                    self.events.emit(Event::ManualPasswordCancelled {
                        archive: target.path.clone(),
                    });
                    return None;
                }
            };

            match self.runner.try_password(target, &password).await {
                TrialOutcome::Success { files } => {
                    return Some(self.extracted(target, password, Stage::Manual, files).await);
                }
                outcome => self.trial_failed(target, &outcome),
            }
            attempt += 1;
        }
    }

    async fn brute_force(&self, target: &ArchiveTarget) -> Result<Option<DiscoveryOutcome>> {
        let config = &self.config.brute_force;
        if !config.enabled {
            debug!(archive_path = ?target.path, "brute force disabled");
            return Ok(None);
        }

        self.stage_started(target, Stage::BruteForce);
        let scheduler = BruteForceScheduler::new(self.runner.clone(), config, self.events.clone());
        let report = scheduler.search(target, config.worker_count()).await?;

        let Some(password) = report.password else {
            if let Some(reason) = report.aborted {
                self.events.emit(Event::TrialFailed {
                    archive: target.path.clone(),
                    error: reason,
                });
            }
            return Ok(None);
        };

        // The winning trial ran in a scratch directory; extract for real
        match self.runner.try_password(target, &password).await {
            TrialOutcome::Success { files } => Ok(Some(
                self.extracted(target, password, Stage::BruteForce, files)
                    .await,
            )),
            outcome => {
                warn!(archive_path = ?target.path, ?outcome, "brute-forced password failed to extract");
                self.trial_failed(target, &outcome);
                Ok(None)
            }
        }
    }

    async fn extracted(
        &self,
        target: &ArchiveTarget,
        password: String,
        stage: Stage,
        files: Vec<PathBuf>,
    ) -> DiscoveryOutcome {
        info!(
            archive_path = ?target.path,
            output_dir = ?target.output_dir,
            %stage,
            files = files.len(),
            "archive extracted"
        );

        if stage != Stage::NoPassword {
            self.events.emit(Event::PasswordFound {
                archive: target.path.clone(),
                stage,
                password: password.clone(),
            });
        }
        self.events.emit(Event::Extracted {
            archive: target.path.clone(),
            output_dir: target.output_dir.clone(),
            files: files.len(),
        });

        if stage != Stage::NoPassword {
            self.save_password(&password).await;
        }

        DiscoveryOutcome::Extracted {
            password,
            stage,
            files,
        }
    }

    async fn save_password(&self, password: &str) {
        match self.passwords.append(password).await {
            Ok(Some(path)) => self.events.emit(Event::PasswordSaved {
                path,
                password: password.to_string(),
            }),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "failed to save password");
                self.events.emit(Event::PasswordSaveFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    fn stage_started(&self, target: &ArchiveTarget, stage: Stage) {
        debug!(archive_path = ?target.path, %stage, "stage started");
        self.events.emit(Event::StageStarted {
            archive: target.path.clone(),
            stage,
        });
    }

    fn trial_failed(&self, target: &ArchiveTarget, outcome: &TrialOutcome) {
        match outcome {
            TrialOutcome::WrongPassword => self.events.emit(Event::WrongPassword {
                archive: target.path.clone(),
            }),
            TrialOutcome::Fatal(reason) => self.events.emit(Event::TrialFailed {
                archive: target.path.clone(),
                error: reason.clone(),
            }),
            TrialOutcome::Success { .. } => {}
        }
    }
}

/// Builder for [`Unlocker`]
pub struct UnlockerBuilder {
    config: Config,
    backends: BackendSet,
    prompter: Arc<dyn PasswordPrompter>,
    events: EventLog,
}

impl UnlockerBuilder {
    /// Replace the archive backends (default: native ZIP, RAR and 7z)
    pub fn backends(mut self, backends: BackendSet) -> Self {
        self.backends = backends;
        self
    }

    /// Set who answers password prompts (default: [`NoPrompt`])
    pub fn prompter(mut self, prompter: Arc<dyn PasswordPrompter>) -> Self {
        self.prompter = prompter;
        self
    }

    /// Emit into an existing event log
    pub fn events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    /// Validate the configuration and build the [`Unlocker`]
    pub fn build(self) -> Result<Unlocker> {
        self.config.validate()?;
        let passwords = PasswordStore::new(&self.config.passwords)?;

        Ok(Unlocker {
            shared: Arc::new(Shared {
                runner: TrialRunner::new(self.backends),
                passwords,
                prompter: self.prompter,
                events: self.events,
                config: self.config,
            }),
            tracker: TaskTracker::new(),
        })
    }
}

/// Discovers archive passwords and unpacks nested archives
///
/// Nested walks started by [`unlock`](Unlocker::unlock) run in the background; call
/// [`wait_for_nested`](Unlocker::wait_for_nested) to wait for them.
///
/// # Examples
///
/// ```no_run
/// use archive_unlock::{ArchiveTarget, Config, Unlocker};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let unlocker = Unlocker::new(Config::default())?;
/// let outcome = unlocker
///     .unlock(ArchiveTarget::new("locked.zip", "locked"))
///     .await?;
/// println!("password: {:?}", outcome.password());
/// unlocker.wait_for_nested().await;
/// # Ok(())
/// # }
/// ```
pub struct Unlocker {
    shared: Arc<Shared>,
    tracker: TaskTracker,
}

impl Unlocker {
    /// Create an unlocker with native backends and no operator prompt
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start building an unlocker
    pub fn builder(config: Config) -> UnlockerBuilder {
        UnlockerBuilder {
            config,
            backends: BackendSet::native(),
            prompter: Arc::new(NoPrompt),
            events: EventLog::new(),
        }
    }

    /// The event log every component reports to
    pub fn events(&self) -> &EventLog {
        &self.shared.events
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// The password list
    pub fn passwords(&self) -> &PasswordStore {
        &self.shared.passwords
    }

    /// The trial runner over this unlocker's backends
    pub fn runner(&self) -> &TrialRunner {
        &self.shared.runner
    }

    /// Discover the password of `target` and extract it
    ///
    /// Returns as soon as the archive itself is extracted (or every stage failed); the nested
    /// walk of the output continues in the background.
    pub async fn unlock(&self, target: ArchiveTarget) -> Result<DiscoveryOutcome> {
        if !self.shared.runner.supports(&target) {
            return Err(Error::UnsupportedFormat { path: target.path });
        }

        info!(archive_path = ?target.path, output_dir = ?target.output_dir, "starting discovery");
        self.shared.events.emit(Event::DiscoveryStarted {
            archive: target.path.clone(),
            output_dir: target.output_dir.clone(),
        });

        let outcome = self.shared.discover(&target, false).await?;

        if outcome.password().is_some() && self.shared.config.nested.enabled {
            let processed = ProcessedSet::new();
            processed.insert(&target.path);
            self.tracker.spawn(nested::walk(
                Arc::clone(&self.shared),
                target.output_dir,
                0,
                processed,
            ));
        }

        Ok(outcome)
    }

    /// Walk `root` for nested archives now and wait for the whole walk
    ///
    /// Uses a fresh processed set. Returns the number of archives found directly below
    /// `root`.
    pub async fn walk(&self, root: impl Into<PathBuf>) -> usize {
        nested::walk(Arc::clone(&self.shared), root.into(), 0, ProcessedSet::new()).await
    }

    /// Wait until every background nested walk has finished
    pub async fn wait_for_nested(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl std::fmt::Debug for Unlocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unlocker")
            .field("runner", &self.shared.runner)
            .field("background_walks", &self.tracker.len())
            .finish()
    }
}
