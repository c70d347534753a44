//! # archive-unlock
//!
//! Password discovery and recursive extraction for ZIP, RAR and 7z archives.
//!
//! ## Design Philosophy
//!
//! archive-unlock is designed to be:
//! - **Library-first** - No CLI or UI; a front end subscribes to events and answers prompts
//! - **Cheap guesses first** - No password, then the password list, then the operator,
//!   and only then brute force
//! - **Event-driven** - Every state change is broadcast as an [`Event`] with a
//!   human-readable rendering
//!
//! ## Quick Start
//!
//! ```no_run
//! use archive_unlock::{ArchiveTarget, ChannelPrompter, Config, Unlocker};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.passwords.file = Some("passwords.txt".into());
//!
//!     let (prompter, mut prompts) = ChannelPrompter::new(4);
//!     let unlocker = Unlocker::builder(config)
//!         .prompter(Arc::new(prompter))
//!         .build()?;
//!
//!     // Print status lines
//!     let mut events = unlocker.events().subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{event}");
//!         }
//!     });
//!
//!     // Give up on every prompt, falling through to brute force
//!     tokio::spawn(async move {
//!         while let Some(prompt) = prompts.recv().await {
//!             prompt.cancel();
//!         }
//!     });
//!
//!     let outcome = unlocker
//!         .unlock(ArchiveTarget::new("secret.rar", "secret"))
//!         .await?;
//!     println!("password: {:?}", outcome.password());
//!
//!     unlocker.wait_for_nested().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Brute-force candidate enumeration and worker pool
pub mod bruteforce;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Event log shared by all components
pub mod events;
/// Archive backends
pub mod extraction;
/// Nested archive walker
pub mod nested;
/// Persisted password list
pub mod password_list;
/// Discovery pipeline
pub mod pipeline;
/// Operator password prompts
pub mod prompt;
/// Single password trials
pub mod trial;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use bruteforce::{BruteForceReport, BruteForceScheduler, Tier};
pub use config::{BruteForceConfig, Config, FatalPolicy, NestedConfig, PasswordListConfig};
pub use error::{Error, ExtractError, PasswordListError, Result};
pub use events::EventLog;
pub use extraction::{ArchiveBackend, BackendSet};
pub use nested::ProcessedSet;
pub use password_list::{PasswordList, PasswordStore};
pub use pipeline::{Unlocker, UnlockerBuilder};
pub use prompt::{
    ChannelPrompter, NoPrompt, PasswordPrompter, PasswordRequest, PendingPrompt, PromptResponse,
};
pub use trial::TrialRunner;
pub use types::{ArchiveTarget, ArchiveType, DiscoveryOutcome, Event, Stage, TrialOutcome};
