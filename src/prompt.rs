//! Manual password prompts
//!
//! When neither the empty password nor the password list opens an archive, the pipeline asks
//! the operator through a [`PasswordPrompter`]. The answer is a password to try or an explicit
//! cancel, which moves the pipeline on to brute force.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

/// A request for the operator to supply a password
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordRequest {
    /// Archive that needs a password
    pub archive: PathBuf,
    /// Where it will be extracted
    pub output_dir: PathBuf,
    /// 1 for the first prompt, incremented after each rejected answer
    pub attempt: u32,
    /// Whether the archive was found inside another archive's output
    pub nested: bool,
}

/// The operator's answer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptResponse {
    /// Try this password
    Password(String),
    /// Stop prompting and fall through to brute force
    Cancel,
}

/// Interface to whoever can answer password prompts (a UI, a script, a test)
///
/// Prompts for different archives may be outstanding at the same time.
#[async_trait]
pub trait PasswordPrompter: Send + Sync {
    /// Ask for a password for `request.archive`
    async fn request_password(&self, request: PasswordRequest) -> PromptResponse;
}

/// Prompter for unattended use: every prompt is cancelled immediately
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPrompt;

#[async_trait]
impl PasswordPrompter for NoPrompt {
    async fn request_password(&self, _request: PasswordRequest) -> PromptResponse {
        PromptResponse::Cancel
    }
}

/// A prompt waiting for an answer on the consumer side of a [`ChannelPrompter`]
#[derive(Debug)]
pub struct PendingPrompt {
    request: PasswordRequest,
    reply: oneshot::Sender<PromptResponse>,
}

impl PendingPrompt {
    /// What is being asked
    pub fn request(&self) -> &PasswordRequest {
        &self.request
    }

    /// Answer with a password
    pub fn answer(self, password: impl Into<String>) {
        self.respond(PromptResponse::Password(password.into()));
    }

    /// Cancel the prompt
    pub fn cancel(self) {
        self.respond(PromptResponse::Cancel);
    }

    /// Send an arbitrary response
    pub fn respond(self, response: PromptResponse) {
        // The pipeline treats a dropped reply as a cancel anyway
        self.reply.send(response).ok();
    }
}

/// Prompter that forwards requests over a channel
///
/// The consumer (typically a UI task) receives [`PendingPrompt`]s and answers each one.
/// A closed channel or a prompt dropped without an answer counts as a cancel.
#[derive(Clone, Debug)]
pub struct ChannelPrompter {
    tx: mpsc::Sender<PendingPrompt>,
}

impl ChannelPrompter {
    /// Create a prompter and the receiving end for its requests
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<PendingPrompt>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl PasswordPrompter for ChannelPrompter {
    async fn request_password(&self, request: PasswordRequest) -> PromptResponse {
        let (reply, response) = oneshot::channel();
        if self.tx.send(PendingPrompt { request, reply }).await.is_err() {
            tracing::debug!("prompt receiver closed, cancelling");
            return PromptResponse::Cancel;
        }
        response.await.unwrap_or(PromptResponse::Cancel)
    }
}
