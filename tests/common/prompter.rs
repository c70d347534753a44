//! Scripted operator prompts

use archive_unlock::{PasswordPrompter, PasswordRequest, PromptResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Answers prompts from a queue; cancels once the queue is empty
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    responses: Mutex<VecDeque<PromptResponse>>,
    requests: Mutex<Vec<PasswordRequest>>,
}

impl ScriptedPrompter {
    pub fn new(responses: impl IntoIterator<Item = PromptResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer with each password in turn, then cancel
    pub fn passwords(passwords: &[&str]) -> Self {
        Self::new(
            passwords
                .iter()
                .map(|p| PromptResponse::Password(p.to_string())),
        )
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<PasswordRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PasswordPrompter for ScriptedPrompter {
    async fn request_password(&self, request: PasswordRequest) -> PromptResponse {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PromptResponse::Cancel)
    }
}
