//! Scripted collaborator for tests

use super::{Completion, GenerateRequest, LlmClient};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Test double that replays scripted completions in order and records the
/// requests it received.
///
/// When the script is exhausted it returns a generic completion rather than
/// panicking, so tests only script the calls they care about.
#[derive(Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<Completion>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next completion to return.
    pub fn push_completion(&self, completion: Completion) {
        self.script.lock().unwrap().push_back(Ok(completion));
    }

    /// Queue a plain-text completion.
    pub fn push_text(&self, text: impl Into<String>) {
        self.push_completion(Completion::text_only(text));
    }

    /// Queue a failure for the next call.
    pub fn push_error(&self, error: AppError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// All requests received so far, in call order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, request: GenerateRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request);
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(Completion::text_only("Understood.")),
        }
    }
}
