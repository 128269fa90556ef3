//! Stubs shared by the unit tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::completion::{CompletionRequest, CompletionService};
use crate::errors::CompletionError;
use crate::synthesize::Reprompter;
use crate::token_counting::TokenBudget;

/// Replies with canned content and records every request it receives
pub(crate) struct StubCompletions {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    pub(crate) requests: Mutex<Vec<CompletionRequest>>,
}

impl StubCompletions {
    pub(crate) fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(CompletionError::NoChoices)])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for StubCompletions {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(CompletionError::NoChoices))
    }
}

/// Hands out scripted replacement questions
#[derive(Default)]
pub(crate) struct ScriptedReprompter {
    questions: VecDeque<String>,
    pub(crate) asked: Vec<TokenBudget>,
}

impl ScriptedReprompter {
    pub(crate) fn with(questions: &[&str]) -> Self {
        Self {
            questions: questions.iter().map(|q| q.to_string()).collect(),
            asked: Vec::new(),
        }
    }
}

#[async_trait]
impl Reprompter for ScriptedReprompter {
    async fn shorter_question(
        &mut self,
        budget: &TokenBudget,
    ) -> Result<Option<String>, std::io::Error> {
        self.asked.push(*budget);
        Ok(self.questions.pop_front())
    }
}
