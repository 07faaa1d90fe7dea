//! Scripted collaborators for agent unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, TokenUsage};
use super::provider::LlmProvider;
use crate::error::{AgentError, RetrievalError};
use crate::retrieval::{Passage, Retriever};

/// Provider that replays queued replies in order.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, AgentError>>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, AgentError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(contents: &[&str]) -> Self {
        Self::new(contents.iter().map(|c| Ok((*c).to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> String {
        self.prompts
            .lock()
            .ok()
            .and_then(|p| p.last().cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.user_prompt().unwrap_or_default().to_string());
        }
        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| {
                Err(AgentError::ApiRequest {
                    message: "script exhausted".to_string(),
                    status: None,
                })
            });
        next.map(|content| ChatResponse {
            content,
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }
}

/// Retriever returning `count` synthetic passages, or failing.
pub struct StubRetriever {
    pub label: &'static str,
    pub available: usize,
    pub fail: bool,
    pub calls: AtomicUsize,
    pub last_k: AtomicUsize,
}

impl StubRetriever {
    pub fn with_passages(label: &'static str, available: usize) -> Self {
        Self {
            label,
            available,
            fail: false,
            calls: AtomicUsize::new(0),
            last_k: AtomicUsize::new(0),
        }
    }

    pub fn failing(label: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::with_passages(label, 0)
        }
    }
}

#[async_trait]
impl Retriever for StubRetriever {
    fn name(&self) -> &str {
        self.label
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_k.store(k, Ordering::SeqCst);
        if self.fail {
            return Err(RetrievalError::Backend {
                backend: "stub",
                message: "index offline".to_string(),
            });
        }
        // Returns more than asked so callers must truncate.
        Ok((0..self.available)
            .map(|i| Passage::new(format!("{} passage {i} for {query}", self.label), 1.0))
            .collect())
    }
}
