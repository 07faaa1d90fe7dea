//! Shared fakes for pipeline integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use compass::agent::message::{ChatRequest, ChatResponse, TokenUsage};
use compass::agent::{AgentConfig, LlmProvider, Orchestrator, PromptSet};
use compass::error::{AgentError, RetrievalError};
use compass::retrieval::{Passage, Retriever};

/// Which agent a request came from, identified by its system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Validation,
    Intent,
    Enhancement,
    Strategy,
    Context,
    Response,
}

/// Provider that answers per agent role.
///
/// Each role has a queue of replies; the last reply repeats once the
/// queue is down to one entry.
pub struct RoleProvider {
    prompts: PromptSet,
    replies: Mutex<HashMap<Role, VecDeque<String>>>,
    calls: Mutex<HashMap<Role, usize>>,
}

impl RoleProvider {
    pub fn new() -> Self {
        Self {
            prompts: PromptSet::defaults(),
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Queues replies for `role`.
    pub fn on(self, role: Role, replies: &[&str]) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(role, replies.iter().map(|r| (*r).to_string()).collect());
        self
    }

    pub fn calls(&self, role: Role) -> usize {
        self.calls.lock().unwrap().get(&role).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn role_of(&self, system: &str) -> Option<Role> {
        let p = &self.prompts;
        [
            (&p.validation, Role::Validation),
            (&p.intent, Role::Intent),
            (&p.enhancement, Role::Enhancement),
            (&p.retrieval, Role::Strategy),
            (&p.context, Role::Context),
            (&p.response, Role::Response),
        ]
        .into_iter()
        .find(|(prompt, _)| prompt.as_str() == system)
        .map(|(_, role)| role)
    }
}

#[async_trait]
impl LlmProvider for RoleProvider {
    fn name(&self) -> &'static str {
        "role-mock"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let role = request
            .system_prompt()
            .and_then(|s| self.role_of(s))
            .ok_or_else(|| AgentError::ApiRequest {
                message: "unknown system prompt".to_string(),
                status: None,
            })?;
        *self.calls.lock().unwrap().entry(role).or_insert(0) += 1;

        let content = {
            let mut replies = self.replies.lock().unwrap();
            let queue = replies.get_mut(&role).ok_or_else(|| AgentError::ApiRequest {
                message: format!("no reply scripted for {role:?}"),
                status: Some(500),
            })?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };

        content
            .map(|content| ChatResponse {
                content,
                usage: TokenUsage::default(),
                finish_reason: Some("stop".to_string()),
            })
            .ok_or_else(|| AgentError::ApiRequest {
                message: "empty script".to_string(),
                status: None,
            })
    }
}

/// Retriever over a fixed passage list, or one that always fails.
pub struct FixedRetriever {
    label: &'static str,
    passages: Vec<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl FixedRetriever {
    pub fn new(label: &'static str, passages: &[&str]) -> Self {
        Self {
            label,
            passages: passages.iter().map(|p| (*p).to_string()).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(label: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(label, &[])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for FixedRetriever {
    fn name(&self) -> &str {
        self.label
    }

    async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RetrievalError::Backend {
                backend: "fixed",
                message: "connection refused".to_string(),
            });
        }
        Ok(self
            .passages
            .iter()
            .take(k)
            .map(|p| Passage::new(p.clone(), 1.0))
            .collect())
    }
}

pub const VALID: &str = r#"{"is_valid": true, "reason": ""}"#;

pub const REVIEW_INTENT: &str = r#"{
    "primary_intent": "student_experience",
    "required_fields": {"course_db": ["course_code"], "review_db": ["difficulty", "workload"]},
    "priority": {"course_info_weight": 3, "review_info_weight": 8},
    "specific_aspects": ["difficulty"],
    "reasoning": "asks how hard the course feels"
}"#;

pub const QUERIES: &str = r#"{
    "course_db_query": "Algorithms CS 5800 course description",
    "review_db_query": "Algorithms difficulty exams workload",
    "enhancement_reasoning": "expanded to catalog and review vocabulary",
    "focus_aspects": ["difficulty"]
}"#;

pub const STRATEGY: &str = r#"{"course_k": 4, "review_k": 11, "reasoning": "reviews matter most", "priority_source": "review_db"}"#;

pub const SUFFICIENT: &str = r#"{
    "is_sufficient": true,
    "missing_aspects": [],
    "has_partial_info": true,
    "unanswerable": false,
    "analysis_reasoning": "reviews describe difficulty"
}"#;

pub const INSUFFICIENT: &str = r#"{
    "is_sufficient": false,
    "missing_aspects": ["exam format"],
    "has_partial_info": true,
    "unanswerable": false,
    "feedback": {
        "query_suggestions": {"course_db": "", "review_db": "Algorithms exam format"},
        "retrieval_suggestions": {"course_k": 3, "review_k": 12, "reasoning": "more reviews"}
    },
    "analysis_reasoning": "nothing on exams"
}"#;

pub const UNANSWERABLE: &str = r#"{
    "is_sufficient": false,
    "missing_aspects": ["next year's instructor"],
    "has_partial_info": false,
    "unanswerable": true,
    "analysis_reasoning": "not recorded anywhere"
}"#;

pub const ANSWER: &str = r#"{
    "response": "Students describe Algorithms as demanding, with heavy weekly problem sets.",
    "has_limitations": false
}"#;

pub fn config(max_attempts: usize) -> AgentConfig {
    AgentConfig::builder()
        .api_key("test-key")
        .max_retrieval_attempts(max_attempts)
        .build()
        .unwrap()
}

pub fn orchestrator(
    provider: Arc<RoleProvider>,
    course: Arc<FixedRetriever>,
    review: Arc<FixedRetriever>,
    max_attempts: usize,
) -> Orchestrator {
    Orchestrator::with_prompts(
        provider,
        course,
        review,
        config(max_attempts),
        PromptSet::defaults(),
    )
}

pub fn course_passages() -> Arc<FixedRetriever> {
    Arc::new(FixedRetriever::new(
        "course",
        &["=== course metadata === CS 5800 Algorithms === schedule === MWF 10:30"],
    ))
}

pub fn review_passages() -> Arc<FixedRetriever> {
    Arc::new(FixedRetriever::new(
        "review",
        &[
            "Course Name: Algorithms. Review: very difficult exams, heavy workload",
            "Course Name: Algorithms. Review: problem sets take 15 hours a week",
        ],
    ))
}
