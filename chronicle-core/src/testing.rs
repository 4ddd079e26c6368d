//! Testing utilities for the compression pipeline.
//!
//! This module provides tools for integration testing:
//! - `MockModel` for deterministic testing without API calls
//! - `HistoryBuilder` for synthetic conversation histories

use crate::llm::{ChatModel, LlmError};
use crate::message::Message;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Reply given once the script runs out.
const DEFAULT_REPLY: &str = "The party pressed on, and the road remembered them.";

/// A mock model that returns scripted replies.
///
/// `Err` entries in the script are returned as `LlmError::Other`. Once the
/// script is exhausted every call gets a fixed reply, or the fixed error for
/// a mock built with [`MockModel::failing`].
pub struct MockModel {
    state: Mutex<MockState>,
    fallback: Result<String, String>,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<Result<String, String>>,
    prompts: Vec<(String, String)>,
}

impl MockModel {
    /// Create a mock with scripted replies, returned in order.
    pub fn new(script: Vec<Result<String, String>>) -> Self {
        Self {
            state: Mutex::new(MockState {
                script: script.into(),
                prompts: Vec::new(),
            }),
            fallback: Ok(DEFAULT_REPLY.to_string()),
        }
    }

    /// Create a mock whose every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            fallback: Err(message.to_string()),
        }
    }

    /// Queue another reply.
    pub fn queue(&self, reply: Result<String, String>) {
        self.lock().script.push_back(reply);
    }

    /// Every `(system, user)` prompt pair received so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.lock().prompts.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().prompts.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread poisons the lock; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ChatModel for MockModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let mut state = self.lock();
        state.prompts.push((system.to_string(), user.to_string()));
        let reply = state
            .script
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        reply.map_err(LlmError::Other)
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Builds synthetic histories made of per-location segments.
///
/// Each location `k` contributes four messages: a player action, a narration,
/// a plain summary for `Location k`, and the transition to `Location k+1`.
/// With the leading system prompt from [`HistoryBuilder::build`], summaries
/// land at indices 3, 7, 11, ... and transitions at 4, 8, 12, ...
#[derive(Debug, Clone)]
pub struct HistoryBuilder {
    first_location: usize,
    locations: usize,
}

impl Default for HistoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBuilder {
    pub fn new() -> Self {
        Self {
            first_location: 1,
            locations: 0,
        }
    }

    /// Number of the first location.
    pub fn first_location(mut self, n: usize) -> Self {
        self.first_location = n;
        self
    }

    /// How many locations to generate.
    pub fn locations(mut self, n: usize) -> Self {
        self.locations = n;
        self
    }

    /// A system prompt followed by every segment.
    pub fn build(&self) -> Vec<Message> {
        let mut messages = vec![Message::system("You are the Dungeon Master.")];
        messages.extend(self.build_segments());
        messages
    }

    /// The segments alone, for appending to an existing history.
    pub fn build_segments(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.locations * 4);
        for k in self.first_location..self.first_location + self.locations {
            let here = format!("Location {k}");
            let next = format!("Location {}", k + 1);
            messages.push(Message::user(format!("I look around {here}.")));
            messages.push(Message::assistant(format!(
                "{here} is quiet. Dust drifts through the light."
            )));
            messages.push(Message::location_summary(
                &here,
                &format!("The party explored {here} and moved on."),
            ));
            messages.push(Message::transition(&here, &next));
        }
        messages
    }
}
