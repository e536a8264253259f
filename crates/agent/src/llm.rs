//! The planner seam: a language model proposes the next step, nothing more.
//!
//! A step is either one [`ToolCall`] or a final answer for the user. The
//! model's output is parsed strictly; anything that doesn't deserialize
//! into the closed tool set is surfaced as an error the runtime turns into
//! an observation.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use maitred_core::config::PlannerConfig;

use crate::tools::ToolCall;

#[derive(Clone, Debug, PartialEq)]
pub enum PlannerStep {
    Act(ToolCall),
    FinalAnswer(String),
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn next_step(&self, system_prompt: &str, transcript: &str) -> Result<PlannerStep>;
}

/// Parse the model's reply. Accepts a bare JSON object or one wrapped in a
/// fenced code block; everything else is treated as a final answer so a
/// chatty model degrades to plain conversation instead of failing the turn.
pub fn parse_planner_reply(raw: &str) -> Result<PlannerStep> {
    let trimmed = strip_code_fence(raw.trim());

    let Ok(mut value) = serde_json::from_str::<Value>(trimmed) else {
        return Ok(PlannerStep::FinalAnswer(raw.trim().to_string()));
    };

    if let Some(answer) = value.get("final_answer").and_then(Value::as_str) {
        return Ok(PlannerStep::FinalAnswer(answer.to_string()));
    }

    if value.get("tool").is_some() {
        if let Some(object) = value.as_object_mut() {
            object.entry("arguments").or_insert_with(|| json!({}));
        }
        let call: ToolCall = serde_json::from_value(value)
            .map_err(|error| anyhow!("planner proposed an unusable tool call: {error}"))?;
        return Ok(PlannerStep::Act(call));
    }

    Err(anyhow!("planner reply had neither `tool` nor `final_answer`"))
}

fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches('\n').trim_end().trim_end_matches("```").trim()
}

/// OpenAI-compatible chat-completions planner.
pub struct HttpPlanner {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpPlanner {
    pub fn new(config: &PlannerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building planner http client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.as_ref().map(|key| key.expose_secret().to_string()),
            model: config.model.clone(),
        })
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl Planner for HttpPlanner {
    async fn next_step(&self, system_prompt: &str, transcript: &str) -> Result<PlannerStep> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": transcript },
            ],
            "temperature": 0.0,
        });

        let mut request =
            self.client.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.context("planner request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("planner endpoint returned {status}: {detail}"));
        }

        let completion: ChatCompletionResponse =
            response.json().await.context("planner response was not valid JSON")?;
        let content = completion
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| anyhow!("planner response contained no choices"))?;

        debug!(reply_len = content.len(), "planner replied");
        parse_planner_reply(content)
    }
}

/// Deterministic planner for tests: hands out a fixed sequence of steps.
#[derive(Default)]
pub struct ScriptedPlanner {
    steps: Mutex<VecDeque<Result<PlannerStep, String>>>,
}

impl ScriptedPlanner {
    pub fn new(steps: Vec<PlannerStep>) -> Self {
        Self { steps: Mutex::new(steps.into_iter().map(Ok).collect()) }
    }

    pub async fn push_failure(&self, message: impl Into<String>) {
        self.steps.lock().await.push_back(Err(message.into()));
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn next_step(&self, _system_prompt: &str, _transcript: &str) -> Result<PlannerStep> {
        match self.steps.lock().await.pop_front() {
            Some(Ok(step)) => Ok(step),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted planner ran out of steps")),
        }
    }
}
