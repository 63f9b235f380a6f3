//! Generative inference boundary: prompt rendering, the backend trait, the
//! HTTP implementation, and tolerant plan parsing.

use std::fmt;
use std::time::Duration;

use contracts::{AgentPlan, OutboundMessage, ProposedAction};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::context::PlanningContext;

pub const ENV_INFER_URL: &str = "HEARTH_INFER_URL";
pub const ENV_INFER_MODEL: &str = "HEARTH_INFER_MODEL";
const DEFAULT_INFER_URL: &str = "http://127.0.0.1:11434/api/generate";
const DEFAULT_INFER_MODEL: &str = "llama3.1:8b";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Serialize)]
pub struct SamplingOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 512,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    pub model: String,
    pub prompt: String,
    pub system: String,
    pub options: SamplingOptions,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    Transport(String),
    Status(u16),
    Decode(String),
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(detail) => write!(f, "inference transport error: {detail}"),
            Self::Status(code) => write!(f, "inference backend returned status {code}"),
            Self::Decode(detail) => write!(f, "inference response undecodable: {detail}"),
        }
    }
}

impl std::error::Error for InferenceError {}

/// Dyn-safe async boundary. The scheduler holds a `Box<dyn InferenceBackend>`
/// so tests substitute scripted backends without touching the network.
pub trait InferenceBackend: Send + Sync {
    fn complete(&self, request: InferenceRequest) -> BoxFuture<'_, Result<String, InferenceError>>;
    fn model(&self) -> &str;
}

/// Posts to an Ollama-style generate endpoint and reads `{response}`.
pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl HttpBackend {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| InferenceError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            model: model.into(),
        })
    }

    pub fn from_env() -> Result<Self, InferenceError> {
        let url =
            std::env::var(ENV_INFER_URL).unwrap_or_else(|_| DEFAULT_INFER_URL.to_string());
        let model =
            std::env::var(ENV_INFER_MODEL).unwrap_or_else(|_| DEFAULT_INFER_MODEL.to_string());
        Self::new(url, model)
    }
}

impl InferenceBackend for HttpBackend {
    fn complete(&self, request: InferenceRequest) -> BoxFuture<'_, Result<String, InferenceError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .json(&request)
                .send()
                .await
                .map_err(|err| InferenceError::Transport(err.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(InferenceError::Status(status.as_u16()));
            }
            let body: GenerateResponse = response
                .json()
                .await
                .map_err(|err| InferenceError::Decode(err.to_string()))?;
            Ok(body.response)
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Renders (system, prompt) for one planning context. The system half pins
/// the output contract; the prompt half carries the world snapshot.
pub fn render_prompt(ctx: &PlanningContext) -> (String, String) {
    let system = format!(
        "You are {agent}, an ambient device agent in room {room}. Respond with a \
         single JSON object: {{\"actions\": [{{\"name\", \"args\"}}], \
         \"messages_to\": [{{\"to\", \"content\"}}], \"explain\": \"...\"}}. \
         Allowed actions: {actions}. Household priorities, in order: {priorities}.",
        agent = ctx.agent_id,
        room = ctx.room_id,
        actions = ctx.capabilities.actions.join(", "),
        priorities = ctx.policy.priorities.join(" > "),
    );

    let mut prompt = format!(
        "Tick {tick}, hour {hour}. Room {room}: {temp:.1}C, light {light:.2}, \
         noise {noise:.2}, humidity {humidity:.2}. Comfort band \
         {min:.0}-{max:.0}C. Your status: {status:?}.",
        tick = ctx.tick,
        hour = ctx.hour_of_day(),
        room = ctx.room_id,
        temp = ctx.room.temperature_c,
        light = ctx.room.light,
        noise = ctx.room.noise,
        humidity = ctx.room.humidity,
        min = ctx.policy.comfort_min_c,
        max = ctx.policy.comfort_max_c,
        status = ctx.status,
    );
    if !ctx.inbound.is_empty() {
        prompt.push_str("\nRecent messages:");
        for message in &ctx.inbound {
            prompt.push_str(&format!("\n- {}: {}", message.from, message.content));
        }
    }
    if !ctx.siblings.is_empty() {
        prompt.push_str("\nOther devices:");
        for sibling in &ctx.siblings {
            prompt.push_str(&format!(
                "\n- {} in {} ({:?})",
                sibling.agent_id, sibling.room_id, sibling.status
            ));
        }
    }
    (system, prompt)
}

#[derive(Debug, Default, Deserialize)]
struct PlanPayload {
    #[serde(default)]
    actions: Vec<ProposedAction>,
    #[serde(default)]
    messages_to: Vec<OutboundMessage>,
    #[serde(default)]
    explain: String,
}

/// First balanced `{...}` span in the text, skipping braces inside JSON
/// strings. Models wrap their payload in prose often enough that naive
/// whole-body parsing is useless.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Never an error: missing fields default and unparseable text degrades to
/// an empty plan whose rationale records the failure.
pub fn parse_plan(raw: &str) -> AgentPlan {
    let payload = extract_json_object(raw)
        .and_then(|span| serde_json::from_str::<PlanPayload>(span).ok());
    match payload {
        Some(payload) => AgentPlan {
            actions: payload.actions,
            messages: payload.messages_to,
            rationale: if payload.explain.is_empty() {
                "inferred".to_string()
            } else {
                payload.explain
            },
        },
        None => AgentPlan::empty("inference output unparseable"),
    }
}
