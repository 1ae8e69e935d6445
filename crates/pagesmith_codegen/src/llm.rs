//! HTTP adapter for LLM generation backends.
//!
//! Supports OpenAI and Anthropic APIs, selected via environment variables.
//! Non-tool layouts stream token deltas over SSE; the tool-driven layout
//! requests a completed response carrying `write_file` tool calls and
//! replays them as stream events.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backend::{
    ChatTurn, GenEvent, GenerationBackend, ToolFileWrite, TurnRole, EVENT_CHANNEL_CAPACITY,
};
use crate::error::{CodegenError, CodegenResult};
use crate::layout::CodeLayout;

const MAX_RETRIES: u32 = 3;
const MAX_TOKENS: u32 = 8192;

const HTML_SYSTEM_PROMPT: &str = "You generate one complete, self-contained web page. \
    Respond with a single ```html fenced code block and nothing else.";
const MULTI_FILE_SYSTEM_PROMPT: &str = "You generate a web page as three files. \
    Respond with exactly one ```html, one ```css and one ```js fenced code block.";
const VUE_PROJECT_SYSTEM_PROMPT: &str = "You generate a complete Vue 3 project. \
    Write every file through the write_file tool; do not answer with inline code.";

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
}

/// HTTP client for chat completions.
pub struct LlmClient {
    provider: LlmProvider,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl LlmClient {
    /// Create a client with explicit configuration.
    pub fn new(provider: LlmProvider, api_key: String, model: Option<String>) -> Self {
        let default_model = match provider {
            LlmProvider::OpenAI => "gpt-5-mini".to_string(),
            LlmProvider::Anthropic => "claude-sonnet-4.5".to_string(),
        };

        Self {
            provider,
            api_key,
            model: model.unwrap_or(default_model),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from environment variables.
    ///
    /// Checks in order:
    /// 1. OPENAI_API_KEY
    /// 2. ANTHROPIC_API_KEY
    pub fn from_env() -> CodegenResult<Self> {
        let custom_model = std::env::var("PAGESMITH_LLM_MODEL").ok();

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if !api_key.is_empty() {
                return Ok(Self::new(LlmProvider::OpenAI, api_key, custom_model));
            }
        }

        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            if !api_key.is_empty() {
                return Ok(Self::new(LlmProvider::Anthropic, api_key, custom_model));
            }
        }

        Err(CodegenError::NotConfigured)
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Complete a conversation and return the full response text.
    pub async fn complete(&self, messages: &[ChatTurn]) -> CodegenResult<String> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_openai(messages, false).await.map(|r| r.text),
            LlmProvider::Anthropic => {
                self.complete_anthropic(messages, false).await.map(|r| r.text)
            }
        }
    }

    /// Complete a conversation with the `write_file` tool available and
    /// return the requested file writes in call order.
    pub async fn complete_with_tools(
        &self,
        messages: &[ChatTurn],
    ) -> CodegenResult<Vec<ToolFileWrite>> {
        let completion = match self.provider {
            LlmProvider::OpenAI => self.complete_openai(messages, true).await?,
            LlmProvider::Anthropic => self.complete_anthropic(messages, true).await?,
        };
        Ok(completion.tool_writes)
    }

    // OpenAI chat completion with retry on transient errors.
    async fn complete_openai(
        &self,
        messages: &[ChatTurn],
        with_tools: bool,
    ) -> CodegenResult<Completion> {
        let url = "https://api.openai.com/v1/chat/completions";
        let request = OpenAiRequest {
            model: self.model.clone(),
            messages: messages.iter().map(OpenAiMessage::from).collect(),
            max_completion_tokens: Some(MAX_TOKENS),
            stream: false,
            tools: with_tools.then(openai_file_tool),
        };

        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_secs(1 << attempt);
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(CodegenError::Backend(format!("Network error: {}", e)));
                    continue;
                }
            };

            let status = response.status();

            if status.is_server_error() || status.as_u16() == 429 {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(CodegenError::Backend(format!(
                    "OpenAI API error {} (attempt {}/{}): {}",
                    status,
                    attempt + 1,
                    MAX_RETRIES,
                    body
                )));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CodegenError::Backend(format!(
                    "OpenAI API error {}: {}",
                    status, body
                )));
            }

            let result: OpenAiResponse = response
                .json()
                .await
                .map_err(|e| CodegenError::Backend(format!("Failed to parse response: {}", e)))?;

            let choice = result
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| CodegenError::Backend("No response from OpenAI".to_string()))?;

            let mut tool_writes = Vec::new();
            for call in choice.message.tool_calls.unwrap_or_default() {
                if call.function.name != "write_file" {
                    // Hallucinated tool name: skip the call, keep the stream alive.
                    warn!(tool = %call.function.name, "ignoring unknown tool call");
                    continue;
                }
                let write: ToolFileWrite =
                    serde_json::from_str(&call.function.arguments).map_err(|e| {
                        CodegenError::Backend(format!("Malformed tool arguments: {}", e))
                    })?;
                tool_writes.push(write);
            }

            return Ok(Completion {
                text: choice.message.content.unwrap_or_default(),
                tool_writes,
            });
        }

        Err(last_error
            .unwrap_or_else(|| CodegenError::Backend("Max retries exceeded".to_string())))
    }

    // Anthropic chat completion with retry on transient errors.
    async fn complete_anthropic(
        &self,
        messages: &[ChatTurn],
        with_tools: bool,
    ) -> CodegenResult<Completion> {
        let url = "https://api.anthropic.com/v1/messages";
        let request = anthropic_request(&self.model, messages, with_tools, false);

        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = std::time::Duration::from_secs(1 << attempt);
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(CodegenError::Backend(format!("Network error: {}", e)));
                    continue;
                }
            };

            let status = response.status();

            if status.is_server_error() || status.as_u16() == 429 {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(CodegenError::Backend(format!(
                    "Anthropic API error {} (attempt {}/{}): {}",
                    status,
                    attempt + 1,
                    MAX_RETRIES,
                    body
                )));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CodegenError::Backend(format!(
                    "Anthropic API error {}: {}",
                    status, body
                )));
            }

            let result: AnthropicResponse = response
                .json()
                .await
                .map_err(|e| CodegenError::Backend(format!("Failed to parse response: {}", e)))?;

            let mut text = String::new();
            let mut tool_writes = Vec::new();
            for block in result.content {
                match block {
                    AnthropicContent::Text { text: t } => text.push_str(&t),
                    AnthropicContent::ToolUse { name, input } => {
                        if name != "write_file" {
                            warn!(tool = %name, "ignoring unknown tool call");
                            continue;
                        }
                        let write: ToolFileWrite =
                            serde_json::from_value(input).map_err(|e| {
                                CodegenError::Backend(format!("Malformed tool input: {}", e))
                            })?;
                        tool_writes.push(write);
                    }
                }
            }

            return Ok(Completion { text, tool_writes });
        }

        Err(last_error
            .unwrap_or_else(|| CodegenError::Backend("Max retries exceeded".to_string())))
    }

    /// Stream token deltas for a conversation over SSE.
    pub async fn stream(
        &self,
        messages: &[ChatTurn],
    ) -> CodegenResult<mpsc::Receiver<GenEvent>> {
        let response = match self.provider {
            LlmProvider::OpenAI => {
                let request = OpenAiRequest {
                    model: self.model.clone(),
                    messages: messages.iter().map(OpenAiMessage::from).collect(),
                    max_completion_tokens: Some(MAX_TOKENS),
                    stream: true,
                    tools: None,
                };
                self.client
                    .post("https://api.openai.com/v1/chat/completions")
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&request)
                    .send()
                    .await
            }
            LlmProvider::Anthropic => {
                let request = anthropic_request(&self.model, messages, false, true);
                self.client
                    .post("https://api.anthropic.com/v1/messages")
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&request)
                    .send()
                    .await
            }
        }
        .map_err(|e| CodegenError::Backend(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CodegenError::Backend(format!(
                "LLM API error {}: {}",
                status, body
            )));
        }

        let provider = self.provider;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            let mut failed = false;

            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx
                            .send(GenEvent::Failed(format!("Stream read error: {}", e)))
                            .await;
                        failed = true;
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE frames are newline-delimited; process complete lines only.
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        break 'outer;
                    }

                    match parse_sse_delta(provider, data) {
                        SseDelta::Text(text) => {
                            if tx.send(GenEvent::Chunk(text)).await.is_err() {
                                return;
                            }
                        }
                        SseDelta::Stop => break 'outer,
                        SseDelta::Ignore => {}
                    }
                }
            }

            if !failed {
                let _ = tx.send(GenEvent::Completed).await;
            }
        });

        Ok(rx)
    }
}

/// Outcome of one SSE data frame.
enum SseDelta {
    Text(String),
    Stop,
    Ignore,
}

fn parse_sse_delta(provider: LlmProvider, data: &str) -> SseDelta {
    match provider {
        LlmProvider::OpenAI => match serde_json::from_str::<OpenAiStreamChunk>(data) {
            Ok(chunk) => {
                let Some(choice) = chunk.choices.into_iter().next() else {
                    return SseDelta::Ignore;
                };
                if choice.finish_reason.is_some() {
                    return SseDelta::Stop;
                }
                match choice.delta.content {
                    Some(text) if !text.is_empty() => SseDelta::Text(text),
                    _ => SseDelta::Ignore,
                }
            }
            Err(e) => {
                debug!("skipping unparseable SSE frame: {}", e);
                SseDelta::Ignore
            }
        },
        LlmProvider::Anthropic => match serde_json::from_str::<AnthropicStreamEvent>(data) {
            Ok(AnthropicStreamEvent::ContentBlockDelta { delta }) => match delta.text {
                Some(text) if !text.is_empty() => SseDelta::Text(text),
                _ => SseDelta::Ignore,
            },
            Ok(AnthropicStreamEvent::MessageStop) => SseDelta::Stop,
            Ok(AnthropicStreamEvent::Other) => SseDelta::Ignore,
            Err(e) => {
                debug!("skipping unparseable SSE frame: {}", e);
                SseDelta::Ignore
            }
        },
    }
}

/// System prompt for a layout.
pub fn system_prompt(layout: CodeLayout) -> &'static str {
    match layout {
        CodeLayout::Html => HTML_SYSTEM_PROMPT,
        CodeLayout::MultiFile => MULTI_FILE_SYSTEM_PROMPT,
        CodeLayout::VueProject => VUE_PROJECT_SYSTEM_PROMPT,
    }
}

fn with_system_prompt(conversation: &[ChatTurn], layout: CodeLayout) -> Vec<ChatTurn> {
    let mut turns = Vec::with_capacity(conversation.len() + 1);
    turns.push(ChatTurn::system(system_prompt(layout)));
    turns.extend(conversation.iter().cloned());
    turns
}

#[async_trait]
impl GenerationBackend for LlmClient {
    async fn generate(
        &self,
        conversation: &[ChatTurn],
        layout: CodeLayout,
    ) -> CodegenResult<String> {
        let turns = with_system_prompt(conversation, layout);
        self.complete(&turns).await
    }

    async fn generate_stream(
        &self,
        conversation: Vec<ChatTurn>,
        layout: CodeLayout,
    ) -> CodegenResult<mpsc::Receiver<GenEvent>> {
        let turns = with_system_prompt(&conversation, layout);

        if layout.is_tool_driven() {
            // Tool calls arrive on the completed response; replay them as
            // stream events so the materializer consumes one shape.
            let writes = self.complete_with_tools(&turns).await?;
            let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            tokio::spawn(async move {
                for write in writes {
                    if tx.send(GenEvent::ToolCall(write)).await.is_err() {
                        return;
                    }
                }
                let _ = tx.send(GenEvent::Completed).await;
            });
            return Ok(rx);
        }

        self.stream(&turns).await
    }
}

struct Completion {
    text: String,
    tool_writes: Vec<ToolFileWrite>,
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}

impl From<&ChatTurn> for OpenAiMessage {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: match turn.role {
                TurnRole::System => "system",
                TurnRole::User => "user",
                TurnRole::Assistant => "assistant",
            },
            content: turn.content.clone(),
        }
    }
}

fn openai_file_tool() -> Vec<serde_json::Value> {
    vec![serde_json::json!({
        "type": "function",
        "function": {
            "name": "write_file",
            "description": "Write one project file, replacing any existing content",
            "parameters": {
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "content": { "type": "string" }
                },
                "required": ["path", "content"]
            }
        }
    })]
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    function: OpenAiToolFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

fn anthropic_request(
    model: &str,
    messages: &[ChatTurn],
    with_tools: bool,
    stream: bool,
) -> AnthropicRequest {
    // Anthropic requires the system message to be separate.
    let system = messages
        .iter()
        .find(|m| m.role == TurnRole::System)
        .map(|m| m.content.clone());

    let chat = messages
        .iter()
        .filter(|m| m.role != TurnRole::System)
        .map(|m| AnthropicMessage {
            role: match m.role {
                TurnRole::User => "user",
                _ => "assistant",
            },
            content: m.content.clone(),
        })
        .collect();

    AnthropicRequest {
        model: model.to_string(),
        max_tokens: MAX_TOKENS,
        system,
        messages: chat,
        stream,
        tools: with_tools.then(|| {
            vec![serde_json::json!({
                "name": "write_file",
                "description": "Write one project file, replacing any existing content",
                "input_schema": {
                    "type": "object",
                    "properties": {
                        "path": { "type": "string" },
                        "content": { "type": "string" }
                    },
                    "required": ["path", "content"]
                }
            })]
        }),
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContent {
    Text { text: String },
    ToolUse { name: String, input: serde_json::Value },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    ContentBlockDelta { delta: AnthropicTextDelta },
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicTextDelta {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models() {
        let openai = LlmClient::new(LlmProvider::OpenAI, "key".to_string(), None);
        assert_eq!(openai.model(), "gpt-5-mini");

        let anthropic = LlmClient::new(LlmProvider::Anthropic, "key".to_string(), None);
        assert_eq!(anthropic.model(), "claude-sonnet-4.5");
    }

    #[test]
    fn test_custom_model() {
        let client = LlmClient::new(
            LlmProvider::OpenAI,
            "key".to_string(),
            Some("gpt-4o".to_string()),
        );
        assert_eq!(client.model(), "gpt-4o");
    }

    #[test]
    fn test_system_prompt_is_prepended() {
        let turns = with_system_prompt(&[ChatTurn::user("a landing page")], CodeLayout::Html);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::System);
        assert_eq!(turns[1].content, "a landing page");
    }

    #[test]
    fn test_openai_sse_delta_parsing() {
        let frame = r#"{"choices":[{"delta":{"content":"<p>"},"finish_reason":null}]}"#;
        match parse_sse_delta(LlmProvider::OpenAI, frame) {
            SseDelta::Text(t) => assert_eq!(t, "<p>"),
            _ => panic!("expected text delta"),
        }

        let done = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert!(matches!(
            parse_sse_delta(LlmProvider::OpenAI, done),
            SseDelta::Stop
        ));
    }

    #[test]
    fn test_anthropic_sse_delta_parsing() {
        let frame = r#"{"type":"content_block_delta","delta":{"text":"body {"}}"#;
        match parse_sse_delta(LlmProvider::Anthropic, frame) {
            SseDelta::Text(t) => assert_eq!(t, "body {"),
            _ => panic!("expected text delta"),
        }

        let stop = r#"{"type":"message_stop"}"#;
        assert!(matches!(
            parse_sse_delta(LlmProvider::Anthropic, stop),
            SseDelta::Stop
        ));

        let ping = r#"{"type":"ping"}"#;
        assert!(matches!(
            parse_sse_delta(LlmProvider::Anthropic, ping),
            SseDelta::Ignore
        ));
    }

    #[test]
    fn test_anthropic_request_splits_system() {
        let turns = vec![
            ChatTurn::system("sys"),
            ChatTurn::user("u"),
            ChatTurn::assistant("a"),
        ];
        let request = anthropic_request("m", &turns, false, false);
        assert_eq!(request.system.as_deref(), Some("sys"));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.messages[1].role, "assistant");
    }
}
