//! OpenAI-compatible client implementation
//!
//! Async HTTP client for `/chat/completions` endpoints with tool calling and
//! server-sent-event streaming. Works against OpenAI, DashScope, OpenRouter
//! and any other service that speaks the same wire format.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::config::LlmConfig;
use crate::core::{AgentError, Message, Result, Role, ToolCall, ToolDefinition};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, StreamCallback, TokenUsage};

/// OpenAI-compatible API client
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    stream: bool,
}

/// Message in wire format
#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// Tool call in wire format; arguments travel as a JSON string
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

/// Chat completion response (non-streaming)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<WireUsage> for TokenUsage {
    fn from(usage: WireUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

/// Streaming chunk
#[derive(Debug, Deserialize)]
struct StreamChunkResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<DeltaToolCall>>,
}

#[derive(Debug, Deserialize)]
struct DeltaToolCall {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<DeltaFunction>,
}

#[derive(Debug, Deserialize)]
struct DeltaFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Highest number of tool calls accepted in one streamed reply
const MAX_STREAMED_TOOL_CALLS: usize = 128;

/// Folds SSE lines of a streamed completion into one response
#[derive(Debug, Default)]
struct StreamAccumulator {
    content: String,
    model: Option<String>,
    usage: Option<TokenUsage>,
    /// (id, name, arguments) indexed by the delta's `index`
    tool_calls: Vec<(String, String, String)>,
    /// Bytes of a line not yet terminated by `\n`
    pending: Vec<u8>,
    done: bool,
}

impl StreamAccumulator {
    /// Feed raw bytes from the response body.
    ///
    /// Only complete lines are decoded, so a multi-byte character split
    /// across chunks is reassembled before decoding.
    fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.pending.extend_from_slice(bytes);

        let mut tokens = Vec::new();
        while let Some(newline_pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline_pos).collect();
            if let Some(token) = self.push_line(&String::from_utf8_lossy(&line))? {
                tokens.push(token);
            }
            if self.done {
                break;
            }
        }
        Ok(tokens)
    }

    /// Process a trailing line left without a final newline
    fn flush(&mut self) -> Result<Option<String>> {
        if self.done || self.pending.is_empty() {
            return Ok(None);
        }
        let rest = std::mem::take(&mut self.pending);
        self.push_line(&String::from_utf8_lossy(&rest))
    }

    /// Process one SSE line; returns the content token it carried, if any
    fn push_line(&mut self, line: &str) -> Result<Option<String>> {
        let line = line.trim();
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let data = data.trim();

        if data == "[DONE]" {
            self.done = true;
            return Ok(None);
        }
        if data.is_empty() {
            return Ok(None);
        }

        let chunk: StreamChunkResponse = serde_json::from_str(data)
            .map_err(|e| AgentError::llm(format!("Failed to parse stream chunk: {}", e)))?;

        if chunk.model.is_some() {
            self.model = chunk.model;
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage.into());
        }

        let mut token = String::new();
        for choice in chunk.choices {
            let Some(delta) = choice.delta else { continue };

            if let Some(text) = delta.content {
                token.push_str(&text);
            }

            for call in delta.tool_calls.unwrap_or_default() {
                if call.index >= MAX_STREAMED_TOOL_CALLS {
                    return Err(AgentError::llm(format!(
                        "stream chunk has tool call index {} (limit {})",
                        call.index, MAX_STREAMED_TOOL_CALLS
                    )));
                }
                if self.tool_calls.len() <= call.index {
                    self.tool_calls
                        .resize(call.index + 1, Default::default());
                }
                let slot = &mut self.tool_calls[call.index];
                if let Some(id) = call.id {
                    slot.0 = id;
                }
                if let Some(function) = call.function {
                    if let Some(name) = function.name {
                        slot.1.push_str(&name);
                    }
                    if let Some(args) = function.arguments {
                        slot.2.push_str(&args);
                    }
                }
            }
        }

        if token.is_empty() {
            Ok(None)
        } else {
            self.content.push_str(&token);
            Ok(Some(token))
        }
    }

    fn finish(self, fallback_model: &str) -> LLMResponse {
        let tool_calls = self
            .tool_calls
            .into_iter()
            .enumerate()
            .filter(|(_, (_, name, _))| !name.is_empty())
            .map(|(index, (id, name, args))| to_tool_call(index, id, name, &args))
            .collect();

        LLMResponse {
            content: self.content,
            tool_calls,
            usage: self.usage,
            model: self.model.unwrap_or_else(|| fallback_model.to_string()),
        }
    }
}

/// Parse tool arguments; invalid JSON is kept verbatim as a string value
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn to_tool_call(index: usize, id: String, name: String, raw_args: &str) -> ToolCall {
    let id = if id.is_empty() {
        format!("call_{}", index)
    } else {
        id
    };
    ToolCall::new(id, name, parse_arguments(raw_args))
}

impl OpenAiClient {
    /// Create a client from an explicit endpoint configuration
    pub fn new(config: &LlmConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert internal Message to wire format
    fn to_wire_message(msg: &Message) -> WireMessage {
        let tool_calls = msg.tool_calls.as_ref().filter(|c| !c.is_empty()).map(|calls| {
            calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.id.clone(),
                    kind: function_type(),
                    function: WireFunction {
                        name: tc.name.clone(),
                        arguments: tc.arguments.to_string(),
                    },
                })
                .collect::<Vec<_>>()
        });

        // Assistant turns that only request tools carry null content
        let content = if tool_calls.is_some() && msg.content.is_empty() {
            None
        } else {
            Some(msg.content.clone())
        };

        WireMessage {
            role: msg.role,
            content,
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }

    /// Convert wire response to LLMResponse
    fn to_llm_response(&self, response: ChatResponse) -> Result<LLMResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::llm("Response contained no choices"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, tc)| {
                to_tool_call(index, tc.id, tc.function.name, &tc.function.arguments)
            })
            .collect();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage: response.usage.map(TokenUsage::from),
            model: response.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    fn build_request<'a>(
        &'a self,
        messages: &[Message],
        tools: Option<&'a [ToolDefinition]>,
        options: Option<GenerateOptions>,
        stream: bool,
    ) -> ChatRequest<'a> {
        let options = options.unwrap_or_default();
        ChatRequest {
            model: &self.model,
            messages: messages.iter().map(Self::to_wire_message).collect(),
            tools: tools.filter(|t| !t.is_empty()),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stop: options.stop,
            stream,
        }
    }

    /// Send a request and check the status
    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        tracing::debug!(
            model = request.model,
            messages = request.messages.len(),
            tools = request.tools.map_or(0, |t| t.len()),
            stream = request.stream,
            "sending chat completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AgentError::llm(format!("Cannot connect to {}: {}", self.base_url, e))
                } else if e.is_timeout() {
                    AgentError::llm(format!("Request to {} timed out", self.base_url))
                } else {
                    AgentError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn complete(&self, request: ChatRequest<'_>) -> Result<LLMResponse> {
        let response = self.send(&request).await?;
        let text = response.text().await?;

        let chat_response: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| AgentError::llm(format!("Failed to parse response: {}", e)))?;

        let response = self.to_llm_response(chat_response)?;
        tracing::debug!(
            tool_calls = response.tool_calls.len(),
            content_len = response.content.len(),
            "chat completion received"
        );
        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for OpenAiClient {
    async fn chat(
        &self,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.complete(self.build_request(messages, None, options, false))
            .await
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.complete(self.build_request(messages, Some(tools), options, false))
            .await
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        options: Option<GenerateOptions>,
        on_token: StreamCallback,
    ) -> Result<LLMResponse> {
        let request = self.build_request(messages, None, options, true);
        let response = self.send(&request).await?;

        let mut accumulator = StreamAccumulator::default();
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk =
                chunk_result.map_err(|e| AgentError::llm(format!("Stream error: {}", e)))?;
            for token in accumulator.feed(&chunk)? {
                on_token(&token);
            }

            if accumulator.done {
                break;
            }
        }

        if let Some(token) = accumulator.flush()? {
            on_token(&token);
        }

        Ok(accumulator.finish(&self.model))
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}
