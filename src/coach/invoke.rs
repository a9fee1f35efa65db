use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

/// One prepared model call: routed prompt plus the aggregated payload.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub system_prompt: String,
    pub payload: Value,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Language-model seam. Two invocation modes: a single-shot completion
/// and a lazy, finite, non-restartable stream of text deltas.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> anyhow::Result<String>;

    async fn stream(
        &self,
        request: &ModelRequest,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>>;
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiInvoker {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiInvoker {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn body(&self, request: &ModelRequest, stream: bool) -> Value {
        json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.payload.to_string() },
            ],
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
            "stream": stream,
        })
    }
}

#[async_trait]
impl ModelInvoker for OpenAiInvoker {
    async fn complete(&self, request: &ModelRequest) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %request.model, "calling model (non-streaming)");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.body(request, false))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("model API returned {}", status);
        }

        let body: Value = resp.json().await?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("model response missing content"))?;
        Ok(content.to_string())
    }

    async fn stream(
        &self,
        request: &ModelRequest,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %request.model, "calling model (streaming)");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.body(request, true))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("model API returned {}", status);
        }

        // SSE framing: byte chunks do not align with event boundaries, so
        // carry a line buffer across chunks and emit one delta per
        // complete `data:` line.
        let deltas = resp
            .bytes_stream()
            .scan(String::new(), |buffer, chunk| {
                let out = match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        let mut deltas = Vec::new();
                        while let Some(pos) = buffer.find('\n') {
                            let line = buffer[..pos].trim().to_string();
                            buffer.drain(..=pos);
                            if let Some(delta) = parse_sse_line(&line) {
                                deltas.push(Ok(delta));
                            }
                        }
                        deltas
                    }
                    Err(e) => vec![Err(anyhow::Error::from(e))],
                };
                futures::future::ready(Some(futures::stream::iter(out)))
            })
            .flatten();

        Ok(deltas.boxed())
    }
}

/// Extract the content delta from one SSE line, if it carries one.
fn parse_sse_line(line: &str) -> Option<String> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    let event: Value = serde_json::from_str(data).ok()?;
    event["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
