//! Grounded answer generation.
//!
//! [`Generator::grounded_answer`] never fails: with no hits it returns the
//! refusal without calling anything, and any backend failure (after
//! retries) ends in the deterministic extractive answer. Every answer
//! ends with the citation block for exactly the hits it was given.

use corpus_harness_core::answer::{
    build_context, extractive_answer, refusal, system_prompt, user_prompt, with_citations,
};
use corpus_harness_core::models::RetrievalHit;
use serde_json::Value;
use std::sync::Arc;

use crate::retry::{call_with_retry, CallOutcome, RetryPolicy};
use crate::transport::{HttpRequest, HttpTransport};

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatApi {
    OpenAi,
    Anthropic,
}

/// A remote chat-completion backend.
pub struct ChatBackend {
    api: ChatApi,
    transport: Arc<dyn HttpTransport>,
    api_key: String,
    model: String,
    url: String,
}

impl ChatBackend {
    pub fn openai(transport: Arc<dyn HttpTransport>, api_key: String, model: String) -> Self {
        Self {
            api: ChatApi::OpenAi,
            transport,
            api_key,
            model,
            url: OPENAI_CHAT_URL.to_string(),
        }
    }

    pub fn anthropic(transport: Arc<dyn HttpTransport>, api_key: String, model: String) -> Self {
        Self {
            api: ChatApi::Anthropic,
            transport,
            api_key,
            model,
            url: ANTHROPIC_MESSAGES_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn api(&self) -> ChatApi {
        self.api
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, system: &str, user: &str) -> HttpRequest {
        match self.api {
            ChatApi::OpenAi => HttpRequest::new(
                &self.url,
                serde_json::json!({
                    "model": self.model,
                    "temperature": 0,
                    "messages": [
                        { "role": "system", "content": system },
                        { "role": "user", "content": user },
                    ],
                }),
            )
            .header("Authorization", format!("Bearer {}", self.api_key)),
            ChatApi::Anthropic => HttpRequest::new(
                &self.url,
                serde_json::json!({
                    "model": self.model,
                    "max_tokens": ANTHROPIC_MAX_TOKENS,
                    "temperature": 0,
                    "system": system,
                    "messages": [{ "role": "user", "content": user }],
                }),
            )
            .header("x-api-key", self.api_key.clone())
            .header("anthropic-version", ANTHROPIC_VERSION),
        }
    }

    /// One attempt: send the prompt and classify the result.
    pub async fn complete(&self, system: &str, user: &str) -> CallOutcome<String> {
        let response = match self.transport.post_json(self.request(system, user)).await {
            Ok(r) => r,
            Err(e) => return CallOutcome::Retryable(e.to_string()),
        };
        if response.is_transient() {
            return CallOutcome::Retryable(format!("HTTP {}", response.status));
        }
        if !response.is_success() {
            return CallOutcome::Fatal(format!("HTTP {}: {}", response.status, response.body));
        }

        let json = match response.json() {
            Ok(json) => json,
            Err(e) => return CallOutcome::Fatal(format!("invalid JSON: {}", e)),
        };
        let text = match self.api {
            ChatApi::OpenAi => openai_text(&json),
            ChatApi::Anthropic => anthropic_text(&json),
        };
        match text {
            Some(t) if !t.trim().is_empty() => CallOutcome::Success(t),
            _ => CallOutcome::Fatal("empty completion".to_string()),
        }
    }
}

fn openai_text(json: &Value) -> Option<String> {
    json.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

fn anthropic_text(json: &Value) -> Option<String> {
    let parts: Vec<&str> = json
        .get("content")?
        .as_array()?
        .iter()
        .filter(|part| part.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();
    (!parts.is_empty()).then(|| parts.join(""))
}

pub enum GenerationBackend {
    /// Extractive answers only, no I/O.
    Offline,
    Chat(ChatBackend),
}

pub struct Generator {
    backend: GenerationBackend,
    policy: RetryPolicy,
    language: String,
}

impl Generator {
    pub fn new(backend: GenerationBackend, policy: RetryPolicy, language: impl Into<String>) -> Self {
        Self {
            backend,
            policy,
            language: language.into(),
        }
    }

    pub fn offline() -> Self {
        Self::new(GenerationBackend::Offline, RetryPolicy::default(), "English")
    }

    /// `offline`, `openai`, or `anthropic`.
    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            GenerationBackend::Offline => "offline",
            GenerationBackend::Chat(chat) => match chat.api() {
                ChatApi::OpenAi => "openai",
                ChatApi::Anthropic => "anthropic",
            },
        }
    }

    pub fn model(&self) -> Option<&str> {
        match &self.backend {
            GenerationBackend::Offline => None,
            GenerationBackend::Chat(chat) => Some(chat.model()),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Answer `question` from `hits` alone.
    pub async fn grounded_answer(&self, question: &str, hits: &[RetrievalHit]) -> String {
        if hits.is_empty() {
            return refusal();
        }

        let chat = match &self.backend {
            GenerationBackend::Offline => return extractive_answer(hits),
            GenerationBackend::Chat(chat) => chat,
        };

        let system = system_prompt(&self.language);
        let user = user_prompt(question, &build_context(hits));
        let (system, user) = (system.as_str(), user.as_str());

        match call_with_retry(&self.policy, self.backend_name(), |_| chat.complete(system, user)).await
        {
            Ok(body) => with_citations(&body, hits),
            Err(e) => {
                tracing::warn!(backend = self.backend_name(), error = %e, "generation failed, using extractive answer");
                extractive_answer(hits)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpResponse, TransportError};
    use async_trait::async_trait;
    use corpus_harness_core::answer::{cited_sources, REFUSAL};
    use corpus_harness_core::models::{HitMeta, PointId};
    use std::sync::Mutex;

    /// Records requests and answers with a fixed response.
    struct Recorder {
        requests: Mutex<Vec<HttpRequest>>,
        status: u16,
        body: String,
    }

    impl Recorder {
        fn new(status: u16, body: Value) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                status,
                body: body.to_string(),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for Recorder {
        async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpResponse {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    fn hits() -> Vec<RetrievalHit> {
        vec![RetrievalHit {
            id: PointId::for_chunk("uploads/contract.txt", 0),
            text: "The non-compete lasts 12 months.".into(),
            meta: HitMeta {
                source: "uploads/contract.txt".into(),
                filename: "contract.txt".into(),
                chunk_index: 0,
                score: 0.9,
            },
        }]
    }

    fn generator(chat: ChatBackend) -> Generator {
        Generator::new(GenerationBackend::Chat(chat), RetryPolicy::immediate(2), "French")
    }

    #[tokio::test]
    async fn no_hits_never_calls_backend() {
        let transport = Recorder::new(200, serde_json::json!({}));
        let g = generator(ChatBackend::openai(transport.clone(), "k".into(), "m".into()));
        let answer = g.grounded_answer("anything?", &[]).await;
        assert!(answer.starts_with(REFUSAL));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn openai_request_and_response() {
        let transport = Recorder::new(
            200,
            serde_json::json!({
                "choices": [{ "message": { "content": "Twelve months.\n\nSources:\n- [x | chunk 9]" } }]
            }),
        );
        let g = generator(ChatBackend::openai(transport.clone(), "sk".into(), "gpt".into()));
        let answer = g.grounded_answer("How long?", &hits()).await;

        assert!(answer.starts_with("Twelve months."));
        assert_eq!(cited_sources(&answer), vec![("contract.txt".to_string(), 0)]);

        let requests = transport.requests.lock().unwrap();
        let body = &requests[0].body;
        assert_eq!(requests[0].url, OPENAI_CHAT_URL);
        assert_eq!(body["temperature"], 0);
        assert!(body["messages"][0]["content"].as_str().unwrap().contains("French"));
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.starts_with("Context:\n[contract.txt | chunk 0]"));
        assert!(user.ends_with("Question: How long?"));
    }

    #[tokio::test]
    async fn anthropic_request_and_response() {
        let transport = Recorder::new(
            200,
            serde_json::json!({ "content": [{ "type": "text", "text": "12 months." }] }),
        );
        let g = generator(ChatBackend::anthropic(transport.clone(), "ak".into(), "claude".into()));
        assert_eq!(g.backend_name(), "anthropic");
        let answer = g.grounded_answer("How long?", &hits()).await;
        assert!(answer.starts_with("12 months."));

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].body["max_tokens"], 512);
        assert!(requests[0]
            .headers
            .iter()
            .any(|(k, v)| k == "x-api-key" && v == "ak"));
    }

    #[tokio::test]
    async fn client_error_falls_back_without_retry() {
        let transport = Recorder::new(400, serde_json::json!({ "error": "bad" }));
        let g = generator(ChatBackend::openai(transport.clone(), "k".into(), "m".into()));
        let answer = g.grounded_answer("How long?", &hits()).await;
        assert!(answer.contains("**12 months**"));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn empty_completion_falls_back() {
        let transport = Recorder::new(
            200,
            serde_json::json!({ "choices": [{ "message": { "content": "   " } }] }),
        );
        let g = generator(ChatBackend::openai(transport.clone(), "k".into(), "m".into()));
        let answer = g.grounded_answer("How long?", &hits()).await;
        assert!(answer.contains("**12 months**"));
        assert_eq!(cited_sources(&answer).len(), 1);
    }

    #[tokio::test]
    async fn offline_generator_is_extractive() {
        let g = Generator::offline();
        assert_eq!(g.backend_name(), "offline");
        assert!(g.model().is_none());
        let answer = g.grounded_answer("How long?", &hits()).await;
        assert!(answer.starts_with("The stated duration is **12 months**."));
    }
}
