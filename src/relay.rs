/// The upstream leg of a summary request: build the chat completion call, send it once, and
/// reduce the reply to a single summary string.
///
/// There is no retry and no timeout beyond what the HTTP client applies. The caller's
/// credential goes into the `Authorization: Bearer` header of this one request and nowhere else.
use crate::client::HttpClient;
use crate::errors::RelayError;
use crate::models::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Role, SummaryRequest,
};
use axum::body::Body;
use axum::http::{Method, Request, Uri, header};
use bon::Builder;
use tracing::{debug, error, instrument, warn};
use url::Url;

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Where and how summaries are requested.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct Upstream {
    /// Full URL of the chat completions endpoint.
    pub url: Url,
    #[builder(default = DEFAULT_MODEL.to_owned(), into)]
    pub model: String,
    #[builder(default = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,
    #[builder(default = DEFAULT_TEMPERATURE)]
    pub temperature: f32,
}

impl Upstream {
    /// System turn carries the prompt, user turn carries the document.
    pub fn completion_request(&self, request: &SummaryRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: request.prompt.clone(),
                },
                ChatMessage {
                    role: Role::User,
                    content: request.text.clone(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Sends one chat completion request and returns the summary text.
#[instrument(skip_all, fields(model = %upstream.model, text_len = request.text.len()))]
pub async fn summarize<T: HttpClient + Sync>(
    client: &T,
    upstream: &Upstream,
    request: &SummaryRequest,
) -> Result<String, RelayError> {
    let body = serde_json::to_vec(&upstream.completion_request(request))
        .map_err(RelayError::server)?;
    let uri = Uri::try_from(upstream.url.as_str()).map_err(RelayError::server)?;

    // A credential containing bytes that are illegal in a header fails here, before any I/O.
    let req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", request.apikey))
        .body(Body::from(body))
        .map_err(RelayError::server)?;

    debug!("Forwarding summary request to {}", upstream.url);
    let response = client.request(req).await.map_err(|e| {
        error!("Error forwarding request to upstream {}: {}", upstream.url, e);
        RelayError::server(e)
    })?;

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(RelayError::server)?;

    if !status.is_success() {
        warn!(%status, "Upstream rejected summary request");
        return Err(RelayError::Upstream(
            String::from_utf8_lossy(&bytes).into_owned(),
        ));
    }

    let completion: ChatCompletionResponse = serde_json::from_slice(&bytes).map_err(|e| {
        error!("Upstream returned an undecodable completion: {}", e);
        RelayError::server(e)
    })?;

    if completion.first_content().is_none() {
        debug!("Upstream completion had no usable content, using placeholder");
    }
    Ok(completion.into_summary())
}
