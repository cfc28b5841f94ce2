//! Client side of the summary flow: validate what the user picked, read it, call the relay once,
//! and turn the outcome into the text shown to the user.
//!
//! The handler is independent of where it runs. A page or the `submit` command supplies a
//! [`FormConfig`] captured at startup, a [`SummaryApi`] transport and a [`LoadingIndicator`].
//!
//! The message strings below are shown verbatim and other tooling matches on them, so they
//! must not be reworded.
use crate::client::HttpClient;
use crate::models::{SummaryRequest, SummaryResponse};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Uri, header};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, instrument, warn};
use url::Url;

pub const MISSING_APIKEY: &str = "OpenAI APIキーを入力してください";
pub const MISSING_FILE: &str = "ファイルが選択されていません";
pub const NOT_A_TEXT_FILE: &str = "テキストファイル（.txt）を選んでください";
pub const READ_FAILED: &str = "ファイルの読込中にエラーが発生しました";
pub const API_ERROR_PREFIX: &str = "要約（API）エラー: ";
pub const CLIENT_ERROR_PREFIX: &str = "クライアントエラー: ";

/// Instruction text sent with every request when none is configured.
pub const DEFAULT_PROMPT: &str = "以下のテキストの要点を、日本語で簡潔に箇条書きで要約してください。";

/// Values fixed for the lifetime of the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormConfig {
    pub prompt: String,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_owned(),
        }
    }
}

/// Where a selected file's bytes come from.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn read(&self) -> io::Result<Vec<u8>>;
}

#[async_trait]
impl FileSource for Vec<u8> {
    async fn read(&self) -> io::Result<Vec<u8>> {
        Ok(self.clone())
    }
}

#[async_trait]
impl FileSource for PathBuf {
    async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(self).await
    }
}

/// A file chosen by the user. Nothing is read until the submission passes validation.
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    source: Box<dyn FileSource>,
}

impl std::fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("source", &"<source>")
            .finish()
    }
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        source: impl FileSource + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            source: Box::new(source),
        }
    }

    /// A file on local disk. Without an explicit MIME type only the `.txt` name check applies.
    pub fn from_path(path: PathBuf, mime_type: Option<String>) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(name, mime_type.unwrap_or_default(), path)
    }

    pub fn is_plain_text(&self) -> bool {
        self.mime_type == "text/plain" || self.name.ends_with(".txt")
    }

    /// Reads the file as UTF-8. Invalid sequences become U+FFFD and a leading BOM is dropped.
    pub async fn read_text(&self) -> io::Result<String> {
        let bytes = self.source.read().await?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.strip_prefix('\u{feff}').unwrap_or(&*text).to_owned())
    }
}

/// One press of the submit button.
#[derive(Debug)]
pub struct Submission {
    /// Credential exactly as typed. Surrounding whitespace is trimmed before use.
    pub apikey: String,
    pub file: Option<SelectedFile>,
}

/// What the relay answered.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiReply {
    Summary(SummaryResponse),
    /// Non-success status, with the response body as text.
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Request(#[from] axum::http::Error),
    #[error("invalid relay address: {0}")]
    Address(String),
}

#[async_trait]
pub trait SummaryApi: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> Result<ApiReply, FormError>;
}

pub trait LoadingIndicator: Send + Sync {
    fn show(&self);
    fn hide(&self);
}

/// For callers with nothing to animate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndicator;

impl LoadingIndicator for NoIndicator {
    fn show(&self) {}
    fn hide(&self) {}
}

/// What the user ends up looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Summary(String),
    Error(String),
    /// Another submission was still in flight. Nothing was done and the display is unchanged.
    Busy,
}

impl Rendered {
    pub fn text(&self) -> Option<&str> {
        match self {
            Rendered::Summary(text) | Rendered::Error(text) => Some(text),
            Rendered::Busy => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Rendered::Error(_))
    }
}

struct Shown<'a, L: LoadingIndicator>(&'a L);

impl<L: LoadingIndicator> Drop for Shown<'_, L> {
    fn drop(&mut self) {
        self.0.hide();
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct FormHandler<A, L> {
    config: FormConfig,
    api: A,
    indicator: L,
    busy: AtomicBool,
}

impl<A: SummaryApi, L: LoadingIndicator> FormHandler<A, L> {
    pub fn new(config: FormConfig, api: A, indicator: L) -> Self {
        Self {
            config,
            api,
            indicator,
            busy: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    /// Runs one submission to completion. The loading indicator is visible for the whole run
    /// and hidden on every exit.
    #[instrument(skip_all)]
    pub async fn submit(&self, submission: Submission) -> Rendered {
        if self.busy.swap(true, Ordering::AcqRel) {
            debug!("Ignoring submission while another is in flight");
            return Rendered::Busy;
        }
        let _in_flight = InFlight(&self.busy);

        self.indicator.show();
        let _shown = Shown(&self.indicator);

        self.run(submission).await
    }

    async fn run(&self, submission: Submission) -> Rendered {
        let apikey = submission.apikey.trim();
        if apikey.is_empty() {
            return Rendered::Error(MISSING_APIKEY.to_owned());
        }
        let Some(file) = submission.file else {
            return Rendered::Error(MISSING_FILE.to_owned());
        };
        if !file.is_plain_text() {
            debug!(name = %file.name, mime_type = %file.mime_type, "Rejecting non-text file");
            return Rendered::Error(NOT_A_TEXT_FILE.to_owned());
        }

        let text = match file.read_text().await {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read {}: {}", file.name, e);
                return Rendered::Error(READ_FAILED.to_owned());
            }
        };

        let request = SummaryRequest {
            apikey: apikey.to_owned(),
            prompt: self.config.prompt.clone(),
            text,
        };
        match self.api.summarize(&request).await {
            Ok(ApiReply::Summary(response)) => Rendered::Summary(response.summary),
            Ok(ApiReply::Failed(body)) => Rendered::Error(format!("{API_ERROR_PREFIX}{body}")),
            Err(e) => Rendered::Error(format!("{CLIENT_ERROR_PREFIX}{e}")),
        }
    }
}

/// Talks to a running relay over HTTP.
#[derive(Debug, Clone)]
pub struct RelayApi<T> {
    client: T,
    endpoint: Uri,
}

impl<T: HttpClient> RelayApi<T> {
    pub fn new(client: T, server: &Url) -> Result<Self, FormError> {
        let endpoint = server
            .join("api/summary")
            .map_err(|e| FormError::Address(e.to_string()))?;
        let endpoint =
            Uri::try_from(endpoint.as_str()).map_err(|e| FormError::Address(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }
}

#[async_trait]
impl<T: HttpClient + Send + Sync> SummaryApi for RelayApi<T> {
    async fn summarize(&self, request: &SummaryRequest) -> Result<ApiReply, FormError> {
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(request)?))?;

        let response = self
            .client
            .request(req)
            .await
            .map_err(|e| FormError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| FormError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Ok(ApiReply::Failed(String::from_utf8_lossy(&bytes).into_owned()));
        }
        Ok(ApiReply::Summary(serde_json::from_slice(&bytes)?))
    }
}
