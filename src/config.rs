//! Configuration parsing and validation for the relay
//!
//! Command-line arguments (with environment fallbacks) parsed with clap. Running with no
//! arguments serves the working directory on port 3001 and relays to OpenAI.
use anyhow::{anyhow, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use summarelay::client::PoolSettings;
use summarelay::form::{DEFAULT_PROMPT, FormConfig};
use summarelay::relay::{
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_UPSTREAM_URL, Upstream,
};
use url::Url;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None, args_conflicts_with_subcommands = true)]
pub struct Config {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub serve: ServeArgs,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Summarize a local file through a running relay, the same way the upload page does.
    Submit(SubmitArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// The port on which the relay will listen.
    #[arg(short = 'p', long, env = "SUMMARELAY_PORT", default_value_t = 3001)]
    pub port: u16,

    /// Directory that non-API requests are served from.
    #[arg(long, env = "SUMMARELAY_STATIC_ROOT", default_value = ".")]
    pub static_root: PathBuf,

    /// Chat completions endpoint that summaries are requested from.
    #[arg(long, env = "SUMMARELAY_UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: Url,

    /// Model named in every upstream request.
    #[arg(long, env = "SUMMARELAY_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Token cap for each summary.
    #[arg(long, env = "SUMMARELAY_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// Sampling temperature, 0.0 to 2.0.
    #[arg(long, env = "SUMMARELAY_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// The port on which the metrics server will listen.
    #[arg(long, default_value_t = 9090)]
    pub metrics_port: u16,

    /// Whether to enable the metrics endpoint.
    #[arg(short = 'm', long, default_value_t = false, action = ArgAction::Set)]
    pub metrics: bool,

    /// The prefix to use for metrics.
    #[arg(long, default_value = "summarelay")]
    pub metrics_prefix: String,

    /// Maximum number of idle upstream connections to keep alive per host.
    #[arg(long, default_value_t = 100)]
    pub pool_max_idle_per_host: usize,

    /// How long (in seconds) to keep idle upstream connections alive.
    #[arg(long, default_value_t = 90)]
    pub pool_idle_timeout_secs: u64,
}

#[derive(Clone, Args)]
pub struct SubmitArgs {
    /// Base URL of the relay.
    #[arg(long, default_value = "http://127.0.0.1:3001")]
    pub server: Url,

    /// Credential for the upstream API.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    pub apikey: String,

    /// System prompt sent with the text.
    #[arg(long, conflicts_with = "prompt_file")]
    pub prompt: Option<String>,

    /// Read the system prompt from this file instead.
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// MIME type to report for the file. Without it only the `.txt` extension is accepted.
    #[arg(long)]
    pub mime_type: Option<String>,

    /// The text file to summarize.
    pub file: Option<PathBuf>,
}

// The credential stays out of logs and panic messages.
impl std::fmt::Debug for SubmitArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitArgs")
            .field("server", &self.server.as_str())
            .field("apikey", &"<redacted>")
            .field("prompt", &self.prompt)
            .field("prompt_file", &self.prompt_file)
            .field("mime_type", &self.mime_type)
            .field("file", &self.file)
            .finish()
    }
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if self.command.is_none() {
            self.serve.validate()?;
        }
        Ok(self)
    }
}

impl ServeArgs {
    fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.static_root.is_dir() {
            bail!(
                "Static root '{}' is not a directory",
                self.static_root.display()
            );
        }
        if !matches!(self.upstream_url.scheme(), "http" | "https") {
            bail!(
                "Upstream URL '{}' must use http or https",
                self.upstream_url
            );
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            bail!(
                "Temperature {} is outside the range 0.0 to 2.0",
                self.temperature
            );
        }
        Ok(())
    }

    pub fn upstream(&self) -> Upstream {
        Upstream::builder()
            .url(self.upstream_url.clone())
            .model(self.model.clone())
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build()
    }

    pub fn pool(&self) -> PoolSettings {
        PoolSettings {
            max_idle_per_host: self.pool_max_idle_per_host,
            idle_timeout: Duration::from_secs(self.pool_idle_timeout_secs),
        }
    }
}

impl SubmitArgs {
    /// Resolves the prompt once, before anything is submitted.
    pub async fn form_config(&self) -> Result<FormConfig, anyhow::Error> {
        let prompt = match (&self.prompt, &self.prompt_file) {
            (Some(prompt), _) => prompt.clone(),
            (None, Some(path)) => tokio::fs::read_to_string(path).await.map_err(|e| {
                anyhow!("Failed to read prompt file {}: {}", path.display(), e)
            })?,
            (None, None) => DEFAULT_PROMPT.to_owned(),
        };
        Ok(FormConfig {
            prompt: prompt.trim().to_owned(),
        })
    }
}
