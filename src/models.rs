//! Wire types: the relay's own `/api/summary` contract and the subset of the OpenAI chat
//! completions schema it speaks upstream.
use serde::{Deserialize, Serialize};
use crate::errors::RelayError;
use serde_json::Value;
use std::collections::HashMap;

/// Substituted when the upstream reply carries no usable first choice.
pub const MISSING_SUMMARY: &str = "(要約結果を取得できませんでした)";

/// Body of `POST /api/summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest {
    /// The caller's credential for the upstream API. Used once, never stored.
    pub apikey: String,
    /// System-role instruction.
    pub prompt: String,
    /// The uploaded document.
    pub text: String,
}

impl SummaryRequest {
    /// Pulls the three required fields out of an already-parsed body.
    ///
    /// A `null` body cannot be destructured at all and is a server error. Otherwise a field that
    /// is missing or falsy (`null`, `""`, `false`, `0`, `NaN`) makes the request incomplete.
    /// Truthy non-string values are coerced with [`coerce_to_string`].
    pub fn from_json(body: &Value) -> Result<Self, RelayError> {
        if body.is_null() {
            return Err(RelayError::server(
                "TypeError: cannot read properties of null request body",
            ));
        }
        let field = |name: &str| {
            body.get(name)
                .filter(|value| is_truthy(value))
                .map(coerce_to_string)
                .ok_or(RelayError::MissingFields)
        };
        Ok(Self {
            apikey: field("apikey")?,
            prompt: field("prompt")?,
            text: field("text")?,
        })
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String conversion with JavaScript `String(value)` semantics: whole numbers print without a
/// fraction, arrays join their elements with `,`, objects become `[object Object]`.
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(coerce_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_owned(),
    }
}

/// Successful reply of `POST /api/summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Request body sent to the upstream `/v1/chat/completions` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Lenient view of a chat completion response.
/// Every field is optional and provider-specific extras are ignored, so a strange but
/// well-formed reply degrades to the placeholder summary instead of an error.
#[derive(Debug, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    choices: Option<Vec<LenientChoice>>,
    #[serde(flatten)]
    _extra: HashMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct LenientChoice {
    #[serde(default)]
    message: Option<LenientMessage>,
    #[serde(flatten)]
    _extra: HashMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct LenientMessage {
    /// Left untyped: some providers send `null` or structured content here.
    #[serde(default)]
    content: Option<Value>,
}

impl ChatCompletionResponse {
    /// Content of the first choice, if it is a non-empty string.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .as_ref()?
            .first()?
            .message
            .as_ref()?
            .content
            .as_ref()?
            .as_str()
            .filter(|content| !content.is_empty())
    }

    pub fn into_summary(self) -> String {
        self.first_content().unwrap_or(MISSING_SUMMARY).to_owned()
    }
}
