//! End-to-end tests for the summary relay
//!
//! The form handler talks to the real router in-process, and the router talks to a scripted
//! upstream. Nothing touches the network.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use summarelay::client::HttpClient;
use summarelay::form::{
    FormConfig, FormHandler, NoIndicator, RelayApi, Rendered, SelectedFile, Submission,
};
use summarelay::relay::Upstream;
use summarelay::{AppState, build_router};
use tower::util::ServiceExt; // for oneshot()

type Error = Box<dyn std::error::Error + Send + Sync>;

/// Stands in for the completion API: answers every call with one status and body.
#[derive(Debug, Clone)]
struct ScriptedUpstream {
    status: StatusCode,
    body: String,
    seen: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl ScriptedUpstream {
    fn new(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_owned(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn seen(&self) -> Vec<serde_json::Value> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for ScriptedUpstream {
    async fn request(&self, req: axum::extract::Request) -> Result<Response, Error> {
        let bytes = axum::body::to_bytes(req.into_body(), usize::MAX).await?;
        self.seen.lock().unwrap().push(serde_json::from_slice(&bytes)?);
        Ok(Response::builder()
            .status(self.status)
            .body(Body::from(self.body.clone()))?)
    }
}

/// Routes the form's requests straight into the relay router.
#[derive(Debug, Clone)]
struct InProcess(Router);

#[async_trait]
impl HttpClient for InProcess {
    async fn request(&self, req: axum::extract::Request) -> Result<Response, Error> {
        Ok(self.0.clone().oneshot(req).await?)
    }
}

fn relay(upstream: &ScriptedUpstream) -> Router {
    let state = AppState::with_client(
        Upstream::builder()
            .url("https://api.openai.com/v1/chat/completions".parse().unwrap())
            .build(),
        PathBuf::from("."),
        upstream.clone(),
    );
    build_router(state)
}

fn form(router: Router) -> FormHandler<RelayApi<InProcess>, NoIndicator> {
    let api = RelayApi::new(
        InProcess(router),
        &"http://localhost:3001".parse().unwrap(),
    )
    .unwrap();
    FormHandler::new(
        FormConfig {
            prompt: "三行で要約してください".into(),
        },
        api,
        NoIndicator,
    )
}

fn text_file(content: &str) -> Option<SelectedFile> {
    Some(SelectedFile::new(
        "novel.txt",
        "text/plain",
        content.as_bytes().to_vec(),
    ))
}

#[tokio::test]
async fn test_summary_round_trip() {
    let upstream = ScriptedUpstream::new(
        StatusCode::OK,
        r#"{"choices":[{"message":{"role":"assistant","content":"猫の話です。"}}]}"#,
    );
    let handler = form(relay(&upstream));

    let rendered = handler
        .submit(Submission {
            apikey: " sk-live ".into(),
            file: text_file("吾輩は猫である。"),
        })
        .await;

    assert_eq!(rendered, Rendered::Summary("猫の話です。".into()));

    let seen = upstream.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["messages"][0]["role"], "system");
    assert_eq!(seen[0]["messages"][0]["content"], "三行で要約してください");
    assert_eq!(seen[0]["messages"][1]["role"], "user");
    assert_eq!(seen[0]["messages"][1]["content"], "吾輩は猫である。");
}

#[tokio::test]
async fn test_upstream_rejection_reaches_the_user() {
    let upstream = ScriptedUpstream::new(StatusCode::UNAUTHORIZED, "invalid api key");
    let handler = form(relay(&upstream));

    let rendered = handler
        .submit(Submission {
            apikey: "sk-wrong".into(),
            file: text_file("本文"),
        })
        .await;

    assert_eq!(
        rendered,
        Rendered::Error("要約（API）エラー: OpenAI APIエラー: invalid api key".into())
    );
}

#[tokio::test]
async fn test_empty_file_is_refused_by_relay() {
    let upstream = ScriptedUpstream::new(StatusCode::OK, r#"{"choices":[]}"#);
    let handler = form(relay(&upstream));

    let rendered = handler
        .submit(Submission {
            apikey: "sk-live".into(),
            file: text_file(""),
        })
        .await;

    assert_eq!(
        rendered,
        Rendered::Error("要約（API）エラー: 必須情報が不足しています".into())
    );
    assert!(upstream.seen().is_empty());
}

#[tokio::test]
async fn test_missing_completion_content_shows_placeholder() {
    let upstream = ScriptedUpstream::new(StatusCode::OK, r#"{"choices":[]}"#);
    let handler = form(relay(&upstream));

    let rendered = handler
        .submit(Submission {
            apikey: "sk-live".into(),
            file: text_file("本文"),
        })
        .await;

    assert_eq!(
        rendered,
        Rendered::Summary("(要約結果を取得できませんでした)".into())
    );
}

#[tokio::test]
async fn test_relay_direct_request_shapes() {
    let upstream = ScriptedUpstream::new(
        StatusCode::OK,
        r#"{"choices":[{"message":{"content":"要約結果"}}]}"#,
    );
    let app = relay(&upstream);

    let request = Request::builder()
        .method("POST")
        .uri("/api/summary")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_vec(&serde_json::json!({
                "apikey": "sk-1",
                "prompt": "p",
                "text": "t"
            }))
            .unwrap(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, serde_json::json!({"summary": "要約結果"}));
}

#[tokio::test]
async fn test_bundled_upload_page_is_served() {
    let upstream = ScriptedUpstream::new(StatusCode::OK, "{}");
    let state = AppState::with_client(
        Upstream::builder()
            .url("https://api.openai.com/v1/chat/completions".parse().unwrap())
            .build(),
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("public"),
        upstream,
    );
    let app = build_router(state);

    for (path, content_type, marker) in [
        ("/", "text/html", "summary-form"),
        ("/app.js", "text/javascript", "/api/summary"),
        ("/style.css", "text/css", "summary-result"),
    ] {
        let response = app
            .clone()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            content_type,
            "{path}"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&body).contains(marker), "{path}");
    }

    let response = app
        .oneshot(Request::get("/missing.xyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
