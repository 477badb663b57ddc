//! Integration test: build the router around scripted adapters and drive the
//! generate and refresh routes end to end.

use std::sync::{Arc, Mutex};

use airouter_api::config::{ApiConfig, DEFAULT_GENERATION_TIMEOUT};
use airouter_api::{AppState, router};
use airouter_core::auth::identity::MemoryIdentityStore;
use airouter_core::auth::jwt::TokenCodec;
use airouter_core::auth::service::TokenService;
use airouter_core::models::auth::{TokenKind, User};
use airouter_core::providers::{FragmentStream, Platform, ProviderAdapter, ProviderError};
use airouter_core::strategy::StrategyRouter;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const SECRET: &[u8] = b"integration-secret";

/// Adapter that replays a fixed script and remembers what it was asked.
struct ScriptedAdapter {
    platform: Platform,
    script: Vec<Result<&'static str, &'static str>>,
    hang_after_script: bool,
    seen: Mutex<Option<(String, String, CancellationToken)>>,
}

impl ScriptedAdapter {
    fn new(platform: Platform, script: Vec<Result<&'static str, &'static str>>) -> Arc<Self> {
        Arc::new(Self {
            platform,
            script,
            hang_after_script: false,
            seen: Mutex::new(None),
        })
    }

    fn hanging(platform: Platform, script: Vec<Result<&'static str, &'static str>>) -> Arc<Self> {
        Arc::new(Self {
            platform,
            script,
            hang_after_script: true,
            seen: Mutex::new(None),
        })
    }

    fn seen(&self) -> Option<(String, String, CancellationToken)> {
        self.seen.lock().unwrap().clone()
    }
}

impl ProviderAdapter for ScriptedAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn stream(&self, model: &str, prompt: &str, cancel: CancellationToken) -> FragmentStream {
        *self.seen.lock().unwrap() = Some((model.to_string(), prompt.to_string(), cancel));
        let items: Vec<Result<String, ProviderError>> = self
            .script
            .iter()
            .map(|step| match step {
                Ok(text) => Ok(text.to_string()),
                Err(msg) => Err(ProviderError::Stream(msg.to_string())),
            })
            .collect();
        let scripted = futures_util::stream::iter(items);
        if self.hang_after_script {
            Box::pin(scripted.chain(futures_util::stream::pending()))
        } else {
            Box::pin(scripted)
        }
    }
}

struct Harness {
    app: Router,
    store: Arc<MemoryIdentityStore>,
    codec: TokenCodec,
}

fn user() -> User {
    User {
        id: "google-123".into(),
        name: "Grace".into(),
        email: "grace@example.com".into(),
        role: "user".into(),
    }
}

fn harness(adapters: Vec<Arc<ScriptedAdapter>>) -> Harness {
    let store = Arc::new(MemoryIdentityStore::with_users([user()]));
    let codec = TokenCodec::new(SECRET);
    let strategy = adapters
        .into_iter()
        .fold(StrategyRouter::new(), |router, adapter| router.with_adapter(adapter));

    let state = AppState {
        config: ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            database_url: None,
            jwt_secret: String::from_utf8_lossy(SECRET).into_owned(),
            client_url: None,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            providers: Default::default(),
        },
        tokens: TokenService::new(codec.clone(), store.clone()),
        strategy: Arc::new(strategy),
    };

    Harness {
        app: router(state),
        store,
        codec,
    }
}

fn generate_request(
    bearer: Option<&str>,
    platform: Option<&str>,
    model: Option<&str>,
    prompt: &str,
) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri("/api/v1/ai/generate");
    if let Some(token) = bearer {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(platform) = platform {
        req = req.header("Platform", platform);
    }
    if let Some(model) = model {
        req = req.header("Model", model);
    }
    req.body(Body::from(prompt.to_string())).unwrap()
}

fn refresh_request(token: Option<&str>) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/google/refresh");
    if let Some(token) = token {
        req = req.header("X-Refresh-Token", token);
    }
    req.body(Body::empty()).unwrap()
}

async fn body_text(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

async fn error_json(resp: Response) -> serde_json::Value {
    serde_json::from_str(&body_text(resp).await).expect("parse JSON")
}

#[tokio::test]
async fn fragments_are_framed_then_done() {
    let adapter = ScriptedAdapter::new(Platform::OpenAi, vec![Ok("a"), Ok("b"), Ok("c")]);
    let h = harness(vec![adapter.clone()]);
    let token = h.codec.issue(&user()).unwrap();

    let resp = h
        .app
        .oneshot(generate_request(Some(&token), Some("openai"), Some("gpt-4o"), "write a poem"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(resp.headers()["x-accel-buffering"], "no");
    assert!(resp.headers().get(header::CONNECTION).is_none());
    assert_eq!(
        body_text(resp).await,
        "data: a\n\ndata: b\n\ndata: c\n\ndata: [DONE]\n\n"
    );

    let (model, prompt, _) = adapter.seen().expect("adapter was called");
    assert_eq!(model, "gpt-4o");
    assert_eq!(prompt, "write a poem");
}

#[tokio::test]
async fn failure_after_first_fragment_is_in_band() {
    let adapter = ScriptedAdapter::new(Platform::DeepSeek, vec![Ok("a"), Err("reset by peer")]);
    let h = harness(vec![adapter]);
    let token = h.codec.issue(&user()).unwrap();

    let resp = h
        .app
        .oneshot(generate_request(Some(&token), Some("deepseek"), Some("deepseek-chat"), "hi"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_text(resp).await,
        "data: a\n\ndata: ERROR: error receiving stream data: reset by peer\n\n"
    );
}

#[tokio::test]
async fn blank_prompt_fails_in_band_without_calling_adapter() {
    let adapter = ScriptedAdapter::new(Platform::Gemini, vec![Ok("never")]);
    let h = harness(vec![adapter.clone()]);
    let token = h.codec.issue(&user()).unwrap();

    let resp = h
        .app
        .oneshot(generate_request(Some(&token), Some("gemini"), Some("gemini-2.0-flash"), "  \n"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "data: ERROR: empty prompt\n\n");
    assert!(adapter.seen().is_none());
}

#[tokio::test]
async fn missing_platform_or_model_is_bad_request() {
    let adapter = ScriptedAdapter::new(Platform::OpenAi, vec![Ok("a")]);
    let h = harness(vec![adapter.clone()]);
    let token = h.codec.issue(&user()).unwrap();

    let resp = h
        .app
        .clone()
        .oneshot(generate_request(Some(&token), None, Some("gpt-4o"), "hi"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_ne!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
    let json = error_json(resp).await;
    assert_eq!(json["error"], "bad_request");
    assert_eq!(json["message"], "Platform header is required");

    let resp = h
        .app
        .oneshot(generate_request(Some(&token), Some("openai"), None, "hi"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_json(resp).await["message"], "Model header is required");

    assert!(adapter.seen().is_none());
}

#[tokio::test]
async fn unsupported_platform_is_rejected_before_streaming() {
    let h = harness(vec![ScriptedAdapter::new(Platform::OpenAi, vec![Ok("a")])]);
    let token = h.codec.issue(&user()).unwrap();

    for platform in ["azure", "OpenAI", "gemini"] {
        let resp = h
            .app
            .clone()
            .oneshot(generate_request(Some(&token), Some(platform), Some("m"), "hi"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "platform {platform}");
        assert_eq!(error_json(resp).await["error"], "unsupported_platform");
    }
}

#[tokio::test]
async fn generate_requires_access_token() {
    let h = harness(vec![ScriptedAdapter::new(Platform::OpenAi, vec![Ok("a")])]);
    let pair = h.codec.issue_pair(&user()).unwrap();

    let resp = h
        .app
        .clone()
        .oneshot(generate_request(None, Some("openai"), Some("gpt-4o"), "hi"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_json(resp).await["error"], "unauthorized");

    let resp = h
        .app
        .oneshot(generate_request(
            Some(&pair.refresh_token),
            Some("openai"),
            Some("gpt-4o"),
            "hi",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dropping_the_response_cancels_the_adapter() {
    let adapter = ScriptedAdapter::hanging(Platform::OpenAi, vec![Ok("first")]);
    let h = harness(vec![adapter.clone()]);
    let token = h.codec.issue(&user()).unwrap();

    let resp = h
        .app
        .oneshot(generate_request(Some(&token), Some("openai"), Some("gpt-4o"), "hi"))
        .await
        .unwrap();

    let mut body = resp.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    assert_eq!(&first[..], b"data: first\n\n");

    let (_, _, cancel) = adapter.seen().expect("adapter was called");
    assert!(!cancel.is_cancelled());
    drop(body);
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn refresh_rotates_the_pair() {
    let h = harness(vec![]);
    let original = h.codec.issue_pair(&user()).unwrap();

    let resp = h
        .app
        .oneshot(refresh_request(Some(&original.refresh_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
    assert_eq!(json["expires_in"], 900);
    let access = json["access_token"].as_str().unwrap();
    let refresh = json["refresh_token"].as_str().unwrap();

    let claims = h.codec.verify_access(access).unwrap();
    assert_eq!(claims.sub, "google-123");
    assert_eq!(claims.email, "grace@example.com");
    assert_eq!(claims.kind, TokenKind::Access);
    assert_eq!(h.codec.verify_refresh(refresh).unwrap().sub, "google-123");
    assert_ne!(refresh, original.refresh_token);
}

#[tokio::test]
async fn refresh_without_header_is_bad_request() {
    let h = harness(vec![]);
    let resp = h.app.oneshot(refresh_request(None)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_json(resp).await["message"], "Refresh token required");
}

#[tokio::test]
async fn refresh_rejects_invalid_tokens() {
    let h = harness(vec![]);
    let access = h.codec.issue(&user()).unwrap();
    let foreign = TokenCodec::new(b"other").issue_pair(&user()).unwrap();

    for token in ["not-a-jwt", access.as_str(), foreign.refresh_token.as_str()] {
        let resp = h
            .app
            .clone()
            .oneshot(refresh_request(Some(token)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_json(resp).await["message"], "Invalid refresh token");
    }
}

#[tokio::test]
async fn refresh_for_removed_identity_is_unauthorized() {
    let h = harness(vec![]);
    let pair = h.codec.issue_pair(&user()).unwrap();
    h.store.remove_user("google-123");

    let resp = h
        .app
        .oneshot(refresh_request(Some(&pair.refresh_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
