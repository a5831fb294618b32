use axum::{http::{HeaderMap, StatusCode}, routing::post, Json, Router};
use relay_common::RelayError;
use relay_upstream::{parse_completion_text, ChatCompletionEndpoint, ChatCompletionRequest, ChatMessage, HttpEndpoint};

fn request(prompt: &str) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: "test-model".into(),
        messages: vec![ChatMessage::system("You are a helpful assistant."), ChatMessage::user(prompt)],
        max_tokens: 16,
        temperature: 0.7,
        stream: false,
    }
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap(); });
    format!("http://{}:{}", addr.ip(), addr.port())
}

#[test]
fn parses_first_choice_content() {
    let body = br#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hi"}},{"message":{"content":"second"}}]}"#;
    assert_eq!(parse_completion_text(body).unwrap(), "hi");
}

#[test]
fn empty_choices_is_malformed() {
    let err = parse_completion_text(br#"{"choices":[]}"#).unwrap_err();
    assert!(matches!(err, RelayError::MalformedResponse(_)));
}

#[test]
fn missing_content_is_malformed() {
    let err = parse_completion_text(br#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap_err();
    assert!(matches!(err, RelayError::MalformedResponse(_)));
    let err = parse_completion_text(b"not json").unwrap_err();
    assert!(matches!(err, RelayError::MalformedResponse(_)));
}

#[test]
fn user_prompt_picks_user_turn() {
    assert_eq!(request("ping").user_prompt(), Some("ping"));
}

#[tokio::test]
async fn http_endpoint_returns_content_and_sends_bearer() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
            let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
            let prompt = body["messages"][1]["content"].as_str().unwrap_or("").to_string();
            Json(serde_json::json!({"choices":[{"message":{"role":"assistant","content": format!("{auth}|{prompt}")}}]}))
        }),
    );
    let base = spawn(app).await;
    let endpoint = HttpEndpoint::new(&format!("{base}/"), Some("secret".into()), None).unwrap();
    assert_eq!(endpoint.url(), format!("{base}/v1/chat/completions"));
    let text = endpoint.complete(&request("hello")).await.unwrap();
    assert_eq!(text, "Bearer secret|hello");
}

#[tokio::test]
async fn http_endpoint_maps_non_2xx_to_upstream_error() {
    let app = Router::new().route("/v1/chat/completions", post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }));
    let base = spawn(app).await;
    let endpoint = HttpEndpoint::new(&base, None, None).unwrap();
    match endpoint.complete(&request("hello")).await {
        Err(RelayError::Upstream { status, .. }) => assert_eq!(status, Some(503)),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn http_endpoint_rejects_wrong_shape() {
    let app = Router::new().route("/v1/chat/completions", post(|| async { Json(serde_json::json!({"result": "ok"})) }));
    let base = spawn(app).await;
    let endpoint = HttpEndpoint::new(&base, None, None).unwrap();
    let err = endpoint.complete(&request("hello")).await.unwrap_err();
    assert!(matches!(err, RelayError::MalformedResponse(_)));
}

#[tokio::test]
async fn mock_endpoint_echoes_prompt() {
    let mock = relay_upstream::mock::MockEndpoint::new();
    assert_eq!(mock.complete(&request("echo me")).await.unwrap(), "echo me");
}

#[tokio::test]
async fn pass_through_stream_outlives_request_timeout() {
    use axum::{body::{Body, Bytes}, http::header};
    use tokio_stream::wrappers::ReceiverStream;

    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, std::convert::Infallible>>(4);
            tokio::spawn(async move {
                let _ = tx.send(Ok(Bytes::from_static(b"data: a\n\n"))).await;
                tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
                let _ = tx.send(Ok(Bytes::from_static(b"data: [DONE]\n\n"))).await;
            });
            ([(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(ReceiverStream::new(rx)))
        }),
    );
    let base = spawn(app).await;
    let endpoint = HttpEndpoint::new(&base, None, Some(std::time::Duration::from_secs(1))).unwrap();
    let resp = endpoint.forward(&serde_json::json!({"stream": true})).await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "data: a\n\ndata: [DONE]\n\n");
}

#[tokio::test]
async fn completion_still_honours_request_timeout() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
            Json(serde_json::json!({"choices":[{"message":{"content":"late"}}]}))
        }),
    );
    let base = spawn(app).await;
    let endpoint = HttpEndpoint::new(&base, None, Some(std::time::Duration::from_secs(1))).unwrap();
    let err = endpoint.complete(&request("hello")).await.unwrap_err();
    assert!(matches!(err, RelayError::Upstream { status: None, .. }));
}

#[test]
fn status_error_names_the_code() {
    let err = RelayError::status(502);
    assert!(matches!(err, RelayError::Upstream { status: Some(502), .. }));
    assert_eq!(err.to_string(), "upstream error (status 502): HTTP error! status: 502");
}
