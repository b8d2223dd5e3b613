//! Gemini engine tests against a mock API server

use std::sync::{Arc, Mutex};

use serde_json::json;
use wiremock::matchers::{method, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use batch_scribe::application::ports::{
    AudioInput, EngineError, EngineProgress, ProgressSink, TranscriptionEngine,
};
use batch_scribe::domain::audio::AudioFormat;
use batch_scribe::domain::job::JobSettings;
use batch_scribe::infrastructure::GeminiEngine;

fn chunk() -> AudioInput {
    AudioInput::Chunk {
        data: vec![0x66, 0x4c, 0x61, 0x43, 0, 0, 0, 0],
        format: AudioFormat::Flac,
        index: 0,
        total: 1,
    }
}

async fn engine_for(server: &MockServer) -> GeminiEngine {
    GeminiEngine::new("test-key").with_base_url(server.uri())
}

fn text_response(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }] }
        }]
    })
}

#[tokio::test]
async fn successful_transcription() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r":generateContent$"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("  hello world \n")))
        .expect(1)
        .mount(&server)
        .await;

    let ticks: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&ticks);
    let sink: ProgressSink = Arc::new(move |tick: EngineProgress| {
        if let Some(p) = tick.percent {
            record.lock().unwrap().push(p);
        }
    });

    let transcript = engine_for(&server)
        .await
        .transcribe(&chunk(), &JobSettings::default(), Some(sink))
        .await
        .unwrap();

    assert_eq!(transcript.text, "hello world");
    assert_eq!(transcript.metadata.chunks, 1);
    assert_eq!(ticks.lock().unwrap().last().copied(), Some(100.0));
}

#[tokio::test]
async fn audio_is_sent_inline_as_base64() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("ok")))
        .mount(&server)
        .await;

    engine_for(&server)
        .await
        .transcribe(&chunk(), &JobSettings::default(), None)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let inline = &body["contents"][0]["parts"][0]["inlineData"];
    assert_eq!(inline["mimeType"], "audio/flac");
    assert_eq!(inline["data"], "ZkxhQwAAAAA=");
}

#[tokio::test]
async fn unauthorized_is_engine_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = engine_for(&server)
        .await
        .transcribe(&chunk(), &JobSettings::default(), None)
        .await
        .unwrap_err();

    assert_eq!(err, EngineError::EngineUnavailable("Invalid API key".to_string()));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn rate_limit_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = engine_for(&server)
        .await
        .transcribe(&chunk(), &JobSettings::default(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::EngineUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unsupported_media_is_final() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(415))
        .mount(&server)
        .await;

    let err = engine_for(&server)
        .await
        .transcribe(&chunk(), &JobSettings::default(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::UnsupportedFormat(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn empty_candidates_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = engine_for(&server)
        .await
        .transcribe(&chunk(), &JobSettings::default(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Internal(_)));
}

#[tokio::test]
async fn server_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;

    let err = engine_for(&server)
        .await
        .transcribe(&chunk(), &JobSettings::default(), None)
        .await
        .unwrap_err();

    match err {
        EngineError::Internal(message) => {
            assert!(message.contains("500"));
            assert!(message.contains("backend exploded"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
