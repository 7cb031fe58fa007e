//! Transcription endpoints and the rebuild-and-retry protocol.

use axum::{
    extract::{Multipart, State},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::state::AppState;
use hark_core::{join_text, suffix_for, ModelManager, Segment, StagedInput};

/// Successful transcription response: the raw segment sequence plus the
/// in-order concatenation of every segment text.
#[derive(Debug, Serialize)]
pub struct RecognizeResponse {
    pub code: u8,
    pub text: String,
    pub result: Vec<Segment>,
}

impl RecognizeResponse {
    fn from_segments(segments: Vec<Segment>) -> Self {
        Self {
            code: 0,
            text: join_text(&segments),
            result: segments,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UrlForm {
    pub url: String,
}

/// Run one transcription with the recovery protocol: a pipe fault on the
/// first attempt discards the recognizer and retries exactly once with a
/// fresh one. The second outcome is final either way; any other fault
/// propagates immediately without touching the model.
async fn transcribe_with_recovery(
    manager: &ModelManager,
    input: &str,
) -> hark_core::Result<Vec<Segment>> {
    match manager.transcribe(input).await {
        Err(first) if first.is_pipe_fault() => {
            warn!(input, "pipe fault during transcription, rebuilding recognizer and retrying");
            manager.invalidate().await;
            manager.transcribe(input).await
        }
        outcome => outcome,
    }
}

/// Upload an audio file and return its transcription.
pub async fn recognize_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<RecognizeResponse>, ApiError> {
    let mut upload: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed reading multipart field: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed reading 'file' field: {e}")))?;
            upload = Some((filename, bytes.to_vec()));
        }
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::bad_request("Missing 'file' field in multipart form"))?;

    info!(
        filename = filename.as_deref().unwrap_or("<unnamed>"),
        bytes = bytes.len(),
        "ASR upload request"
    );

    let suffix = suffix_for(filename.as_deref());
    let staged = StagedInput::stage(&bytes, &suffix).map_err(|e| {
        error!("failed to stage upload: {e}");
        ApiError::internal(e.to_string())
    })?;
    let input = staged.path().to_string_lossy().into_owned();

    // `staged` lives until this scope exits, so the file is released on
    // success and on both failure paths.
    match transcribe_with_recovery(&state.manager, &input).await {
        Ok(segments) => Ok(Json(RecognizeResponse::from_segments(segments))),
        Err(e) => {
            error!(input, "ASR failed: {e}");
            Err(e.into())
        }
    }
}

/// Run transcription on a remote file URL. The worker fetches the URL
/// itself; nothing is staged locally.
pub async fn recognize_url(
    State(state): State<AppState>,
    Form(form): Form<UrlForm>,
) -> Result<Json<RecognizeResponse>, ApiError> {
    let url = form.url;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ApiError::bad_request(
            "Invalid URL, must start with http:// or https://",
        ));
    }

    info!(url, "ASR URL request");

    match transcribe_with_recovery(&state.manager, &url).await {
        Ok(segments) => Ok(Json(RecognizeResponse::from_segments(segments))),
        Err(e) => {
            error!(url, "ASR URL failed: {e}");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use hark_core::{Error, Recognizer, RecognizerFactory};
    use http_body_util::BodyExt;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    /// Outcome of the next `transcribe` call, shared across every instance
    /// the scripted factory builds.
    enum Call {
        Ok(Vec<Segment>),
        PipeFault,
        Fail(&'static str),
    }

    struct Script {
        calls: Mutex<VecDeque<Call>>,
        builds: AtomicUsize,
    }

    impl Script {
        fn new(calls: Vec<Call>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(calls.into()),
                builds: AtomicUsize::new(0),
            })
        }

        fn build_count(&self) -> usize {
            self.builds.load(Ordering::SeqCst)
        }
    }

    struct ScriptedRecognizer {
        script: Arc<Script>,
    }

    impl Recognizer for ScriptedRecognizer {
        fn transcribe(&self, _input: &str) -> hark_core::Result<Vec<Segment>> {
            match self.script.calls.lock().unwrap().pop_front() {
                Some(Call::Ok(segments)) => Ok(segments),
                Some(Call::PipeFault) => Err(Error::PipeClosed("worker died".into())),
                Some(Call::Fail(msg)) => Err(Error::Inference(msg.into())),
                None => Ok(vec![]),
            }
        }
    }

    struct ScriptFactory(Arc<Script>);

    impl RecognizerFactory for ScriptFactory {
        fn build(&self) -> hark_core::Result<Arc<dyn Recognizer>> {
            self.0.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ScriptedRecognizer {
                script: Arc::clone(&self.0),
            }))
        }
    }

    fn router_with(script: Arc<Script>) -> axum::Router {
        create_router(crate::state::AppState::new(ModelManager::new(ScriptFactory(
            script,
        ))))
    }

    const BOUNDARY: &str = "hark-test-boundary";

    fn upload_request(filename: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/asr")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn url_request(url: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/asr/url")
            .header(
                header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(Body::from(format!(
                "url={}",
                url.replace(':', "%3A").replace('/', "%2F")
            )))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_never_touches_the_model() {
        let script = Script::new(vec![]);
        let router = router_with(Arc::clone(&script));

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"status": "ok"}));
        assert_eq!(script.build_count(), 0);
    }

    #[tokio::test]
    async fn upload_returns_concatenated_text_and_segments() {
        let script = Script::new(vec![Call::Ok(vec![
            Segment::new("hello "),
            Segment::new("world"),
        ])]);
        let router = router_with(Arc::clone(&script));

        let response = router.oneshot(upload_request("a.wav", b"RIFF")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["code"], 0);
        assert_eq!(json["text"], "hello world");
        assert_eq!(json["result"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_transcription_yields_empty_text_and_result() {
        let script = Script::new(vec![Call::Ok(vec![])]);
        let router = router_with(Arc::clone(&script));

        let response = router
            .oneshot(upload_request("silence.wav", b"RIFF"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["code"], 0);
        assert_eq!(json["text"], "");
        assert_eq!(json["result"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn upload_larger_than_two_megabytes_is_accepted() {
        let script = Script::new(vec![Call::Ok(vec![Segment::new("long recording")])]);
        let router = router_with(Arc::clone(&script));

        let payload = vec![0u8; 3 * 1024 * 1024];
        let response = router
            .oneshot(upload_request("long.wav", &payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["text"], "long recording");
    }

    #[tokio::test]
    async fn pipe_fault_rebuilds_once_and_retries() {
        let script = Script::new(vec![
            Call::PipeFault,
            Call::Ok(vec![Segment::new("recovered")]),
        ]);
        let router = router_with(Arc::clone(&script));

        let response = router.oneshot(upload_request("a.wav", b"RIFF")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["text"], "recovered");
        // One build for the first attempt, one for the rebuild.
        assert_eq!(script.build_count(), 2);
    }

    #[tokio::test]
    async fn second_pipe_fault_is_final() {
        let script = Script::new(vec![Call::PipeFault, Call::PipeFault]);
        let router = router_with(Arc::clone(&script));

        let response = router.oneshot(upload_request("a.wav", b"RIFF")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["code"], 1);
        // No third attempt, no third build.
        assert_eq!(script.build_count(), 2);
    }

    #[tokio::test]
    async fn non_pipe_fault_never_invalidates() {
        let script = Script::new(vec![
            Call::Fail("audio decode failed"),
            Call::Ok(vec![Segment::new("next request")]),
        ]);
        let router = router_with(Arc::clone(&script));

        let response = router
            .clone()
            .oneshot(upload_request("a.wav", b"RIFF"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["code"], 1);
        assert!(json["error"].as_str().unwrap().contains("audio decode failed"));

        // An independent request reuses the handle built for the first one.
        let response = router.oneshot(upload_request("b.wav", b"RIFF")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(script.build_count(), 1);
    }

    #[tokio::test]
    async fn missing_file_field_is_a_client_error() {
        let script = Script::new(vec![]);
        let router = router_with(Arc::clone(&script));

        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n",
        );
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/asr")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], 1);
        assert_eq!(script.build_count(), 0);
    }

    #[tokio::test]
    async fn invalid_url_never_reaches_the_model() {
        let script = Script::new(vec![]);
        let router = router_with(Arc::clone(&script));

        let response = router.oneshot(url_request("ftp://host/a.wav")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["code"], 1);
        assert_eq!(
            json["error"],
            "Invalid URL, must start with http:// or https://"
        );
        assert_eq!(script.build_count(), 0);
    }

    #[tokio::test]
    async fn valid_url_is_passed_straight_to_the_recognizer() {
        let script = Script::new(vec![Call::Ok(vec![Segment::new("from url")])]);
        let router = router_with(Arc::clone(&script));

        let response = router
            .oneshot(url_request("https://example.com/a.wav"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["text"], "from url");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_uploads_share_one_construction() {
        let script = Script::new(vec![
            Call::Ok(vec![Segment::new("one")]),
            Call::Ok(vec![Segment::new("two")]),
        ]);
        let router = router_with(Arc::clone(&script));

        let a = router.clone().oneshot(upload_request("a.wav", b"RIFF"));
        let b = router.clone().oneshot(upload_request("b.wav", b"RIFF"));
        let (ra, rb) = tokio::join!(a, b);
        assert_eq!(ra.unwrap().status(), StatusCode::OK);
        assert_eq!(rb.unwrap().status(), StatusCode::OK);
        assert_eq!(script.build_count(), 1);
    }
}
