//! End-to-end tests: session + HTTP engine against a loopback RAG service.
//!
//! The service is a small axum app that speaks the `/v1/ingest`,
//! `/v1/query` and `/v1/answer` contract with canned data, and records what
//! it was sent so the tests can check the wire side too.

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, Rgba, RgbaImage};
use multimodal_rag_demo::{
    Block, DemoConfig, HttpRagEngineFactory, PageRange, ProcessRequest, RagDemoError,
    SearchMode, SearchRequest, SearchView, Session, Upload,
};
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const API_KEY: &str = "sk-test";

// ── Fake RAG service ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Service {
    ingests: Mutex<Vec<Value>>,
    queried_collections: Mutex<Vec<String>>,
    fail_ingest: AtomicBool,
    malformed_query: AtomicBool,
    broken_image: AtomicBool,
}

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn png_base64(w: u32, h: u32) -> String {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    STANDARD.encode(&buf)
}

fn check_auth(headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    let expected = format!("Bearer {API_KEY}");
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(v) if v == expected => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid api key"})),
        )),
    }
}

async fn ingest(
    State(svc): State<Arc<Service>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    check_auth(&headers)?;
    if svc.fail_ingest.load(Ordering::SeqCst) {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "could not partition PDF"})),
        ));
    }
    let mut ingests = svc.ingests.lock().unwrap();
    ingests.push(body);
    Ok(Json(json!({"collection_id": format!("col-{}", ingests.len())})))
}

fn record_collection(svc: &Service, body: &Value) {
    if let Some(c) = body["collection_id"].as_str() {
        svc.queried_collections.lock().unwrap().push(c.to_string());
    }
}

async fn query(
    State(svc): State<Arc<Service>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<String, (StatusCode, Json<Value>)> {
    check_auth(&headers)?;
    record_collection(&svc, &body);
    if svc.malformed_query.load(Ordering::SeqCst) {
        return Ok("<html>not json</html>".to_string());
    }
    let top_k = body["top_k"].as_u64().unwrap_or(3) as usize;
    let catalog = [
        ("text_1", "Revenue grew 12% in Q1.".to_string(), json!({"page": 2})),
        ("table_1", "quarter,revenue\nQ1,10\nQ2,12".to_string(), json!({"page": 3})),
        ("image_1", png_base64(8, 6), json!({"summary": "Revenue bar chart"})),
        ("chunk_9", "Appendix".to_string(), Value::Null),
    ];
    let picked = &catalog[..top_k.min(catalog.len())];
    Ok(json!({
        "ids": picked.iter().map(|r| r.0).collect::<Vec<_>>(),
        "content": picked.iter().map(|r| r.1.clone()).collect::<Vec<_>>(),
        "metadata": picked.iter().map(|r| r.2.clone()).collect::<Vec<_>>(),
    })
    .to_string())
}

async fn answer(
    State(svc): State<Arc<Service>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    check_auth(&headers)?;
    record_collection(&svc, &body);
    let image = if svc.broken_image.load(Ordering::SeqCst) {
        "!!!".to_string()
    } else {
        png_base64(4, 4)
    };
    Ok(Json(json!({
        "answer": "Revenue grew 12% in Q1, driven by hardware.",
        "retrieved": {
            "ids": ["text_1", "image_2"],
            "content": ["Revenue grew 12% in Q1.", image],
            "metadata": [{}, {"summary": "Hardware sales chart"}],
        }
    })))
}

async fn spawn_service(svc: Arc<Service>) -> String {
    let app = Router::new()
        .route("/v1/ingest", post(ingest))
        .route("/v1/query", post(query))
        .route("/v1/answer", post(answer))
        .with_state(svc);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

// ── Helpers ──────────────────────────────────────────────────────────────────

struct Harness {
    svc: Arc<Service>,
    factory: HttpRagEngineFactory,
    session: Session,
    temp_dir: tempfile::TempDir,
}

async fn harness() -> Harness {
    let svc = Arc::new(Service::default());
    let endpoint = spawn_service(Arc::clone(&svc)).await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = DemoConfig::builder()
        .endpoint(endpoint)
        .request_timeout_secs(10)
        .temp_dir(temp_dir.path())
        .build()
        .unwrap();
    let factory = HttpRagEngineFactory::new(&config).unwrap();
    Harness {
        svc,
        factory,
        session: Session::new(config),
        temp_dir,
    }
}

fn pdf_upload(name: &str) -> Upload {
    Upload::new(name, b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\nfake body\n%%EOF".to_vec())
}

fn process_request(key: &str, name: &str) -> ProcessRequest {
    ProcessRequest::new(key, pdf_upload(name), PageRange::new(2, 4).unwrap()).unwrap()
}

fn temp_dir_is_empty(dir: &tempfile::TempDir) -> bool {
    std::fs::read_dir(dir.path()).unwrap().next().is_none()
}

// ── Process ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn process_sends_exact_bytes_and_page_range() {
    let mut h = harness().await;

    let report = h
        .session
        .process(&h.factory, process_request(API_KEY, "annual.pdf"))
        .await
        .expect("process should succeed");

    assert_eq!(report.file_name, "annual.pdf");
    assert_eq!(h.session.processed_file(), Some("annual.pdf"));
    assert!(h.session.is_ready());

    let ingests = h.svc.ingests.lock().unwrap();
    assert_eq!(ingests.len(), 1);
    let sent = &ingests[0];
    assert_eq!(sent["page_range"], json!([2, 4]));
    assert_eq!(sent["file_name"], "annual.pdf");
    let bytes = STANDARD
        .decode(sent["pdf_base64"].as_str().unwrap())
        .unwrap();
    assert_eq!(bytes, pdf_upload("x").bytes());

    assert!(temp_dir_is_empty(&h.temp_dir), "temp upload must be deleted");
}

#[tokio::test]
async fn failed_process_keeps_previous_state() {
    let mut h = harness().await;
    h.session
        .process(&h.factory, process_request(API_KEY, "first.pdf"))
        .await
        .unwrap();

    let err = h
        .session
        .process(&h.factory, process_request("sk-wrong", "second.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, RagDemoError::AuthError { .. }), "{err}");
    assert!(err.to_string().contains("invalid api key"));

    assert_eq!(h.session.processed_file(), Some("first.pdf"));
    assert!(h.session.is_ready());

    // Searches still go to the first collection.
    let req = SearchRequest::new("revenue", 1, SearchMode::Raw).unwrap();
    h.session.search(&req).await.unwrap();
    assert_eq!(
        h.svc.queried_collections.lock().unwrap().as_slice(),
        ["col-1"]
    );
}

#[tokio::test]
async fn ingest_failure_surfaces_message_and_deletes_temp_file() {
    let mut h = harness().await;
    h.svc.fail_ingest.store(true, Ordering::SeqCst);

    let err = h
        .session
        .process(&h.factory, process_request(API_KEY, "broken.pdf"))
        .await
        .unwrap_err();

    match &err {
        RagDemoError::EngineApi { status, message } => {
            assert_eq!(*status, 500);
            assert_eq!(message, "could not partition PDF");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!h.session.is_ready());
    assert!(h.session.processed_file().is_none());
    assert!(temp_dir_is_empty(&h.temp_dir), "temp upload must be deleted on failure");
}

#[tokio::test]
async fn reprocess_replaces_engine() {
    let mut h = harness().await;
    h.session
        .process(&h.factory, process_request(API_KEY, "a.pdf"))
        .await
        .unwrap();
    h.session
        .process(&h.factory, process_request(API_KEY, "b.pdf"))
        .await
        .unwrap();
    assert_eq!(h.session.processed_file(), Some("b.pdf"));

    let req = SearchRequest::new("revenue", 2, SearchMode::Raw).unwrap();
    h.session.search(&req).await.unwrap();
    assert_eq!(
        h.svc.queried_collections.lock().unwrap().as_slice(),
        ["col-2"]
    );
}

#[tokio::test]
async fn unreachable_service_is_reported() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = DemoConfig::builder()
        .endpoint(format!("http://{addr}"))
        .request_timeout_secs(5)
        .build()
        .unwrap();
    let factory = HttpRagEngineFactory::new(&config).unwrap();
    let mut session = Session::new(config);

    let err = session
        .process(&factory, process_request(API_KEY, "a.pdf"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, RagDemoError::EngineUnavailable { .. }),
        "{err}"
    );
    assert!(!session.is_ready());
}

// ── Search ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn raw_search_renders_ranked_sections() {
    let mut h = harness().await;
    h.session
        .process(&h.factory, process_request(API_KEY, "annual.pdf"))
        .await
        .unwrap();

    let req = SearchRequest::new("revenue", 3, SearchMode::Raw).unwrap();
    let view = h.session.search(&req).await.unwrap();

    let SearchView::Raw { sections } = view else {
        panic!("expected raw view");
    };
    let labels: Vec<_> = sections.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, ["Result 1", "Result 2", "Result 3"]);

    match &sections[0].block {
        Block::Text { content, .. } => assert_eq!(content, "Revenue grew 12% in Q1."),
        other => panic!("expected text, got {other:?}"),
    }
    match &sections[1].block {
        Block::Table { table, .. } => {
            assert_eq!(table.rows.len(), 3);
            assert_eq!(table.rows[1], ["Q1", "10"]);
        }
        other => panic!("expected table, got {other:?}"),
    }
    match &sections[2].block {
        Block::Image { image, summary } => {
            assert_eq!((image.width, image.height), (8, 6));
            assert_eq!(summary, "Revenue bar chart");
        }
        other => panic!("expected image, got {other:?}"),
    }
}

#[tokio::test]
async fn raw_search_with_null_metadata_entry() {
    let mut h = harness().await;
    h.session
        .process(&h.factory, process_request(API_KEY, "annual.pdf"))
        .await
        .unwrap();

    let req = SearchRequest::new("appendix", 4, SearchMode::Raw).unwrap();
    let view = h.session.search(&req).await.unwrap();
    assert_eq!(view.sections().len(), 4);
    assert_eq!(view.sections()[3].record_id, "chunk_9");
}

#[tokio::test]
async fn qa_search_shows_answer_and_only_images() {
    let mut h = harness().await;
    h.session
        .process(&h.factory, process_request(API_KEY, "annual.pdf"))
        .await
        .unwrap();

    let req = SearchRequest::new("Why did revenue grow?", 3, SearchMode::Qa).unwrap();
    let view = h.session.search(&req).await.unwrap();

    let SearchView::Qa { answer, images } = view else {
        panic!("expected qa view");
    };
    assert_eq!(answer, "Revenue grew 12% in Q1, driven by hardware.");
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].label, "Image");
    assert_eq!(images[0].record_id, "image_2");
    match &images[0].block {
        Block::Image { summary, .. } => assert_eq!(summary, "Hardware sales chart"),
        other => panic!("expected image, got {other:?}"),
    }
}

#[tokio::test]
async fn broken_image_fails_search_without_touching_state() {
    let mut h = harness().await;
    h.session
        .process(&h.factory, process_request(API_KEY, "annual.pdf"))
        .await
        .unwrap();
    h.svc.broken_image.store(true, Ordering::SeqCst);

    let req = SearchRequest::new("chart", 3, SearchMode::Qa).unwrap();
    let err = h.session.search(&req).await.unwrap_err();
    assert!(matches!(err, RagDemoError::InvalidBase64 { .. }), "{err}");
    assert_eq!(h.session.processed_file(), Some("annual.pdf"));
    assert!(h.session.is_ready());
}

#[tokio::test]
async fn malformed_response_is_reported() {
    let mut h = harness().await;
    h.session
        .process(&h.factory, process_request(API_KEY, "annual.pdf"))
        .await
        .unwrap();
    h.svc.malformed_query.store(true, Ordering::SeqCst);

    let req = SearchRequest::new("revenue", 3, SearchMode::Raw).unwrap();
    let err = h.session.search(&req).await.unwrap_err();
    assert!(matches!(err, RagDemoError::MalformedResponse { .. }), "{err}");
}

#[tokio::test]
async fn view_serialises_to_json() {
    let mut h = harness().await;
    h.session
        .process(&h.factory, process_request(API_KEY, "annual.pdf"))
        .await
        .unwrap();

    let req = SearchRequest::new("revenue", 3, SearchMode::Raw).unwrap();
    let view = h.session.search(&req).await.unwrap();
    let v: Value = serde_json::to_value(&view).unwrap();
    assert_eq!(v["mode"], "raw");
    assert_eq!(v["sections"][1]["block"]["type"], "table");
    assert_eq!(v["sections"][2]["block"]["image"]["format"], "png");
    assert!(v["sections"][2]["block"]["image"].get("bytes").is_none());
}
