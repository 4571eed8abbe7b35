//! [`RagEngine`] backed by a multimodal RAG service speaking JSON over HTTP.
//!
//! ## Wire contract
//!
//! All requests carry the user's API key as a bearer token; the service uses
//! it for its own model calls.
//!
//! | Call | Request body | Response body |
//! |------|--------------|---------------|
//! | `POST /v1/ingest` | `{file_name, page_range:[s,e], pdf_base64}` | `{collection_id}` |
//! | `POST /v1/query`  | `{collection_id, query, top_k}` | `{ids, content, metadata}` |
//! | `POST /v1/answer` | `{collection_id, query, top_k}` | `{answer, retrieved:{ids, content, metadata}}` |
//!
//! The collection id returned by ingestion is kept inside the engine, so a
//! session that replaces its engine also moves to the new collection.

use super::{RagEngine, RagEngineFactory};
use crate::config::{DemoConfig, PageRange};
use crate::error::{RagDemoError, Result};
use crate::record::{QaAnswer, RetrievalBatch};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const INGEST_PATH: &str = "v1/ingest";
const QUERY_PATH: &str = "v1/query";
const ANSWER_PATH: &str = "v1/answer";

#[derive(Debug, Serialize)]
struct IngestRequest<'a> {
    file_name: &'a str,
    page_range: [usize; 2],
    pdf_base64: String,
}

#[derive(Debug, Deserialize)]
struct IngestResponse {
    collection_id: String,
}

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    collection_id: &'a str,
    query: &'a str,
    top_k: usize,
}

/// Creates [`HttpRagEngine`]s that share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpRagEngineFactory {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl HttpRagEngineFactory {
    pub fn new(config: &DemoConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RagDemoError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim().to_string(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RagEngineFactory for HttpRagEngineFactory {
    fn connect(&self, api_key: &str) -> Result<Box<dyn RagEngine>> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(RagDemoError::MissingApiKey);
        }
        if api_key.chars().any(|c| c.is_control()) {
            return Err(RagDemoError::AuthError {
                detail: "API key contains control characters".into(),
            });
        }
        Ok(Box::new(HttpRagEngine {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            api_key: api_key.to_string(),
            timeout_secs: self.timeout_secs,
            collection_id: None,
        }))
    }
}

/// One ingested collection on the RAG service.
pub struct HttpRagEngine {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
    collection_id: Option<String>,
}

impl std::fmt::Debug for HttpRagEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRagEngine")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("collection_id", &self.collection_id)
            .finish()
    }
}

impl HttpRagEngine {
    /// Collection id assigned by the service, once ingestion succeeded.
    pub fn collection_id(&self) -> Option<&str> {
        self.collection_id.as_deref()
    }

    fn collection(&self) -> Result<&str> {
        self.collection_id.as_deref().ok_or(RagDemoError::NoDocument)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = join_url(&self.endpoint, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(path, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| RagDemoError::MalformedResponse {
            operation: path.to_string(),
            detail: e.to_string(),
        })
    }

    fn transport_error(&self, path: &str, e: reqwest::Error) -> RagDemoError {
        if e.is_timeout() {
            RagDemoError::EngineTimeout {
                operation: path.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            RagDemoError::EngineUnavailable {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl RagEngine for HttpRagEngine {
    async fn process_pdf(
        &mut self,
        pdf_path: &Path,
        file_name: &str,
        range: PageRange,
    ) -> Result<()> {
        let bytes = tokio::fs::read(pdf_path)
            .await
            .map_err(|source| RagDemoError::UploadUnreadable {
                path: pdf_path.to_path_buf(),
                source,
            })?;

        info!(
            "Ingesting {} ({} bytes), pages {}",
            file_name,
            bytes.len(),
            range
        );

        let body = IngestRequest {
            file_name,
            page_range: [range.start(), range.end()],
            pdf_base64: STANDARD.encode(&bytes),
        };
        let resp: IngestResponse = self.post(INGEST_PATH, &body).await?;
        if resp.collection_id.trim().is_empty() {
            return Err(RagDemoError::MalformedResponse {
                operation: INGEST_PATH.to_string(),
                detail: "empty collection_id".into(),
            });
        }
        info!("Ingested into collection {}", resp.collection_id);
        self.collection_id = Some(resp.collection_id);
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<RetrievalBatch> {
        let body = SearchBody {
            collection_id: self.collection()?,
            query: text,
            top_k,
        };
        self.post(QUERY_PATH, &body).await
    }

    async fn answer_user_query(&self, text: &str, top_k: usize) -> Result<QaAnswer> {
        let body = SearchBody {
            collection_id: self.collection()?,
            query: text,
            top_k,
        };
        self.post(ANSWER_PATH, &body).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// `base` + `/` + `path`, without doubling the slash.
fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Map a non-success status to an error, keeping the service's message.
fn status_error(status: StatusCode, body: String) -> RagDemoError {
    let message = extract_message(&body).unwrap_or(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RagDemoError::AuthError { detail: message },
        _ => RagDemoError::EngineApi {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull `error` / `detail` / `message` out of a JSON error body.
fn extract_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "detail", "message"]
        .iter()
        .find_map(|k| v.get(*k))
        .map(|m| match m {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> HttpRagEngineFactory {
        HttpRagEngineFactory::new(&DemoConfig::default()).unwrap()
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://h:1", "v1/query"), "http://h:1/v1/query");
        assert_eq!(join_url("http://h:1/", "/v1/query"), "http://h:1/v1/query");
        assert_eq!(
            join_url("http://h:1/rag/", "v1/ingest"),
            "http://h:1/rag/v1/ingest"
        );
    }

    #[test]
    fn connect_rejects_empty_key() {
        assert!(matches!(
            factory().connect("   "),
            Err(RagDemoError::MissingApiKey)
        ));
    }

    #[test]
    fn connect_rejects_control_characters() {
        // surrounding whitespace is trimmed, embedded control chars are not
        assert!(factory().connect("sk-abc\n").is_ok());
        assert!(matches!(
            factory().connect("sk-a\u{7}bc"),
            Err(RagDemoError::AuthError { .. })
        ));
    }

    #[tokio::test]
    async fn query_before_ingest_is_no_document() {
        let engine = factory().connect("sk-test").unwrap();
        let err = engine.query("hello", 3).await.unwrap_err();
        assert!(matches!(err, RagDemoError::NoDocument));
        let err = engine.answer_user_query("hello", 3).await.unwrap_err();
        assert!(matches!(err, RagDemoError::NoDocument));
    }

    #[test]
    fn status_error_maps_auth() {
        let e = status_error(StatusCode::UNAUTHORIZED, r#"{"error":"bad key"}"#.into());
        match e {
            RagDemoError::AuthError { detail } => assert_eq!(detail, "bad key"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn status_error_keeps_plain_body() {
        let e = status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom".into());
        match e {
            RagDemoError::EngineApi { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn extract_message_variants() {
        assert_eq!(extract_message(r#"{"detail":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(
            extract_message(r#"{"message":{"code":1}}"#).as_deref(),
            Some(r#"{"code":1}"#)
        );
        assert_eq!(extract_message("not json"), None);
        assert_eq!(extract_message(r#"{"other":1}"#), None);
    }

    #[test]
    fn debug_redacts_key() {
        let engine = HttpRagEngine {
            client: reqwest::Client::new(),
            endpoint: "http://h".into(),
            api_key: "sk-secret".into(),
            timeout_secs: 1,
            collection_id: None,
        };
        let dbg = format!("{engine:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("redacted"));
    }
}
