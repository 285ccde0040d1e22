//! Remote element fetching.
//!
//! The remote source publishes, per target key, an ordered list of elements
//! either as a bare JSON array or wrapped as `{"elements": [...]}`. A payload
//! carrying `access_denied: true` or an `error` string is an authorization
//! failure even when the HTTP status is 200.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use strata_core::{config::SourceConfig, Settings};

use crate::error::FetchError;

/// One element as returned by the remote source, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteElement {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub uuid: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub configuration: Settings,
}

impl RemoteElement {
    pub fn new(
        id: impl Into<String>,
        uuid: impl Into<String>,
        element_type: impl Into<String>,
        configuration: Settings,
    ) -> Self {
        Self {
            id: id.into(),
            uuid: uuid.into(),
            element_type: element_type.into(),
            configuration,
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Bare(Vec<RemoteElement>),
    Wrapped { elements: Vec<RemoteElement> },
}

/// Source of remote elements for one target.
pub trait RemoteElementFetcher {
    fn fetch(&self, source_key: &str) -> Result<Vec<RemoteElement>, FetchError>;
}

impl<T: RemoteElementFetcher + ?Sized> RemoteElementFetcher for &T {
    fn fetch(&self, source_key: &str) -> Result<Vec<RemoteElement>, FetchError> {
        (**self).fetch(source_key)
    }
}

impl<T: RemoteElementFetcher + ?Sized> RemoteElementFetcher for Box<T> {
    fn fetch(&self, source_key: &str) -> Result<Vec<RemoteElement>, FetchError> {
        (**self).fetch(source_key)
    }
}

/// Parse a response body into elements, classifying every failure.
pub fn parse_payload(body: &str) -> Result<Vec<RemoteElement>, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::EmptyBody);
    }
    let value: Value = serde_json::from_str(body)?;
    if let Some(reason) = denial_reason(&value) {
        return Err(FetchError::AccessDenied(reason));
    }
    match serde_json::from_value::<Payload>(value)? {
        Payload::Bare(elements) => Ok(elements),
        Payload::Wrapped { elements } => Ok(elements),
    }
}

fn denial_reason(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    if object.get("access_denied").and_then(Value::as_bool) == Some(true) {
        let message = object
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("access denied");
        return Some(message.to_string());
    }
    object
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Fetches `GET <base_url>/<source_key>` with an optional access-key header.
pub struct HttpFetcher {
    agent: ureq::Agent,
    base_url: String,
    access_key_header: String,
    access_key: Option<String>,
}

impl HttpFetcher {
    pub fn new(source: &SourceConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(source.timeout_secs))
            .build();
        Self {
            agent,
            base_url: source.base_url.trim_end_matches('/').to_string(),
            access_key_header: source.access_key_header.clone(),
            access_key: source.access_key.clone(),
        }
    }

    pub fn url_for(&self, source_key: &str) -> String {
        format!("{}/{}", self.base_url, source_key)
    }
}

impl RemoteElementFetcher for HttpFetcher {
    fn fetch(&self, source_key: &str) -> Result<Vec<RemoteElement>, FetchError> {
        let url = self.url_for(source_key);
        tracing::debug!("fetching {url}");
        let mut request = self.agent.get(&url);
        if let Some(key) = &self.access_key {
            request = request.set(&self.access_key_header, key);
        }
        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(FetchError::Status(code)),
            Err(err) => return Err(FetchError::Transport(err.to_string())),
        };
        if response.status() != 200 {
            return Err(FetchError::Status(response.status()));
        }
        let body = response
            .into_string()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        parse_payload(&body)
    }
}

// ---------------------------------------------------------------------------
// Local files
// ---------------------------------------------------------------------------

/// Reads `<root>/<source_key>.json`, for offline runs against exported payloads.
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, source_key: &str) -> PathBuf {
        self.root.join(format!("{source_key}.json"))
    }
}

impl RemoteElementFetcher for DirectoryFetcher {
    fn fetch(&self, source_key: &str) -> Result<Vec<RemoteElement>, FetchError> {
        let path = self.path_for(source_key);
        let body = std::fs::read_to_string(&path).map_err(|e| fetch_io_err(&path, e))?;
        parse_payload(&body)
    }
}

/// Used when no source is configured; every fetch fails.
pub struct UnconfiguredFetcher;

impl RemoteElementFetcher for UnconfiguredFetcher {
    fn fetch(&self, _source_key: &str) -> Result<Vec<RemoteElement>, FetchError> {
        Err(FetchError::NotConfigured)
    }
}

fn fetch_io_err(path: &Path, source: std::io::Error) -> FetchError {
    FetchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_bare_array_in_order() {
        let body = r#"[
            {"id": 1, "uuid": "a", "type": "text", "configuration": {"body": "x"}},
            {"id": "2", "uuid": "b", "type": "text"}
        ]"#;
        let elements = parse_payload(body).expect("parse");
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].id, "1");
        assert_eq!(elements[0].uuid, "a");
        assert_eq!(elements[1].id, "2");
        assert!(elements[1].configuration.is_empty());
    }

    #[test]
    fn parses_wrapped_payload() {
        let body = r#"{"elements": [{"id": 5, "uuid": "z", "type": "image"}]}"#;
        let elements = parse_payload(body).expect("parse");
        assert_eq!(elements[0].element_type, "image");
    }

    #[test]
    fn empty_and_malformed_bodies_fail() {
        assert!(matches!(parse_payload("  \n"), Err(FetchError::EmptyBody)));
        assert!(matches!(parse_payload("{not json"), Err(FetchError::Malformed(_))));
        assert!(matches!(
            parse_payload(r#"{"unexpected": true}"#),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn access_denied_markers_are_recognised() {
        let err = parse_payload(r#"{"access_denied": true, "message": "bad key"}"#).unwrap_err();
        assert!(matches!(err, FetchError::AccessDenied(ref m) if m == "bad key"));
        let err = parse_payload(r#"{"error": "Access denied"}"#).unwrap_err();
        assert!(matches!(err, FetchError::AccessDenied(ref m) if m == "Access denied"));
    }

    #[test]
    fn directory_fetcher_reads_json_by_key() {
        let dir = TempDir::new().expect("dir");
        std::fs::write(
            dir.path().join("home-page.json"),
            r#"[{"id": 1, "uuid": "a", "type": "text"}]"#,
        )
        .expect("write");
        let fetcher = DirectoryFetcher::new(dir.path());
        assert_eq!(fetcher.fetch("home-page").expect("fetch").len(), 1);
        assert!(matches!(fetcher.fetch("missing"), Err(FetchError::Io { .. })));
    }

    #[test]
    fn http_fetcher_joins_urls() {
        let source = SourceConfig {
            base_url: "https://cms.example.org/api/".into(),
            access_key: None,
            access_key_header: "X-Access-Key".into(),
            timeout_secs: 5,
        };
        let fetcher = HttpFetcher::new(&source);
        assert_eq!(
            fetcher.url_for("page-1"),
            "https://cms.example.org/api/page-1"
        );
    }

    #[test]
    fn unconfigured_fetcher_always_fails() {
        assert!(matches!(
            UnconfiguredFetcher.fetch("x"),
            Err(FetchError::NotConfigured)
        ));
    }
}
