//! Remote document store backed by a GitHub gist.
//!
//! Each storage key is one file of the gist, holding the pretty-printed JSON
//! value. Public operations on [`GistStore`] are best-effort: failures are
//! logged and reported as "absent" or "not written" instead of errors, so a
//! flaky network never blocks the local-first path.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::StorageBackend;
use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// GitHub gists endpoint
pub const DEFAULT_GIST_API_URL: &str = "https://api.github.com/gists";

/// Description given to documents created on first write
pub const DOCUMENT_DESCRIPTION: &str = "WebTab shortcuts storage";

/// File read when the requested one is missing (single-file layout of older clients)
pub const LEGACY_FILE_KEY: &str = "data.json";

pub const PLACEHOLDER_FILE_KEY: &str = "placeholder.json";

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One file of a gist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl GistFile {
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }
}

/// A gist as returned by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistDocument {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub files: BTreeMap<String, GistFile>,
}

/// Body of a create request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGist {
    pub description: String,
    pub public: bool,
    pub files: BTreeMap<String, GistFile>,
}

impl NewGist {
    /// Private gist holding a single file
    pub fn private(description: impl Into<String>, file_key: &str, content: String) -> Self {
        Self {
            description: description.into(),
            public: false,
            files: BTreeMap::from([(file_key.to_string(), GistFile::with_content(content))]),
        }
    }
}

/// Body of an update request. A `None` file deletes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GistPatch {
    pub files: BTreeMap<String, Option<GistFile>>,
}

impl GistPatch {
    pub fn write(file_key: &str, content: String) -> Self {
        Self {
            files: BTreeMap::from([(file_key.to_string(), Some(GistFile::with_content(content)))]),
        }
    }

    pub fn delete<'a>(file_keys: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            files: file_keys
                .into_iter()
                .map(|key| (key.to_string(), None))
                .collect(),
        }
    }
}

/// Wire-level gist API
pub trait GistTransport: Send + Sync {
    fn fetch(&self, gist_id: &str) -> impl Future<Output = Result<GistDocument>> + Send;

    fn create(&self, gist: &NewGist) -> impl Future<Output = Result<GistDocument>> + Send;

    fn update(
        &self,
        gist_id: &str,
        patch: &GistPatch,
    ) -> impl Future<Output = Result<GistDocument>> + Send;
}

/// `GistTransport` over HTTPS with reqwest
#[derive(Clone)]
pub struct HttpGistTransport {
    api_url: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpGistTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpGistTransport")
            .field("api_url", &self.api_url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpGistTransport {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let api_url = normalize_api_url(api_url.into())?;
        let token = normalize_text_option(Some(token.into())).ok_or_else(|| {
            Error::Configuration("a GitHub token is required for gist sync".to_string())
        })?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("webtab/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            api_url,
            token,
            client,
        })
    }

    /// Transport against api.github.com
    pub fn github(token: impl Into<String>) -> Result<Self> {
        Self::new(DEFAULT_GIST_API_URL, token)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, format!("token {}", self.token))
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
    }

    fn document_url(&self, gist_id: &str) -> String {
        format!("{}/{}", self.api_url, gist_id.trim())
    }
}

impl GistTransport for HttpGistTransport {
    async fn fetch(&self, gist_id: &str) -> Result<GistDocument> {
        send(self.request(Method::GET, &self.document_url(gist_id))).await
    }

    async fn create(&self, gist: &NewGist) -> Result<GistDocument> {
        send(self.request(Method::POST, &self.api_url).json(gist)).await
    }

    async fn update(&self, gist_id: &str, patch: &GistPatch) -> Result<GistDocument> {
        send(
            self.request(Method::PATCH, &self.document_url(gist_id))
                .json(patch),
        )
        .await
    }
}

async fn send(request: RequestBuilder) -> Result<GistDocument> {
    let response = request.send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Remote(parse_api_error(status, &body)));
    }

    response
        .json::<GistDocument>()
        .await
        .map_err(|error| Error::Remote(format!("invalid gist payload: {error}")))
}

#[derive(Debug, Deserialize)]
struct GithubErrorBody {
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<GithubErrorBody>(body) {
        if let Some(message) = payload.message {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_api_url(raw: String) -> Result<String> {
    let url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Configuration("gist API URL must not be empty".to_string()))?;
    if !is_http_url(&url) {
        return Err(Error::Configuration(format!(
            "gist API URL must start with http:// or https://: {url}"
        )));
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Parse the value stored under `file_key`, falling back to the legacy file.
///
/// Returns `None` when neither file exists or the content is not JSON.
pub fn read_file(document: &GistDocument, file_key: &str) -> Option<Value> {
    let file = document
        .files
        .get(file_key)
        .or_else(|| document.files.get(LEGACY_FILE_KEY))?;
    let content = file.content.as_deref()?;

    match serde_json::from_str(content) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(
                "Remote file '{}' in gist {} is not valid JSON: {}",
                file_key,
                document.id,
                error
            );
            None
        }
    }
}

/// The remote document: one gist whose files are storage keys.
///
/// The document id is learned on the first successful create and reused for
/// every later request.
pub struct GistStore<T: GistTransport = HttpGistTransport> {
    transport: T,
    gist_id: Mutex<Option<String>>,
}

impl<T: GistTransport> std::fmt::Debug for GistStore<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("GistStore")
            .field("gist_id", &self.document_id())
            .finish_non_exhaustive()
    }
}

impl<T: GistTransport> GistStore<T> {
    pub fn new(transport: T, gist_id: Option<String>) -> Self {
        Self {
            transport,
            gist_id: Mutex::new(normalize_text_option(gist_id)),
        }
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Id of the gist in use, if one exists yet
    pub fn document_id(&self) -> Option<String> {
        self.lock_gist_id().clone()
    }

    fn lock_gist_id(&self) -> MutexGuard<'_, Option<String>> {
        self.gist_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remember(&self, gist_id: &str) {
        let mut current = self.lock_gist_id();
        if current.as_deref() != Some(gist_id) {
            tracing::info!("Using gist {gist_id}");
            *current = Some(gist_id.to_string());
        }
    }

    /// Fetch the whole document. `Ok(None)` when no document exists yet.
    pub async fn fetch_document(&self) -> Result<Option<GistDocument>> {
        let Some(gist_id) = self.document_id() else {
            return Ok(None);
        };
        self.transport.fetch(&gist_id).await.map(Some)
    }

    /// Read one file as JSON. Any failure reads as absent.
    pub async fn fetch_file(&self, file_key: &str) -> Option<Value> {
        match self.fetch_document().await {
            Ok(Some(document)) => read_file(&document, file_key),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!("Failed to read '{}' from gist: {}", file_key, error);
                None
            }
        }
    }

    /// Write one file, creating the document on first use.
    ///
    /// Returns the document id on success, `None` on any failure.
    pub async fn write_file(&self, file_key: &str, value: &Value) -> Option<String> {
        let content = match serde_json::to_string_pretty(value) {
            Ok(content) => content,
            Err(error) => {
                tracing::error!("Failed to encode '{}' for gist: {}", file_key, error);
                return None;
            }
        };

        let result = match self.document_id() {
            Some(gist_id) => {
                self.transport
                    .update(&gist_id, &GistPatch::write(file_key, content))
                    .await
            }
            None => {
                let gist = NewGist::private(DOCUMENT_DESCRIPTION, file_key, content);
                self.transport.create(&gist).await
            }
        };

        match result {
            Ok(document) => {
                self.remember(&document.id);
                Some(document.id)
            }
            Err(error) => {
                tracing::error!("Failed to write '{}' to gist: {}", file_key, error);
                None
            }
        }
    }

    /// Delete one file. No-op without a document; returns whether the
    /// remote accepted the change.
    pub async fn delete_file(&self, file_key: &str) -> bool {
        let Some(gist_id) = self.document_id() else {
            return true;
        };

        match self
            .transport
            .update(&gist_id, &GistPatch::delete([file_key]))
            .await
        {
            Ok(_) => true,
            Err(error) => {
                tracing::error!("Failed to delete '{}' from gist: {}", file_key, error);
                false
            }
        }
    }

    /// Empty the document's file set
    pub async fn clear_files(&self) -> bool {
        let document = match self.fetch_document().await {
            Ok(Some(document)) => document,
            Ok(None) => return true,
            Err(error) => {
                tracing::error!("Failed to read gist before clearing: {}", error);
                return false;
            }
        };
        if document.files.is_empty() {
            return true;
        }

        let patch = GistPatch::delete(document.files.keys().map(String::as_str));
        match self.transport.update(&document.id, &patch).await {
            Ok(_) => true,
            Err(error) => {
                tracing::error!("Failed to clear gist {}: {}", document.id, error);
                false
            }
        }
    }

    /// Create an empty private document and switch to it.
    ///
    /// Unlike the other operations this reports failure to the caller.
    pub async fn create_placeholder_document(&self, now: i64) -> Result<String> {
        let gist = NewGist::private(
            format!("web-tab-{now}"),
            PLACEHOLDER_FILE_KEY,
            json!({"placeholder": true}).to_string(),
        );
        let document = self.transport.create(&gist).await?;
        self.remember(&document.id);
        Ok(document.id)
    }
}

impl<T: GistTransport> StorageBackend for GistStore<T> {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.fetch_file(key).await)
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.write_file(key, &value).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.delete_file(key).await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.clear_files().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGist;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_patch_serializes_deletions_as_null() {
        let patch = GistPatch::delete(["todos"]);
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"files": {"todos": null}})
        );

        let write = GistPatch::write("todos", "[]".to_string());
        assert_eq!(
            serde_json::to_value(&write).unwrap(),
            json!({"files": {"todos": {"content": "[]"}}})
        );
    }

    #[test]
    fn test_new_gist_is_private() {
        let gist = NewGist::private(DOCUMENT_DESCRIPTION, "shortcuts", "[]".to_string());
        assert_eq!(
            serde_json::to_value(&gist).unwrap(),
            json!({
                "description": "WebTab shortcuts storage",
                "public": false,
                "files": {"shortcuts": {"content": "[]"}}
            })
        );
    }

    #[test]
    fn test_parse_api_error_prefers_message() {
        assert_eq!(
            parse_api_error(StatusCode::UNAUTHORIZED, r#"{"message":"Bad credentials"}"#),
            "Bad credentials (401)"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
    }

    #[test]
    fn test_http_transport_validates_inputs() {
        assert!(matches!(
            HttpGistTransport::new("api.github.com", "token"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            HttpGistTransport::github("   "),
            Err(Error::Configuration(_))
        ));

        let transport = HttpGistTransport::new("https://ghe.example.com/api/v3/gists/", "t").unwrap();
        assert_eq!(transport.api_url(), "https://ghe.example.com/api/v3/gists");
        assert_eq!(
            transport.document_url(" abc "),
            "https://ghe.example.com/api/v3/gists/abc"
        );
        assert!(!format!("{transport:?}").contains("\"t\""));
    }

    #[test]
    fn test_read_file_falls_back_to_legacy_file() {
        let document = GistDocument {
            id: "g1".to_string(),
            files: BTreeMap::from([(
                LEGACY_FILE_KEY.to_string(),
                GistFile::with_content(r#"[{"id":1}]"#),
            )]),
            ..GistDocument::default()
        };
        assert_eq!(read_file(&document, "shortcuts"), Some(json!([{"id": 1}])));

        let broken = GistDocument {
            id: "g2".to_string(),
            files: BTreeMap::from([("todos".to_string(), GistFile::with_content("{oops"))]),
            ..GistDocument::default()
        };
        assert_eq!(read_file(&broken, "todos"), None);
    }

    #[tokio::test]
    async fn test_first_write_creates_private_document() {
        let fake = FakeGist::default();
        let store = GistStore::new(fake.clone(), None);

        let id = store.write_file("shortcuts", &json!([])).await.unwrap();
        assert_eq!(store.document_id(), Some(id.clone()));

        let document = fake.document(&id).unwrap();
        assert!(!document.public);
        assert_eq!(document.description.as_deref(), Some(DOCUMENT_DESCRIPTION));
        assert_eq!(fake.file(&id, "shortcuts").as_deref(), Some("[]"));

        store.write_file("todos", &json!([{"id": 1}])).await.unwrap();
        assert_eq!(fake.document_count(), 1);
        assert_eq!(
            fake.file(&id, "todos").as_deref(),
            Some("[\n  {\n    \"id\": 1\n  }\n]")
        );
    }

    #[tokio::test]
    async fn test_reads_without_document_are_absent() {
        let fake = FakeGist::default();
        let store = GistStore::new(fake.clone(), None);

        assert_eq!(store.fetch_file("shortcuts").await, None);
        assert!(store.delete_file("shortcuts").await);
        assert!(store.clear_files().await);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let fake = FakeGist::default();
        let id = fake.seed([("shortcuts", "[]")]);
        let store = GistStore::new(fake.clone(), Some(id));
        fake.set_failing(true);

        assert_eq!(store.fetch_file("shortcuts").await, None);
        assert_eq!(store.write_file("shortcuts", &json!([1])).await, None);
        assert!(!store.delete_file("shortcuts").await);
        assert!(!store.clear_files().await);
    }

    #[tokio::test]
    async fn test_delete_and_clear_files() {
        let fake = FakeGist::default();
        let id = fake.seed([("shortcuts", "[]"), ("todos", "[]"), ("search_engine", "\"bing\"")]);
        let store = GistStore::new(fake.clone(), Some(id.clone()));

        assert!(store.delete_file("todos").await);
        assert_eq!(fake.file(&id, "todos"), None);
        assert_eq!(
            StorageBackend::get(&store, "search_engine").await.unwrap(),
            Some(json!("bing"))
        );

        assert!(store.clear_files().await);
        assert!(fake.document(&id).unwrap().files.is_empty());
    }

    #[tokio::test]
    async fn test_create_placeholder_document_surfaces_errors() {
        let fake = FakeGist::default();
        let store = GistStore::new(fake.clone(), None);

        let id = store.create_placeholder_document(1_700_000_000_000).await.unwrap();
        assert_eq!(store.document_id(), Some(id.clone()));
        let document = fake.document(&id).unwrap();
        assert_eq!(document.description.as_deref(), Some("web-tab-1700000000000"));
        assert_eq!(
            fake.file(&id, PLACEHOLDER_FILE_KEY).as_deref(),
            Some(r#"{"placeholder":true}"#)
        );

        fake.set_failing(true);
        assert!(matches!(
            store.create_placeholder_document(1).await,
            Err(Error::Remote(_))
        ));
    }
}
