//! CouchDB HTTP client.
//!
//! Speaks the plain CouchDB document API:
//!
//! ```text
//! GET    /{db}/{id}            fetch
//! POST   /{db}/_find           Mango query
//! PUT    /{db}/{id}            insert / update (body carries _rev)
//! DELETE /{db}/{id}?rev=...    delete
//! PUT    /{db}                 create database
//! ```

use crate::document::{Document, Revision};
use crate::error::{CouchError, Result};
use crate::query::FindQuery;
use crate::store::DocumentStore;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("couch-proto/", env!("CARGO_PKG_VERSION"));

/// Error body returned by CouchDB on failures.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    reason: Option<String>,
}

/// Body returned by successful writes.
#[derive(Debug, Deserialize)]
struct WriteResponse {
    rev: String,
}

/// Body returned by `_find`.
#[derive(Debug, Deserialize)]
struct FindResponse {
    docs: Vec<serde_json::Value>,
}

/// Builder for [`HttpStore`].
#[derive(Debug, Clone)]
pub struct HttpStoreBuilder {
    server: String,
    database: String,
    credentials: Option<(String, Option<String>)>,
    timeout: Duration,
}

impl HttpStoreBuilder {
    /// Set basic-auth credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.credentials = Some((username.into(), password));
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<HttpStore> {
        let mut server = Url::parse(&self.server).map_err(|e| CouchError::InvalidUrl(format!("{}: {}", self.server, e)))?;
        if server.cannot_be_a_base() {
            return Err(CouchError::InvalidUrl(self.server));
        }
        // Path segments are appended below; drop a trailing slash first.
        server
            .path_segments_mut()
            .map_err(|_| CouchError::InvalidUrl(self.server.clone()))?
            .pop_if_empty();

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(HttpStore {
            http,
            server,
            database: self.database,
            credentials: self.credentials,
        })
    }
}

/// Document store backed by a CouchDB server.
#[derive(Debug, Clone)]
pub struct HttpStore {
    http: reqwest::Client,
    server: Url,
    database: String,
    credentials: Option<(String, Option<String>)>,
}

impl HttpStore {
    /// Start building a client for `database` on `server` (e.g. `http://127.0.0.1:5984`).
    pub fn builder(server: impl Into<String>, database: impl Into<String>) -> HttpStoreBuilder {
        HttpStoreBuilder {
            server: server.into(),
            database: database.into(),
            credentials: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Database name this client addresses.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Create the database unless it already exists.
    ///
    /// Returns `true` when the database was created by this call.
    pub async fn ensure_database(&self) -> Result<bool> {
        let url = self.url(&[])?;
        let response = self.request(Method::PUT, url).send().await?;
        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                info!(database = %self.database, "Database created");
                Ok(true)
            }
            StatusCode::PRECONDITION_FAILED => {
                debug!(database = %self.database, "Database already exists");
                Ok(false)
            }
            _ => Err(error_from(response, &self.database).await),
        }
    }

    /// URL for the database, optionally followed by path segments.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.server.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| CouchError::InvalidUrl(self.server.to_string()))?;
            path.push(&self.database);
            path.extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, password.as_ref()),
            None => builder,
        }
    }

    async fn write(&self, doc: &Document) -> Result<Revision> {
        let url = self.url(&[doc.id()])?;
        let response = self
            .request(Method::PUT, url)
            .json(&doc.to_json())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from(response, doc.id()).await);
        }
        let body: WriteResponse = response.json().await?;
        Ok(Revision::new(body.rev))
    }
}

/// Turn a non-success response into a [`CouchError`].
async fn error_from(response: Response, id: &str) -> CouchError {
    let status = response.status().as_u16();
    let body = match response.bytes().await {
        Ok(bytes) => serde_json::from_slice::<ErrorBody>(&bytes).unwrap_or_default(),
        Err(_) => ErrorBody::default(),
    };
    CouchError::from_status(status, id, body.error.as_deref(), body.reason.as_deref())
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let url = self.url(&[id])?;
        let response = self.request(Method::GET, url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from(response, id).await);
        }

        let body: serde_json::Value = response.json().await?;
        Document::from_json(body).map(Some)
    }

    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>> {
        let url = self.url(&["_find"])?;
        let response = self
            .request(Method::POST, url)
            .json(&query.to_json())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from(response, "_find").await);
        }

        let body: FindResponse = response.json().await?;
        body.docs.into_iter().map(Document::from_json).collect()
    }

    async fn insert(&self, doc: &Document) -> Result<Revision> {
        if doc.revision().is_some() {
            return Err(CouchError::InvalidDocument(format!(
                "document {} already carries a revision",
                doc.id()
            )));
        }
        self.write(doc).await
    }

    async fn update(&self, doc: &Document) -> Result<Revision> {
        if doc.revision().is_none() {
            // CouchDB answers a revision-less write to an existing id with 409.
            return Err(CouchError::Conflict {
                id: doc.id().to_string(),
            });
        }
        self.write(doc).await
    }

    async fn delete(&self, doc: &Document) -> Result<()> {
        let Some(rev) = doc.revision() else {
            return Err(CouchError::Conflict {
                id: doc.id().to_string(),
            });
        };

        let mut url = self.url(&[doc.id()])?;
        url.query_pairs_mut().append_pair("rev", rev.as_str());
        let response = self.request(Method::DELETE, url).send().await?;

        if !response.status().is_success() {
            return Err(error_from(response, doc.id()).await);
        }
        Ok(())
    }
}
