//! The file-storage client and its six remote operations.
//!
//! A [`StorageClient`] is immutable after construction and safe to share
//! across tasks: concurrent operations share nothing but the underlying
//! connection pool. Every operation validates its path arguments, builds a
//! fresh-request factory plus a transient-status classifier, and runs one
//! resilient round trip through the retry executor.

use std::path::Path;
use std::time::Duration;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use reqwest::{Body, Method, StatusCode, Url};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::multistatus::{self, FileInfo};
use crate::path::RemotePath;
use crate::retry::{self, RetryPolicy, Verdict, is_retriable_status};

/// Bytes percent-encoded when a remote path is placed into a request URL.
/// `/` is deliberately left alone; it separates segments. `%` must be in the
/// set so a literal percent in a remote name survives the round trip.
const URL_PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}');

/// The listing request body: the only outbound XML this client sends. Names
/// exactly the properties the parser consumes.
const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:">
  <D:prop>
    <D:displayname/>
    <D:getcontentlength/>
    <D:getcontenttype/>
    <D:getlastmodified/>
    <D:resourcetype/>
  </D:prop>
</D:propfind>"#;

/// Suffix of the temporary sink a download streams into before its atomic
/// rename.
const PART_SUFFIX: &str = ".part";

/// Storage client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote document space.
    pub base_url: Url,
    /// Bearer credential, supplied externally (keyring, setup flow).
    pub token: String,
    /// Retry behavior shared by all operations.
    pub retry: RetryPolicy,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl Config {
    /// Creates a configuration with default retry behavior.
    #[must_use]
    pub fn new(base_url: Url, token: impl Into<String>) -> Self {
        Self {
            base_url,
            token: token.into(),
            retry: RetryPolicy::default(),
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the TCP connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Client for the remote file-storage protocol.
///
/// Holds no mutable state; all fields are fixed at construction, so one
/// instance may serve concurrent callers.
#[derive(Debug, Clone)]
pub struct StorageClient {
    http: reqwest::Client,
    base_url: Url,
    auth: HeaderValue,
    retry: RetryPolicy,
}

impl StorageClient {
    /// Builds a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the bearer token is not a valid header value or
    /// the HTTP transport cannot be constructed.
    pub fn new(config: Config) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| Error::Config("credential contains invalid bytes".to_string()))?;
        auth.set_sensitive(true);

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            auth,
            retry: config.retry,
        })
    }

    /// Lists the immediate children of a remote collection.
    ///
    /// Issues a depth-1 PROPFIND requesting the five properties the typed
    /// listing needs; the self entry is excluded from the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the collection does not exist, and
    /// [`Error::Xml`] when the multistatus body cannot be decoded.
    pub async fn list(&self, path: &str, cancel: &CancellationToken) -> Result<Vec<FileInfo>> {
        let remote = RemotePath::validate(path)?;
        let url = self.url_for(&remote.as_dir())?;

        let response = retry::execute(
            &self.http,
            cancel,
            &self.retry,
            "list",
            || {
                let request = self
                    .http
                    .request(dav_method("PROPFIND"), url.clone())
                    .header(AUTHORIZATION, self.auth.clone())
                    .header(CONTENT_TYPE, "application/xml; charset=utf-8")
                    .header("Depth", "1")
                    .body(PROPFIND_BODY)
                    .build();
                async move { request.map_err(Error::from) }
            },
            retry_transient(),
        )
        .await?;

        match response.status() {
            StatusCode::MULTI_STATUS => {
                let body = response.text().await?;
                let entries = multistatus::parse(&body, &remote)?;
                debug!(path = %remote, count = entries.len(), "listed collection");
                Ok(entries)
            }
            StatusCode::NOT_FOUND => Err(Error::NotFound(remote.as_str().to_string())),
            _ => Err(Error::from_response("list", response).await),
        }
    }

    /// Uploads a local file to the given remote path.
    ///
    /// The request factory re-opens the source on every attempt, so a retried
    /// upload always streams the file from its start with an explicit length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the source cannot be read and
    /// [`Error::Protocol`] on a terminal non-success status.
    pub async fn upload(
        &self,
        local: &Path,
        remote: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let remote = RemotePath::validate(remote)?;
        let url = self.url_for(remote.as_str())?;

        let response = retry::execute(
            &self.http,
            cancel,
            &self.retry,
            "upload",
            || {
                let url = url.clone();
                let auth = self.auth.clone();
                let http = &self.http;
                async move {
                    let file = tokio::fs::File::open(local).await?;
                    let len = file.metadata().await?.len();
                    let request = http
                        .request(Method::PUT, url)
                        .header(AUTHORIZATION, auth)
                        .header(CONTENT_LENGTH, len)
                        .body(Body::wrap_stream(ReaderStream::new(file)))
                        .build()?;
                    Ok::<_, Error>(request)
                }
            },
            retry_transient(),
        )
        .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::NO_CONTENT | StatusCode::OK => {
                info!(path = %remote, "uploaded");
                Ok(())
            }
            _ => Err(Error::from_response("upload", response).await),
        }
    }

    /// Downloads a remote file into a freshly created local file.
    ///
    /// The body streams into `<local>.part` and is renamed over the
    /// destination only once fully written, so a failed transfer never leaves
    /// a corrupt destination behind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the remote file does not exist and
    /// [`Error::Io`] when the sink cannot be written.
    pub async fn download(
        &self,
        remote: &str,
        local: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let remote = RemotePath::validate(remote)?;
        let url = self.url_for(remote.as_str())?;

        let response = retry::execute(
            &self.http,
            cancel,
            &self.retry,
            "download",
            || {
                let request = self
                    .http
                    .request(Method::GET, url.clone())
                    .header(AUTHORIZATION, self.auth.clone())
                    .build();
                async move { request.map_err(Error::from) }
            },
            retry_transient(),
        )
        .await?;

        match response.status() {
            StatusCode::OK => {
                let part = part_path(local);
                if let Err(err) = write_body(response, &part, cancel).await {
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(err);
                }
                if let Err(err) = tokio::fs::rename(&part, local).await {
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(err.into());
                }
                info!(path = %remote, "downloaded");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(Error::NotFound(remote.as_str().to_string())),
            _ => Err(Error::from_response("download", response).await),
        }
    }

    /// Creates a remote collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] when the server rejects the creation
    /// with method-not-allowed, which is how an existing collection presents.
    pub async fn mkdir(&self, path: &str, cancel: &CancellationToken) -> Result<()> {
        let remote = RemotePath::validate(path)?;
        let url = self.url_for(&remote.as_dir())?;

        let response = retry::execute(
            &self.http,
            cancel,
            &self.retry,
            "mkdir",
            || {
                let request = self
                    .http
                    .request(dav_method("MKCOL"), url.clone())
                    .header(AUTHORIZATION, self.auth.clone())
                    .build();
                async move { request.map_err(Error::from) }
            },
            retry_transient(),
        )
        .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => {
                info!(path = %remote, "created collection");
                Ok(())
            }
            StatusCode::METHOD_NOT_ALLOWED => {
                Err(Error::AlreadyExists(remote.as_str().to_string()))
            }
            _ => Err(Error::from_response("mkdir", response).await),
        }
    }

    /// Deletes a remote file or collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the resource does not exist.
    pub async fn delete(&self, path: &str, cancel: &CancellationToken) -> Result<()> {
        let remote = RemotePath::validate(path)?;
        let url = self.url_for(remote.as_str())?;

        let response = retry::execute(
            &self.http,
            cancel,
            &self.retry,
            "delete",
            || {
                let request = self
                    .http
                    .request(Method::DELETE, url.clone())
                    .header(AUTHORIZATION, self.auth.clone())
                    .build();
                async move { request.map_err(Error::from) }
            },
            retry_transient(),
        )
        .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK | StatusCode::ACCEPTED => {
                info!(path = %remote, "deleted");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(Error::NotFound(remote.as_str().to_string())),
            _ => Err(Error::from_response("delete", response).await),
        }
    }

    /// Moves a remote resource without overwriting the destination.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the source is missing and
    /// [`Error::DestinationExists`] when the destination is already occupied.
    pub async fn rename(&self, src: &str, dst: &str, cancel: &CancellationToken) -> Result<()> {
        let src = RemotePath::validate(src)?;
        let dst = RemotePath::validate(dst)?;
        let url = self.url_for(src.as_str())?;
        let destination = self.url_for(dst.as_str())?;

        let response = retry::execute(
            &self.http,
            cancel,
            &self.retry,
            "move",
            || {
                let request = self
                    .http
                    .request(dav_method("MOVE"), url.clone())
                    .header(AUTHORIZATION, self.auth.clone())
                    .header("Destination", destination.as_str())
                    .header("Overwrite", "F")
                    .build();
                async move { request.map_err(Error::from) }
            },
            retry_transient(),
        )
        .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::NO_CONTENT | StatusCode::OK => {
                info!(from = %src, to = %dst, "moved");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(Error::NotFound(src.as_str().to_string())),
            StatusCode::PRECONDITION_FAILED => {
                Err(Error::DestinationExists(dst.as_str().to_string()))
            }
            _ => Err(Error::from_response("move", response).await),
        }
    }

    /// Resolves a validated remote path against the base URL, encoding the
    /// segments for transport.
    fn url_for(&self, path: &str) -> Result<Url> {
        let encoded = utf8_percent_encode(path, URL_PATH_SET).to_string();
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{encoded}"))
            .map_err(|err| Error::Config(format!("cannot resolve {path} against base URL: {err}")))
    }
}

/// Builds the shared classification callback: transient statuses trigger
/// another attempt, everything else is terminal for the operation (the
/// caller maps success and semantic failures from the returned response).
fn retry_transient() -> impl FnMut(u32, &reqwest::Response) -> Verdict {
    |_, response| {
        if is_retriable_status(response.status()) {
            Verdict::Retry
        } else {
            Verdict::Done
        }
    }
}

/// Extension methods not covered by [`reqwest::Method`] constants.
#[allow(clippy::expect_used)]
fn dav_method(name: &'static str) -> Method {
    // The names used here are valid RFC 9110 tokens.
    Method::from_bytes(name.as_bytes()).expect("valid method token")
}

/// Returns the temporary sibling path a download streams into.
fn part_path(local: &Path) -> std::path::PathBuf {
    let mut name = local.file_name().map_or_else(
        || std::ffi::OsString::from("download"),
        std::ffi::OsStr::to_os_string,
    );
    name.push(PART_SUFFIX);
    local.with_file_name(name)
}

/// Streams a response body into `sink`, honoring cancellation between
/// chunks.
async fn write_body(
    mut response: reqwest::Response,
    sink: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut file = tokio::fs::File::create(sink).await?;
    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            chunk = response.chunk() => chunk?,
        };
        match chunk {
            Some(bytes) => file.write_all(&bytes).await?,
            None => break,
        }
    }
    file.flush().await?;
    Ok(())
}
