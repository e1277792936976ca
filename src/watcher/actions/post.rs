//! Action that POSTs the file contents to a URL.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;

use crate::watcher::{Action, ActionError, Reporter};

/// Content type used when none is forced.
pub const DEFAULT_MIME: &str = "text/plain";

/// HTTP basic auth credentials (RFC 7617).
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Posts each file to `to`.
///
/// Any transport error or non-2xx answer counts as a failure.
#[derive(Debug, Clone)]
pub struct PostAction {
    to: String,
    mime: Option<String>,
    basic_auth: Option<BasicAuth>,
    client: reqwest::Client,
}

impl PostAction {
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            mime: None,
            basic_auth: None,
            client: reqwest::Client::new(),
        }
    }

    /// Force the `Content-Type` of every post.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Authenticate every post with HTTP basic auth.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.basic_auth = Some(BasicAuth {
            username: username.into(),
            password,
        });
        self
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    pub fn basic_auth(&self) -> Option<&BasicAuth> {
        self.basic_auth.as_ref()
    }

    async fn post(&self, path: &Path) -> Result<StatusCode, ActionError> {
        let body = tokio::fs::read(path)
            .await
            .map_err(|source| ActionError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut request = self
            .client
            .post(&self.to)
            .header(CONTENT_TYPE, self.mime.as_deref().unwrap_or(DEFAULT_MIME))
            .body(body);

        if let Some(auth) = &self.basic_auth {
            request = request.basic_auth(&auth.username, auth.password.as_ref());
        }

        let status = request.send().await?.status();
        if !status.is_success() {
            return Err(ActionError::Status { status });
        }
        Ok(status)
    }
}

#[async_trait]
impl Action for PostAction {
    fn name(&self) -> &str {
        "post"
    }

    async fn process(&self, reporter: &Reporter, path: &Path) -> bool {
        reporter.action(
            "post",
            format!("posting {} to {}", path.display(), self.to),
        );

        match self.post(path).await {
            Ok(status) => {
                reporter.action("post", format!("got response {status}"));
                true
            }
            Err(e) => {
                reporter.error(
                    "post",
                    format!("posting {} to {} failed: {e}", path.display(), self.to),
                );
                false
            }
        }
    }
}
