//! External Media Downloader
//!
//! The downloader is an opaque collaborator: given a URL and the user's
//! cookies it produces one plaintext media file inside a destination
//! directory owned by the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A browser cookie forwarded to the downloader for authenticated sites.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Unix timestamp in seconds; `None` for session cookies.
    pub expires: Option<i64>,
}

impl DownloadCookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
            secure: false,
            http_only: false,
            expires: None,
        }
    }
}

// Cookie values are credentials.
impl fmt::Debug for DownloadCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadCookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .finish()
    }
}

/// Media downloader trait
///
/// `download` blocks until the file is complete. It is only ever called from
/// a dedicated download worker thread.
#[cfg_attr(test, mockall::automock)]
pub trait MediaDownloader: Send + Sync {
    /// Download `url` into `destination` and return the path of the produced
    /// file. The returned path must be inside `destination`.
    ///
    /// Download-specific failures are reported as
    /// [`BridgeError::DownloadFailed`](crate::BridgeError::DownloadFailed).
    fn download(
        &self,
        url: &str,
        cookies: &[DownloadCookie],
        destination: &Path,
    ) -> Result<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BridgeError;

    #[test]
    fn test_cookie_debug_redacts_value() {
        let cookie = DownloadCookie::new("session", "super-secret", ".example.com");
        let debug = format!("{:?}", cookie);
        assert!(debug.contains("session"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_mock_downloader_error() {
        let mut downloader = MockMediaDownloader::new();
        downloader
            .expect_download()
            .returning(|url, _, _| Err(BridgeError::DownloadFailed(format!("404 for {url}"))));

        let err = downloader
            .download("https://example.com/v", &[], Path::new("/tmp"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::DownloadFailed(_)));
    }
}
