//! Blob references found in spreadsheet cells and event payloads.
//!
//! A reference is the `(account, container, path)` triple decomposed from a
//! URL of the form `https://<account>.blob.core.windows.net/<container>/<path>`.
//! The path is kept literally as written; [`ObjectReference::encoded_path`]
//! produces the store-safe form by percent-encoding each `/`-separated segment
//! on its own, so an encoded segment never introduces a new `/`.

use std::fmt;
use std::sync::OnceLock;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Host suffix of the public blob endpoint.
pub const BLOB_HOST_SUFFIX: &str = "blob.core.windows.net";

const BLOB_URL_PATTERN: &str =
    r"https://([^./\s]+)\.blob\.core\.windows\.net/([^/?#\s]+)/([^\r\n]+)";

/// Characters left unescaped inside one path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

fn blob_url_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(BLOB_URL_PATTERN).expect("blob URL pattern compiles"))
}

/// A decomposed reference to one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectReference {
    account: String,
    container: String,
    path: String,
}

impl ObjectReference {
    /// Builds a reference from its parts.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if any part is empty, the account contains
    /// a `.`, or the container contains a `/`.
    pub fn new(
        account: impl Into<String>,
        container: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self> {
        let account = account.into();
        let container = container.into();
        let path = path.into();

        if account.is_empty() || account.contains('.') {
            return Err(Error::InvalidInput(format!("invalid account name: {account:?}")));
        }
        if container.is_empty() || container.contains('/') {
            return Err(Error::InvalidInput(format!(
                "invalid container name: {container:?}"
            )));
        }
        if path.is_empty() {
            return Err(Error::InvalidInput("blob path must not be empty".to_string()));
        }

        Ok(Self {
            account,
            container,
            path,
        })
    }

    /// Extracts the first blob reference from free-form cell text.
    ///
    /// Returns `None` when the text holds no reference, which is the normal
    /// case for most cells. The path is taken literally and runs to the end of
    /// the line, so `?` and `#` are part of it.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let captures = blob_url_regex().captures(text.trim())?;
        let path = captures.get(3)?.as_str().trim_end();
        if path.is_empty() {
            return None;
        }

        Some(Self {
            account: captures.get(1)?.as_str().to_string(),
            container: captures.get(2)?.as_str().to_string(),
            path: path.to_string(),
        })
    }

    /// Parses a blob URL delivered by an event source.
    ///
    /// Unlike [`ObjectReference::parse`], any query string or fragment is
    /// dropped and the path is percent-decoded.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the URL is not a blob URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Self::parse(url)
            .ok_or_else(|| Error::InvalidInput(format!("not a blob URL: {url}")))?;
        let raw = parsed
            .path
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let path = decode_path(raw);
        Self::new(parsed.account, parsed.container, path)
    }

    /// Returns true if `text` contains a blob reference.
    #[must_use]
    pub fn is_reference(text: &str) -> bool {
        Self::parse(text).is_some()
    }

    /// Storage account name.
    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Container name.
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Literal object path inside the container.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Object path with each segment percent-encoded for use in a request URL.
    #[must_use]
    pub fn encoded_path(&self) -> String {
        encode_path(&self.path)
    }

    /// Last path segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "https://{}.{BLOB_HOST_SUFFIX}/{}/{}",
            self.account, self.container, self.path
        )
    }
}

/// Percent-encodes each `/`-separated segment of `path` independently.
#[must_use]
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Reverses [`encode_path`] segment by segment.
#[must_use]
pub fn decode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
