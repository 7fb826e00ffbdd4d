//! Log redaction helpers.
//!
//! Blob URLs may carry a SAS token in the query string. Those values are
//! credentials and must not reach the logs.

/// Returns a copy of `url` with SAS credential values replaced.
///
/// This is intended for log output only.
#[must_use]
pub fn redact_url(url: &str) -> String {
    let Some(query_start) = url.find('?') else {
        return url.to_string();
    };

    let prefix = &url[..=query_start];
    let query_and_fragment = &url[query_start + 1..];
    let (query, fragment) = match query_and_fragment.split_once('#') {
        Some((query, fragment)) => (query, Some(fragment)),
        None => (query_and_fragment, None),
    };

    let redacted = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_sensitive_query_key(key) => format!("{key}=REDACTED"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&");

    match fragment {
        Some(fragment) => format!("{prefix}{redacted}#{fragment}"),
        None => format!("{prefix}{redacted}"),
    }
}

fn is_sensitive_query_key(key: &str) -> bool {
    let normalized = key.to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "sig"
            | "se"
            | "st"
            | "sp"
            | "spr"
            | "skoid"
            | "sktid"
            | "skt"
            | "ske"
            | "sks"
            | "skv"
            | "saoid"
            | "suoid"
            | "token"
            | "code"
    ) || normalized.starts_with("x-ms-")
}

/// A URL wrapper that redacts SAS parameters in `Display`.
#[derive(Debug, Clone, Copy)]
pub struct RedactedUrl<'a>(pub &'a str);

impl std::fmt::Display for RedactedUrl<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&redact_url(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_sas_signature_and_expiry() {
        let url = "https://acct.blob.core.windows.net/in/a.xlsx?sv=2022-11-02&se=2026-01-01&sig=abc%2Fdef";
        let redacted = redact_url(url);
        assert!(redacted.contains("sv=2022-11-02"));
        assert!(redacted.contains("se=REDACTED"));
        assert!(redacted.contains("sig=REDACTED"));
        assert!(!redacted.contains("abc%2Fdef"));
    }

    #[test]
    fn leaves_plain_urls_untouched() {
        let url = "https://acct.blob.core.windows.net/in/folder/a b.xlsx";
        assert_eq!(redact_url(url), url);
    }

    #[test]
    fn keeps_fragment() {
        let redacted = redact_url("https://h/p?sig=x#frag");
        assert_eq!(redacted, "https://h/p?sig=REDACTED#frag");
    }

    #[test]
    fn display_wrapper_redacts() {
        let shown = format!("{}", RedactedUrl("https://h/p?sig=secret"));
        assert!(!shown.contains("secret"));
    }
}
