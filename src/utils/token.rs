//! Secret handling for text that leaves the process (logs, error details).

pub const REDACTED: &str = "***";

/// Replace every occurrence of `secret` in `text`. Empty secrets are a no-op.
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, REDACTED)
}

/// Embed a bearer token as the userinfo part of an `https://` URL.
///
/// URLs that are not `https://`, or an empty token, are returned unchanged.
pub fn embed_in_url(url: &str, token: &str) -> String {
    if token.is_empty() {
        return url.to_string();
    }
    match url.strip_prefix("https://") {
        Some(rest) => format!("https://{}@{}", token, rest),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_replaces_all_occurrences() {
        assert_eq!(redact("a ghp_x b ghp_x", "ghp_x"), "a *** b ***");
    }

    #[test]
    fn redact_empty_secret_is_noop() {
        assert_eq!(redact("unchanged", ""), "unchanged");
    }

    #[test]
    fn embed_token() {
        assert_eq!(
            embed_in_url("https://example.com/org/app.git", "ghp_x"),
            "https://ghp_x@example.com/org/app.git"
        );
    }

    #[test]
    fn embed_without_token_keeps_url() {
        assert_eq!(
            embed_in_url("https://example.com/org/app.git", ""),
            "https://example.com/org/app.git"
        );
    }
}
