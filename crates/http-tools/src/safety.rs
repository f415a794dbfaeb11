//! Keeping secrets out of error messages and logs.
//!
//! Transport errors travel all the way to the calling agent, so anything derived from a
//! `reqwest::Error` or a URL is scrubbed here first.

use url::Url;

#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    // Best-effort: drop credentials + query + fragment.
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}

/// Replace every occurrence of `secret` in `message`.
///
/// Short secrets are left alone: masking a two-character token would mangle unrelated text.
#[must_use]
pub fn redact_secret(message: &str, secret: &str) -> String {
    if secret.len() < 4 {
        return message.to_string();
    }
    message.replace(secret, "[redacted]")
}

/// Cut `s` to at most `max` bytes on a char boundary, marking the cut with `…`.
#[must_use]
pub fn truncate_for_message(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
