//! Header hygiene: dropping denylisted/hop-by-hop headers before forwarding
//! upstream, and redacting sensitive values before anything is logged.

use http::{HeaderMap, HeaderName, HeaderValue};

const ACCEPT_ENCODING_IDENTITY: &str = "identity";

const SENSITIVE_HEADER_NAMES: &[&str] = &[
    "authorization",
    "x-api-key",
    "x-token",
    "cookie",
    "set-cookie",
    "proxy-authorization",
];

const REDACT_PREFIX_LEN: usize = 4;

/// Drops any header whose lowercase name matches a glob in `denylist_patterns`,
/// then forces `Accept-Encoding: identity` on the result so response bodies
/// stay parseable for usage extraction.
pub fn sanitize(headers: &HeaderMap, denylist_patterns: &[String]) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let lower = name.as_str().to_ascii_lowercase();
        if denylist_patterns.iter().any(|pattern| glob_match(pattern, &lower)) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out.insert(
        HeaderName::from_static("accept-encoding"),
        HeaderValue::from_static(ACCEPT_ENCODING_IDENTITY),
    );
    out
}

/// Case-insensitive glob match supporting a single `*` wildcard anywhere in
/// the pattern (the only shape the denylist ever uses: `x-forwarded-*`).
fn glob_match(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern.eq_ignore_ascii_case(name),
        Some((prefix, suffix)) => {
            let prefix = prefix.to_ascii_lowercase();
            let suffix = suffix.to_ascii_lowercase();
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(&prefix)
                && name.ends_with(&suffix)
        }
    }
}

/// Returns a copy of `headers` with sensitive values masked, for logging.
/// Never mutates the input.
pub fn redact(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let lower = name.as_str().to_ascii_lowercase();
        if SENSITIVE_HEADER_NAMES.iter().any(|sensitive| *sensitive == lower) {
            let redacted = redact_value(value.to_str().unwrap_or(""));
            if let Ok(header_value) = HeaderValue::from_str(&redacted) {
                out.append(name.clone(), header_value);
                continue;
            }
        }
        out.append(name.clone(), value.clone());
    }
    out
}

fn redact_value(value: &str) -> String {
    if value.len() <= REDACT_PREFIX_LEN {
        "[REDACTED]".to_string()
    } else {
        format!("{}...[REDACTED]", &value[..REDACT_PREFIX_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn sanitize_drops_denylisted_and_forces_identity_encoding() {
        let input = headers(&[
            ("Host", "upstream.example"),
            ("Authorization", "secret"),
            ("X-Forwarded-For", "1.2.3.4"),
            ("X-Custom", "keep-me"),
        ]);
        let denylist = vec![
            "host".to_string(),
            "authorization".to_string(),
            "x-forwarded-*".to_string(),
        ];
        let out = sanitize(&input, &denylist);
        assert!(out.get("host").is_none());
        assert!(out.get("authorization").is_none());
        assert!(out.get("x-forwarded-for").is_none());
        assert_eq!(out.get("x-custom").unwrap(), "keep-me");
        assert_eq!(out.get("accept-encoding").unwrap(), "identity");
    }

    #[test]
    fn redact_masks_sensitive_values_and_preserves_others() {
        let input = headers(&[("Authorization", "Bearer abcdefgh"), ("X-Custom", "unchanged")]);
        let out = redact(&input);
        assert_eq!(out.get("authorization").unwrap(), "Bear...[REDACTED]");
        assert_eq!(out.get("x-custom").unwrap(), "unchanged");
        assert_eq!(input.get("authorization").unwrap(), "Bearer abcdefgh");
    }

    #[test]
    fn redact_short_values_are_fully_masked() {
        let input = headers(&[("Cookie", "ab")]);
        let out = redact(&input);
        assert_eq!(out.get("cookie").unwrap(), "[REDACTED]");
    }
}
