//! URL and header rewriting so upstream pages keep routing through the proxy.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, ACCESS_CONTROL_ALLOW_ORIGIN,
    CACHE_CONTROL, CONTENT_LENGTH, HOST, LOCATION, ORIGIN, REFERER,
};
use url::Url;

const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

// Headers that stop a page from rendering inside the dashboard iframe.
const STRIP_RESPONSE_HEADERS: &[&str] = &[
    "content-security-policy",
    "x-frame-options",
    "cross-origin-embedder-policy",
    "cross-origin-opener-policy",
    "cross-origin-resource-policy",
];

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(href|src|action|formaction|ping)=("[^"]*"|'[^']*')"#)
            .expect("attribute regex is valid")
    })
}

fn srcset_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(srcset)=("[^"]*"|'[^']*')"#).expect("srcset regex is valid")
    })
}

fn css_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)url\(("[^"]*"|'[^']*'|[^)]+)\)"#).expect("css url regex is valid")
    })
}

fn passthrough_scheme_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(javascript:|data:|mailto:|tel:)").expect("scheme regex is valid")
    })
}

fn base_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<base\s").expect("base regex is valid"))
}

fn head_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<head(\s[^>]*)?>").expect("head regex is valid"))
}

/// `<proxy origin>/proxy?url=<target>`
pub fn proxy_link(target: &Url, proxy_origin: &str) -> String {
    let encoded: String =
        url::form_urlencoded::byte_serialize(target.as_str().as_bytes()).collect();
    format!("{}/proxy?url={}", proxy_origin, encoded)
}

/// Resolve `value` against `base` and route it through the proxy. Fragments,
/// inline schemes and unresolvable values come back trimmed but unchanged.
pub fn proxify_url(value: &str, base: &Url, proxy_origin: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return trimmed.to_string();
    }
    if passthrough_scheme_regex().is_match(trimmed) {
        return trimmed.to_string();
    }

    match base.join(trimmed) {
        Ok(resolved) => proxy_link(&resolved, proxy_origin),
        Err(e) => {
            log::warn!("[Proxy] failed to rewrite {} (base {}): {}", trimmed, base, e);
            trimmed.to_string()
        }
    }
}

fn split_quoted(value_with_quotes: &str) -> (char, &str) {
    let quote = if value_with_quotes.starts_with('"') { '"' } else { '\'' };
    let inner = &value_with_quotes[1..value_with_quotes.len() - 1];
    (quote, inner)
}

pub fn rewrite_html(html: &str, base: &Url, proxy_origin: &str) -> String {
    let transformed = attribute_regex().replace_all(html, |caps: &Captures| {
        let (quote, raw) = split_quoted(&caps[2]);
        let rewritten = proxify_url(raw, base, proxy_origin);
        format!("{}={}{}{}", &caps[1], quote, rewritten, quote)
    });

    let transformed = srcset_regex().replace_all(&transformed, |caps: &Captures| {
        let (quote, raw) = split_quoted(&caps[2]);
        let rewritten = raw
            .split(',')
            .map(|candidate| {
                let mut parts = candidate.split_whitespace();
                let url_part = parts.next().unwrap_or("");
                let proxied = proxify_url(url_part, base, proxy_origin);
                match parts.next() {
                    Some(descriptor) => format!("{} {}", proxied, descriptor),
                    None => proxied,
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}={}{}{}", &caps[1], quote, rewritten, quote)
    });

    let transformed = css_url_regex().replace_all(&transformed, |caps: &Captures| {
        let value = &caps[1];
        let quote = ["\"", "'"]
            .into_iter()
            .find(|q| value.len() >= 2 && value.starts_with(q) && value.ends_with(q))
            .unwrap_or("");
        let raw = &value[quote.len()..value.len() - quote.len()];
        format!("url({}{}{})", quote, proxify_url(raw, base, proxy_origin), quote)
    });

    if base_tag_regex().is_match(&transformed) {
        return transformed.into_owned();
    }

    let base_href = proxy_link(base, proxy_origin);
    head_tag_regex()
        .replace(&transformed, |caps: &Captures| {
            format!("{}\n<base href=\"{}\">", &caps[0], base_href)
        })
        .into_owned()
}

fn is_listed(name: &HeaderName, list: &[&str]) -> bool {
    list.contains(&name.as_str())
}

pub fn filter_request_headers(incoming: &HeaderMap, upstream: &Url) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in incoming {
        // reqwest sets its own length for the forwarded body.
        if is_listed(name, HOP_BY_HOP_HEADERS) || *name == CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    let origin = upstream.origin().ascii_serialization();
    if let Some(host) = upstream_host(upstream) {
        if let Ok(value) = HeaderValue::from_str(&host) {
            headers.insert(HOST, value);
        }
    }

    if headers.contains_key(ORIGIN) {
        if let Ok(value) = HeaderValue::from_str(&origin) {
            headers.insert(ORIGIN, value);
        }
    }

    if let Some(referer) = headers.get(REFERER) {
        let same_origin = referer
            .to_str()
            .ok()
            .and_then(|r| Url::parse(r).ok())
            .map(|r| r.origin() == upstream.origin())
            .unwrap_or(false);
        if !same_origin {
            if let Ok(value) = HeaderValue::from_str(&format!("{}/", origin)) {
                headers.insert(REFERER, value);
            }
        }
    }

    headers
}

fn upstream_host(upstream: &Url) -> Option<String> {
    let host = upstream.host_str()?;
    Some(match upstream.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

pub fn rewrite_response_headers(
    upstream_headers: &HeaderMap,
    upstream: &Url,
    proxy_origin: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream_headers {
        if is_listed(name, HOP_BY_HOP_HEADERS) || is_listed(name, STRIP_RESPONSE_HEADERS) {
            continue;
        }

        if *name == LOCATION {
            let redirect = value.to_str().ok().and_then(|v| upstream.join(v).ok());
            if let Some(redirect) = redirect {
                if let Ok(rewritten) = HeaderValue::from_str(&proxy_link(&redirect, proxy_origin)) {
                    headers.insert(LOCATION, rewritten);
                    continue;
                }
            }
        }

        headers.append(name.clone(), value.clone());
    }

    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers
}
