use url::Url;

use crate::error::AllowlistError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Label {
    Literal(String),
    Wildcard,
}

#[derive(Debug, Clone)]
struct AllowEntry {
    scheme: String,
    port: u16,
    labels: Vec<Label>,
    /// no literal label at all: compiled but never matches
    unanchored: bool,
}

/// Compiled list of destinations allowed to receive a bearer token.
#[derive(Debug, Clone, Default)]
pub struct EndpointAllowlist {
    entries: Vec<AllowEntry>,
}

/// Explicit port, else 80/443 for http/https. Other schemes have no default.
fn effective_port(url: &Url) -> Option<u16> {
    url.port().or_else(|| match url.scheme() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    })
}

/// `Url` drops a port equal to its scheme default (`wss://h:443` parses
/// without port). Recover it only when the pattern text spells it out.
fn written_default_port(pattern: &str, url: &Url) -> Option<u16> {
    let default = url.port_or_known_default()?;
    let (_, rest) = pattern.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    authority
        .ends_with(&format!(":{}", default))
        .then_some(default)
}

fn host_of(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_lowercase)
}

impl EndpointAllowlist {
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, AllowlistError> {
        let entries = patterns
            .iter()
            .map(|p| compile_entry(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_allowed(&self, url: &Url) -> bool {
        let Some(host) = host_of(url) else {
            return false;
        };
        // the destination really connects to its scheme default
        let Some(port) = effective_port(url).or_else(|| url.port_or_known_default()) else {
            return false;
        };
        let labels: Vec<&str> = host.split('.').collect();
        if labels.iter().any(|l| l.is_empty()) {
            return false;
        }
        self.entries
            .iter()
            .any(|entry| entry.matches(url.scheme(), port, &labels))
    }

    /// Unparsable destinations are never allowed.
    pub fn is_allowed_str(&self, url: &str) -> bool {
        Url::parse(url).map(|u| self.is_allowed(&u)).unwrap_or(false)
    }
}

fn compile_entry(pattern: &str) -> Result<AllowEntry, AllowlistError> {
    let url = Url::parse(pattern).map_err(|e| AllowlistError::invalid(pattern, e.to_string()))?;
    if url.scheme().is_empty() || url.scheme() == "*" {
        return Err(AllowlistError::invalid(pattern, "scheme is required"));
    }
    let host = host_of(&url).ok_or_else(|| AllowlistError::invalid(pattern, "host is required"))?;
    let port = effective_port(&url)
        .or_else(|| written_default_port(pattern, &url))
        .ok_or_else(|| {
        AllowlistError::invalid(
            pattern,
            format!("scheme '{}' requires explicit port", url.scheme()),
        )
    })?;

    let labels = host
        .split('.')
        .map(|label| match label {
            "" => Err(AllowlistError::invalid(pattern, "empty host label")),
            "*" => Ok(Label::Wildcard),
            literal => Ok(Label::Literal(literal.to_owned())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let unanchored = labels.iter().all(|l| *l == Label::Wildcard);

    Ok(AllowEntry {
        scheme: url.scheme().to_owned(),
        port,
        labels,
        unanchored,
    })
}

impl AllowEntry {
    fn matches(&self, scheme: &str, port: u16, host: &[&str]) -> bool {
        if self.unanchored || scheme != self.scheme || port != self.port {
            return false;
        }
        match self.labels.split_first() {
            // leading wildcard absorbs one or more labels, the rest align 1:1
            Some((Label::Wildcard, rest)) => {
                host.len() > rest.len() && labels_match(rest, &host[host.len() - rest.len()..])
            }
            _ => labels_match(&self.labels, host),
        }
    }
}

fn labels_match(pattern: &[Label], host: &[&str]) -> bool {
    pattern.len() == host.len()
        && pattern.iter().zip(host).all(|(p, h)| match p {
            Label::Wildcard => true,
            Label::Literal(literal) => literal == h,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowlist(patterns: &[&str]) -> EndpointAllowlist {
        EndpointAllowlist::compile(patterns).unwrap()
    }

    #[test]
    fn rejects_invalid_patterns() {
        for pattern in [
            "",
            "example.net",
            "/foobar",
            "*://example.net",
            "://example.net",
            "tcp://example.net",
            "tcp://example.net:*",
            "svc:///path-only",
            "ws://example.net",
            "wss://example.net",
            "ftp://example.net",
            "wss://*.example.net/socket",
        ] {
            assert!(
                EndpointAllowlist::compile(&[pattern]).is_err(),
                "pattern '{}' should not compile",
                pattern
            );
        }
    }

    #[test]
    fn non_http_schemes_need_a_written_port() {
        let err = EndpointAllowlist::compile(&["wss://example.net"]).unwrap_err();
        assert!(err.to_string().contains("requires explicit port"));

        let list = allowlist(&["wss://stream.example.net:443", "ftp://files.example.net:2121"]);
        assert!(list.is_allowed_str("wss://stream.example.net"));
        assert!(list.is_allowed_str("wss://stream.example.net:443/feed"));
        assert!(!list.is_allowed_str("ws://stream.example.net"));
        assert!(list.is_allowed_str("ftp://files.example.net:2121/pub"));
        assert!(!list.is_allowed_str("ftp://files.example.net/pub"));
    }

    #[test]
    fn error_names_the_pattern() {
        let err = EndpointAllowlist::compile(&["tcp://example.net"]).unwrap_err();
        assert!(err.to_string().contains("tcp://example.net"));
        assert!(err.to_string().contains("requires explicit port"));
    }

    #[test]
    fn exact_scheme() {
        let a = allowlist(&["https://example.com", "svc://example.net:5001"]);
        assert!(a.is_allowed_str("https://example.com"));
        assert!(a.is_allowed_str("svc://example.net:5001"));
        assert!(!a.is_allowed_str("http://example.com"));
        assert!(!a.is_allowed_str("https://example.net:5001"));
    }

    #[test]
    fn exact_port() {
        let a = allowlist(&[
            "http://example.org:80",
            "https://example.com:443",
            "https://example1.net:3000",
            "svc://example2.net:5001",
        ]);
        assert!(a.is_allowed_str("https://example1.net:3000"));
        assert!(a.is_allowed_str("http://example.org"));
        assert!(a.is_allowed_str("https://example.com"));
        assert!(!a.is_allowed_str("https://example1.net"));
        assert!(!a.is_allowed_str("svc://example2.net"));
        assert!(!a.is_allowed_str("svc://example2.net:555"));
    }

    #[test]
    fn default_port_for_known_scheme() {
        let a = allowlist(&["http://example.org", "https://example.com"]);
        assert!(a.is_allowed_str("http://example.org"));
        assert!(a.is_allowed_str("https://example.com"));
        assert!(a.is_allowed_str("http://example.org:80"));
        assert!(a.is_allowed_str("https://example.com:443"));
        assert!(!a.is_allowed_str("http://example.org:5001"));
        assert!(!a.is_allowed_str("https://example.com:80"));
    }

    #[test]
    fn host_matching() {
        let a = allowlist(&["https://example.com", "https://*.example.net"]);
        assert!(!a.is_allowed_str(""));
        assert!(!a.is_allowed_str("/test"));
        assert!(!a.is_allowed_str("svc:///test"));
        assert!(!a.is_allowed_str("https://localhost/"));
        assert!(!a.is_allowed_str("https://unknown.com/"));
        assert!(a.is_allowed_str("https://example.com/"));
        assert!(a.is_allowed_str("https://EXAMPLE.com/path?q=1"));
        assert!(!a.is_allowed_str("https://subdomain.example.com/"));
        assert!(a.is_allowed_str("https://test.example.net/"));
        assert!(a.is_allowed_str("https://test.subdomain.example.net/"));
        assert!(!a.is_allowed_str("https://example.net/"));
        assert!(!a.is_allowed_str("https://.example.net/"));
    }

    #[test]
    fn all_wildcard_pattern_never_matches() {
        let a = allowlist(&["https://*.*.*"]);
        assert_eq!(a.len(), 1);
        assert!(!a.is_allowed_str("https://a.b.c"));
        assert!(!a.is_allowed_str("https://first.second.third.fourth"));
    }

    #[test]
    fn interior_wildcards_consume_one_label() {
        let a = allowlist(&["https://first.*.*.net"]);
        assert!(a.is_allowed_str("https://first.second.third.net"));
        assert!(!a.is_allowed_str("https://first.second.third.fourth.net"));
        assert!(!a.is_allowed_str("https://first.second.net"));
    }

    #[test]
    fn leading_and_interior_wildcards() {
        let a = allowlist(&["https://*.fourth.*.net"]);
        assert!(a.is_allowed_str("https://first.second.third.fourth.fifth.net"));
        assert!(a.is_allowed_str("https://third.fourth.fifth.net"));
        assert!(!a.is_allowed_str("https://fourth.fifth.net"));
        assert!(!a.is_allowed_str("https://first.fourth.fifth.sixth.net"));
    }

    #[test]
    fn leading_and_trailing_wildcards() {
        let a = allowlist(&["https://*.foo.*"]);
        assert!(a.is_allowed_str("https://a.foo.com"));
        assert!(a.is_allowed_str("https://a.b.foo.com"));
        assert!(!a.is_allowed_str("https://foo.com"));
        assert!(!a.is_allowed_str("https://a.foo.b.com"));
    }

    #[test]
    fn empty_allowlist_allows_nothing() {
        let a = EndpointAllowlist::compile::<&str>(&[]).unwrap();
        assert!(a.is_empty());
        assert!(!a.is_allowed_str("https://example.com"));
    }
}
