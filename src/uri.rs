//! URI value type.
//!
//! [`Uri`] holds the components of a URI reference (RFC 3986) parsed from a
//! string. It can be constructed from common string and URI types via
//! [`IntoUri`]. Unlike [`http::Uri`], it keeps the fragment and accepts
//! relative references, so it round-trips anything a caller can hand to a
//! request factory.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use http::uri::{Authority, PathAndQuery, Scheme};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::error::{InvalidArgumentError, InvalidUriSnafu, MissingHostSnafu, UnsendableUriSnafu};

/// A parsed URI reference.
///
/// All `with_*` methods return a new value; a `Uri` is never modified in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Uri {
    scheme: Option<String>,
    user_info: Option<String>,
    // `Some("")` is an empty authority, as in `file:///etc/hosts`.
    host: Option<String>,
    port: Option<u16>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl Uri {
    /// Parses a URI reference.
    ///
    /// An empty string yields the empty URI.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgumentError::InvalidUri`] if the string is not a
    /// syntactically valid URI reference, or [`InvalidArgumentError::MissingHost`]
    /// for an `http`/`https` URI without a host.
    pub fn parse(input: &str) -> Result<Self, InvalidArgumentError> {
        let invalid = |reason: &str| InvalidUriSnafu { input, reason }.build();

        let (rest, fragment) = match input.split_once('#') {
            Some((rest, fragment)) => {
                ensure!(
                    fragment.bytes().all(is_fragment_byte),
                    InvalidUriSnafu {
                        input,
                        reason: "fragment contains invalid characters",
                    }
                );
                (rest, Some(fragment.to_owned()))
            }
            None => (input, None),
        };

        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };

        let (scheme, rest) = match split_scheme(rest) {
            Some((scheme, rest)) => {
                let parsed = Scheme::from_str(scheme).map_err(|e| invalid(&e.to_string()))?;
                (Some(parsed.as_str().to_ascii_lowercase()), rest)
            }
            None => (None, rest),
        };

        let (authority, path) = match rest.strip_prefix("//") {
            Some(rest) => {
                let end = rest.find('/').unwrap_or(rest.len());
                (Some(&rest[..end]), &rest[end..])
            }
            None => (None, rest),
        };

        let mut uri = Uri {
            scheme,
            path: path.to_owned(),
            query: query.map(str::to_owned),
            fragment,
            ..Uri::default()
        };

        if let Some(authority) = authority {
            if authority.is_empty() {
                uri.host = Some(String::new());
            } else {
                let parsed = Authority::from_str(authority).map_err(|e| invalid(&e.to_string()))?;
                ensure!(
                    !parsed.host().is_empty(),
                    InvalidUriSnafu {
                        input,
                        reason: "authority has an empty host",
                    }
                );
                let (user_info, host_port) = match authority.rsplit_once('@') {
                    Some((user_info, host_port)) => (Some(user_info), host_port),
                    None => (None, authority),
                };
                ensure!(
                    host_port.starts_with('[') == host_port.contains(']'),
                    InvalidUriSnafu {
                        input,
                        reason: "unbalanced brackets around IP literal",
                    }
                );
                uri.port = match host_port.rsplit_once(':') {
                    Some((_, port)) if !port.contains(']') && !port.is_empty() => {
                        Some(port.parse().map_err(|_| invalid("port is not a 16-bit number"))?)
                    }
                    _ => None,
                };
                uri.user_info = user_info.map(str::to_owned);
                uri.host = Some(parsed.host().to_owned());
            }
        } else if uri.path.starts_with("//") {
            return Err(invalid("path cannot begin with `//` without an authority"));
        }

        if uri.scheme.is_none()
            && authority.is_none()
            && uri.path.split('/').next().is_some_and(|seg| seg.contains(':'))
        {
            return Err(invalid("first path segment of a relative reference contains `:`"));
        }

        if !uri.path.is_empty() || uri.query.is_some() {
            // `PathAndQuery` only takes origin-form, so rootless paths are checked rooted.
            let root = if uri.path.is_empty() || uri.path.starts_with('/') { "" } else { "/" };
            let path_and_query = match &uri.query {
                Some(query) => format!("{root}{}?{query}", uri.path),
                None => format!("{root}{}", uri.path),
            };
            PathAndQuery::from_str(&path_and_query).map_err(|e| invalid(&e.to_string()))?;
        }

        if let Some(scheme) = uri.scheme.as_deref()
            && matches!(scheme, "http" | "https")
            && uri.host.as_deref().is_none_or(str::is_empty)
        {
            return MissingHostSnafu { input, scheme }.fail();
        }

        Ok(uri)
    }

    /// Returns the scheme, lower-cased.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Returns the user information preceding `@` in the authority.
    #[must_use]
    pub fn user_info(&self) -> Option<&str> {
        self.user_info.as_deref()
    }

    /// Returns the host. IPv6 literals keep their brackets.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().filter(|h| !h.is_empty())
    }

    /// Returns the explicit port, if any.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the port, falling back to the default for `http` and `https`.
    #[must_use]
    pub fn port_or_default(&self) -> Option<u16> {
        self.port.or(match self.scheme.as_deref() {
            Some("http") => Some(80),
            Some("https") => Some(443),
            _ => None,
        })
    }

    /// Returns the path. May be empty.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the query, without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the fragment, without the leading `#`.
    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Returns true if the URI has a scheme.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.scheme.is_some()
    }

    /// Returns true if every component is absent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns a copy with the given scheme, lower-cased.
    #[must_use]
    pub fn with_scheme(mut self, scheme: Option<impl Into<String>>) -> Self {
        self.scheme = scheme.map(|s| s.into().to_ascii_lowercase());
        self
    }

    /// Returns a copy with the given host. `Some("")` is an empty authority.
    ///
    /// Removing the host also removes the user information and the port.
    #[must_use]
    pub fn with_host(mut self, host: Option<impl Into<String>>) -> Self {
        self.host = host.map(Into::into);
        if self.host().is_none() {
            self.user_info = None;
            self.port = None;
        }
        self
    }

    /// Returns a copy with the given user information. Ignored without a host.
    #[must_use]
    pub fn with_user_info(mut self, user_info: Option<impl Into<String>>) -> Self {
        self.user_info = user_info.map(Into::into).filter(|_| self.host().is_some());
        self
    }

    /// Returns a copy with the given path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Returns a copy with the given query.
    #[must_use]
    pub fn with_query(mut self, query: Option<impl Into<String>>) -> Self {
        self.query = query.map(Into::into);
        self
    }

    /// Returns a copy with the given fragment.
    #[must_use]
    pub fn with_fragment(mut self, fragment: Option<impl Into<String>>) -> Self {
        self.fragment = fragment.map(Into::into);
        self
    }

    /// Returns a copy with the given port. Ignored without a host.
    #[must_use]
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port.filter(|_| self.host().is_some());
        self
    }

    /// Converts into an [`http::Uri`], dropping the fragment.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgumentError::UnsendableUri`] if the URI is relative in
    /// a way `http::Uri` cannot represent (for example `a/b`).
    pub fn to_http_uri(&self) -> Result<http::Uri, InvalidArgumentError> {
        let rendered = self.clone().with_fragment(None::<String>).to_string();
        http::Uri::from_str(&rendered).context(UnsendableUriSnafu { input: rendered })
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{scheme}:")?;
        }
        if let Some(host) = &self.host {
            f.write_str("//")?;
            if let Some(user_info) = &self.user_info {
                write!(f, "{user_info}@")?;
            }
            f.write_str(host)?;
            if let Some(port) = self.port {
                write!(f, ":{port}")?;
            }
        }
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = InvalidArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Uri {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uri {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.into_uri().map_err(serde::de::Error::custom)
    }
}

/// Splits `scheme:rest` when the prefix before the first `:` is a scheme.
fn split_scheme(s: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = s.split_once(':')?;
    let mut bytes = scheme.bytes();
    let first = bytes.next()?;
    (first.is_ascii_alphabetic()
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.')))
    .then_some((scheme, rest))
}

fn is_fragment_byte(b: u8) -> bool {
    b.is_ascii_graphic() && b != b'#'
}

/// Conversion trait for types that can be turned into a [`Uri`].
pub trait IntoUri {
    /// The error type returned if the conversion fails.
    type Error: Into<InvalidArgumentError>;

    /// Attempts to convert this value into a [`Uri`].
    fn into_uri(self) -> Result<Uri, Self::Error>;
}

impl IntoUri for Uri {
    type Error = Infallible;

    fn into_uri(self) -> Result<Uri, Self::Error> {
        Ok(self)
    }
}

impl IntoUri for &Uri {
    type Error = Infallible;

    fn into_uri(self) -> Result<Uri, Self::Error> {
        Ok(self.clone())
    }
}

impl IntoUri for http::Uri {
    type Error = InvalidArgumentError;

    fn into_uri(self) -> Result<Uri, Self::Error> {
        Uri::parse(&self.to_string())
    }
}

impl IntoUri for url::Url {
    type Error = InvalidArgumentError;

    fn into_uri(self) -> Result<Uri, Self::Error> {
        Uri::parse(self.as_str())
    }
}

impl IntoUri for &str {
    type Error = InvalidArgumentError;

    fn into_uri(self) -> Result<Uri, Self::Error> {
        Uri::parse(self)
    }
}

impl IntoUri for String {
    type Error = InvalidArgumentError;

    fn into_uri(self) -> Result<Uri, Self::Error> {
        Uri::parse(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    #[test]
    fn parses_absolute_uri_components() {
        let uri = Uri::parse("http://example.com/a?x=1").unwrap();

        assert_eq!(uri.scheme(), Some("http"));
        assert_eq!(uri.host(), Some("example.com"));
        assert_eq!(uri.port(), None);
        assert_eq!(uri.path(), "/a");
        assert_eq!(uri.query(), Some("x=1"));
        assert_eq!(uri.fragment(), None);
    }

    #[test]
    fn parses_every_component() {
        let uri = Uri::parse("HTTPS://user:pw@example.com:8443/p/q?a=b&c#frag").unwrap();

        assert_eq!(uri.scheme(), Some("https"));
        assert_eq!(uri.user_info(), Some("user:pw"));
        assert_eq!(uri.host(), Some("example.com"));
        assert_eq!(uri.port(), Some(8443));
        assert_eq!(uri.path(), "/p/q");
        assert_eq!(uri.query(), Some("a=b&c"));
        assert_eq!(uri.fragment(), Some("frag"));
    }

    #[test]
    fn empty_input_is_empty_uri() {
        let uri = Uri::parse("").unwrap();
        assert!(uri.is_empty());
        assert_eq!(uri.to_string(), "");
    }

    #[test]
    fn accepts_relative_references() {
        let uri = Uri::parse("/search?q=rust#top").unwrap();
        assert!(!uri.is_absolute());
        assert_eq!(uri.path(), "/search");
        assert_eq!(uri.query(), Some("q=rust"));
        assert_eq!(uri.fragment(), Some("top"));

        let uri = Uri::parse("//cdn.example.com/lib.js").unwrap();
        assert_eq!(uri.host(), Some("cdn.example.com"));
        assert_eq!(uri.scheme(), None);
    }

    #[test]
    fn keeps_empty_authority() {
        let uri = Uri::parse("file:///etc/hosts").unwrap();
        assert_eq!(uri.host(), None);
        assert_eq!(uri.path(), "/etc/hosts");
        assert_eq!(uri.to_string(), "file:///etc/hosts");
    }

    #[test]
    fn round_trips_valid_uris() {
        for input in [
            "http://example.com/a?x=1",
            "http://example.com",
            "https://user@[::1]:8080/x?#",
            "mailto:someone@example.com",
            "urn:isbn:0451450523",
            "/relative/path",
            "?only=query",
            "#only-fragment",
            "file:///tmp/x",
            "http://example.com/%7Euser/",
        ] {
            let parsed = Uri::parse(input).unwrap();
            let reparsed = Uri::parse(&parsed.to_string()).unwrap();
            assert_eq!(parsed, reparsed, "round trip of {input}");
        }
    }

    #[test]
    fn rejects_invalid_uris() {
        for input in [
            "http://exa mple.com/",
            "http://example.com:99999/",
            "http://[::1/",
            "http://",
            "https:///path",
            "://missing-scheme",
            "a:b/c:d#frag#again",
            "/path with spaces",
            "http://example.com/a#frag ment",
        ] {
            assert!(Uri::parse(input).is_err(), "{input} should be rejected");
        }
    }

    #[test]
    fn missing_host_is_reported() {
        let err = Uri::parse("http:///index.html").unwrap_err();
        assert!(matches!(err, InvalidArgumentError::MissingHost { .. }));
    }

    #[test]
    fn default_ports() {
        assert_eq!(Uri::parse("http://a").unwrap().port_or_default(), Some(80));
        assert_eq!(Uri::parse("https://a").unwrap().port_or_default(), Some(443));
        assert_eq!(Uri::parse("https://a:1").unwrap().port_or_default(), Some(1));
        assert_eq!(Uri::parse("/a").unwrap().port_or_default(), None);
    }

    #[test]
    fn converts_to_http_uri_without_fragment() {
        let uri = Uri::parse("http://example.com/a?x=1#f").unwrap();
        let http_uri = uri.to_http_uri().unwrap();
        assert_eq!(http_uri.to_string(), "http://example.com/a?x=1");
    }

    #[test]
    fn into_uri_from_common_types() {
        let from_url = url::Url::parse("https://example.com/x").unwrap().into_uri().unwrap();
        let from_http = "https://example.com/x"
            .parse::<http::Uri>()
            .unwrap()
            .into_uri()
            .unwrap();
        assert_eq!(from_url, from_http);
    }

    #[test]
    fn serde_as_string() {
        let uri: Uri = serde_json::from_str("\"http://example.com/a\"").unwrap();
        assert_eq!(serde_json::to_string(&uri).unwrap(), "\"http://example.com/a\"");
        assert!(serde_json::from_str::<Uri>("\"http://\"").is_err());
    }

    #[test]
    fn with_methods_replace_authority_components() {
        let uri = Uri::parse("http://example.com/a").unwrap()
            .with_scheme(Some("HTTPS"))
            .with_host(Some("api.example.com"))
            .with_user_info(Some("svc"))
            .with_port(Some(8443));
        assert_eq!(uri.to_string(), "https://svc@api.example.com:8443/a");
        assert_eq!(Uri::parse(&uri.to_string()).unwrap(), uri);

        let hostless = uri.with_scheme(None::<String>).with_host(None::<String>);
        assert_eq!(hostless.user_info(), None);
        assert_eq!(hostless.port(), None);
        assert_eq!(hostless.to_string(), "/a");
    }

    #[test]
    fn port_and_user_info_need_a_host() {
        let uri = Uri::parse("/only/path")
            .unwrap()
            .with_port(Some(8080))
            .with_user_info(Some("nobody"));

        assert_eq!(uri.port(), None);
        assert_eq!(uri.user_info(), None);
        assert_eq!(Uri::parse(&uri.to_string()).unwrap(), uri);
    }

    #[test]
    fn rootless_paths_are_accepted() {
        let uri = Uri::parse("mailto:someone@example.com").unwrap();
        assert_eq!(uri.path(), "someone@example.com");

        let uri = Uri::parse("a/b?c=d").unwrap();
        assert_eq!(uri.path(), "a/b");
        assert!(Uri::parse("a b/c").is_err());
    }

    /// A URI string assembled from independently generated valid components.
    #[derive(Debug, Clone)]
    struct GeneratedUri(String);

    const SCHEMES: &[&str] = &["http", "https", "ftp", "urn", "git+ssh"];
    const HOST_CHARS: &[&str] = &["a", "k", "z", "0", "9", "-", "."];
    const USER_CHARS: &[&str] = &["u", "S", "3", "-", ".", ":"];
    const PATH_CHARS: &[&str] = &["p", "Q", "5", "-", "_", ".", "~", "%41", "@", ":"];
    const QUERY_CHARS: &[&str] = &["k", "v", "1", "=", "&", "/", "?", "%20", "+"];

    fn pick(g: &mut Gen, options: &[&'static str]) -> &'static str {
        g.choose(options).copied().unwrap_or_default()
    }

    fn word(g: &mut Gen, alphabet: &[&'static str], min: usize, max: usize) -> String {
        let len = min + usize::arbitrary(g) % (max - min + 1);
        (0..len).map(|_| pick(g, alphabet)).collect()
    }

    impl Arbitrary for GeneratedUri {
        fn arbitrary(g: &mut Gen) -> Self {
            let scheme = bool::arbitrary(g).then(|| pick(g, SCHEMES));
            let needs_host = matches!(scheme, Some("http" | "https"));

            let host = (needs_host || bool::arbitrary(g)).then(|| match u8::arbitrary(g) % 3 {
                0 => format!("h{}", word(g, HOST_CHARS, 0, 8)),
                1 => {
                    let [a, b, c, d] = [0; 4].map(|_: u8| u8::arbitrary(g));
                    format!("{a}.{b}.{c}.{d}")
                }
                _ => pick(g, &["[::1]", "[2001:db8::7]"]).to_owned(),
            });

            let mut out = String::new();
            if let Some(scheme) = scheme {
                out.push_str(scheme);
                out.push(':');
            }
            if let Some(host) = &host {
                out.push_str("//");
                if bool::arbitrary(g) {
                    out.push_str(&word(g, USER_CHARS, 1, 6));
                    out.push('@');
                }
                out.push_str(host);
                if bool::arbitrary(g) {
                    out.push_str(&format!(":{}", u16::arbitrary(g)));
                }
            }

            // Segments are never empty, so a hostless path cannot start with `//`.
            for i in 0..usize::arbitrary(g) % 4 {
                let rooted = host.is_some() || i > 0 || bool::arbitrary(g);
                if rooted {
                    out.push('/');
                }
                let segment = word(g, PATH_CHARS, 1, 5);
                // A relative reference cannot start with a segment holding `:`.
                let segment = if scheme.is_none() && !rooted {
                    segment.replace(':', "c")
                } else {
                    segment
                };
                out.push_str(&segment);
            }

            if bool::arbitrary(g) {
                out.push('?');
                out.push_str(&word(g, QUERY_CHARS, 0, 8));
            }
            if bool::arbitrary(g) {
                out.push('#');
                out.push_str(&word(g, QUERY_CHARS, 0, 8));
            }

            GeneratedUri(out)
        }
    }

    #[quickcheck]
    fn generated_uris_round_trip(input: GeneratedUri) -> bool {
        let Ok(parsed) = Uri::parse(&input.0) else {
            return false;
        };
        let rendered = parsed.to_string();
        rendered == input.0 && Uri::parse(&rendered).is_ok_and(|again| again == parsed)
    }
}
