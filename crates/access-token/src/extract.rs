//! Token extraction rules.
//!
//! Every rule is an [`Extractor`]: a cheap, cloneable function from the request
//! head to an optional [`Token`]. A missing value is `Ok(None)`; only a
//! mis-wired collaborator (for example no cookie parser) is an `Err`.
//!
//! # Example
//!
//! ```rust
//! use access_token::extract;
//!
//! let extractor = extract::from_extractors([
//!     extract::from_auth_header_as_bearer_token(),
//!     extract::from_url_query_parameter("access_token"),
//! ])
//! .unwrap();
//!
//! let (parts, _) = http::Request::builder()
//!     .uri("/items?access_token=abc123")
//!     .body(())
//!     .unwrap()
//!     .into_parts();
//!
//! assert_eq!(extractor.extract(&parts).unwrap().unwrap(), "abc123");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::header::{HeaderName, AUTHORIZATION};
use http::request::Parts;
use serde_json::{Map, Value};

use crate::{ConfigError, Token};

const BEARER_AUTH_SCHEME: &str = "bearer";
const JWT_AUTH_SCHEME: &str = "JWT";

type ExtractFn = dyn Fn(&Parts) -> Result<Option<Token>, ConfigError> + Send + Sync;

/// A rule for pulling a token out of a request.
#[derive(Clone)]
pub struct Extractor {
    inner: Arc<ExtractFn>,
}

impl Extractor {
    /// Wrap a custom extraction rule.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Parts) -> Result<Option<Token>, ConfigError> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Run the rule against a request.
    pub fn extract(&self, parts: &Parts) -> Result<Option<Token>, ConfigError> {
        (self.inner)(parts)
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extractor").finish_non_exhaustive()
    }
}

/// Plain cookies, inserted into request extensions by a cookie parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(pub HashMap<String, String>);

/// Cookies whose signature has been verified by a cookie parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedCookies(pub HashMap<String, String>);

/// Parsed request body fields, inserted into request extensions by a body parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBody(pub Map<String, Value>);

impl Cookies {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

impl SignedCookies {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Cookies {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SignedCookies {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Scheme and value of an `Authorization`-style header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthParams<'a> {
    pub scheme: &'a str,
    pub value: &'a str,
}

/// Split a header value into its first two whitespace-separated runs.
///
/// Anything after the second run is ignored; fewer than two runs is `None`.
pub fn parse_auth_header(value: &str) -> Option<AuthParams<'_>> {
    let mut runs = value.split_whitespace();
    let scheme = runs.next()?;
    let value = runs.next()?;
    Some(AuthParams { scheme, value })
}

/// Value of the named header.
pub fn from_header(name: HeaderName) -> Extractor {
    Extractor::from_fn(move |parts| {
        Ok(parts
            .headers
            .get(&name)
            .and_then(|v| v.to_str().ok())
            .and_then(Token::new))
    })
}

/// Named cookie, from the signed cookie map when `signed` is set.
///
/// Fails with [`ConfigError::MissingCookieParser`] when the request carries no
/// cookie map at all.
pub fn from_cookie(name: impl Into<String>, signed: bool) -> Extractor {
    let name = name.into();
    Extractor::from_fn(move |parts| {
        let value = if signed {
            parts
                .extensions
                .get::<SignedCookies>()
                .map(|cookies| cookies.get(&name))
        } else {
            parts
                .extensions
                .get::<Cookies>()
                .map(|cookies| cookies.get(&name))
        };

        match value {
            Some(value) => Ok(value.and_then(Token::new)),
            None => Err(ConfigError::MissingCookieParser { signed }),
        }
    })
}

/// Named string field of the parsed request body.
pub fn from_body_field(name: impl Into<String>) -> Extractor {
    let name = name.into();
    Extractor::from_fn(move |parts| {
        Ok(parts
            .extensions
            .get::<ParsedBody>()
            .and_then(|body| body.0.get(&name))
            .and_then(Value::as_str)
            .and_then(Token::new))
    })
}

/// First occurrence of the named query parameter.
pub fn from_url_query_parameter(name: impl Into<String>) -> Extractor {
    let name = name.into();
    Extractor::from_fn(move |parts| {
        Ok(parts
            .uri
            .query()
            .and_then(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .find(|(key, _)| key == name.as_str())
                    .map(|(_, value)| value.into_owned())
            })
            .and_then(Token::new))
    })
}

/// Value of the `authorization` header when its scheme matches, ignoring case.
pub fn from_auth_header_with_scheme(scheme: impl Into<String>) -> Extractor {
    let scheme = scheme.into();
    Extractor::from_fn(move |parts| {
        Ok(parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_auth_header)
            .filter(|params| params.scheme.eq_ignore_ascii_case(&scheme))
            .and_then(|params| Token::new(params.value)))
    })
}

/// `Authorization: Bearer <token>`.
pub fn from_auth_header_as_bearer_token() -> Extractor {
    from_auth_header_with_scheme(BEARER_AUTH_SCHEME)
}

/// `Authorization: JWT <token>`.
pub fn from_auth_header_as_jwt_token() -> Extractor {
    from_auth_header_with_scheme(JWT_AUTH_SCHEME)
}

/// Try each extractor in order and keep the first token found.
///
/// Later extractors are not run once one succeeds. A configuration error from
/// any of them aborts the chain.
pub fn from_extractors(
    extractors: impl IntoIterator<Item = Extractor>,
) -> Result<Extractor, ConfigError> {
    let extractors: Vec<Extractor> = extractors.into_iter().collect();
    if extractors.is_empty() {
        return Err(ConfigError::EmptyExtractorChain);
    }

    Ok(Extractor::from_fn(move |parts| {
        for extractor in &extractors {
            if let Some(token) = extractor.extract(parts)? {
                return Ok(Some(token));
            }
        }
        Ok(None)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn auth(value: &str) -> Parts {
        parts("/", &[("authorization", value)])
    }

    fn constant(value: Option<&'static str>, calls: Arc<AtomicUsize>) -> Extractor {
        Extractor::from_fn(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value.and_then(Token::new))
        })
    }

    #[test]
    fn parse_auth_header_takes_first_two_runs() {
        assert_eq!(
            parse_auth_header("Bearer abc123"),
            Some(AuthParams {
                scheme: "Bearer",
                value: "abc123"
            })
        );
        assert_eq!(
            parse_auth_header("  Bearer \t abc  def"),
            Some(AuthParams {
                scheme: "Bearer",
                value: "abc"
            })
        );
        assert_eq!(parse_auth_header("Bearer"), None);
        assert_eq!(parse_auth_header(""), None);
    }

    #[test]
    fn bearer_scheme_matches_case_insensitively() {
        let extractor = from_auth_header_with_scheme("bearer");

        assert_eq!(
            extractor.extract(&auth("Bearer abc123")).unwrap().unwrap(),
            "abc123"
        );
        assert_eq!(
            extractor.extract(&auth("BEARER abc123")).unwrap().unwrap(),
            "abc123"
        );
        assert!(extractor.extract(&auth("Basic abc123")).unwrap().is_none());
        assert!(extractor.extract(&auth("Bearer")).unwrap().is_none());
        assert!(extractor.extract(&parts("/", &[])).unwrap().is_none());
    }

    #[test]
    fn presets_use_their_schemes() {
        let bearer = from_auth_header_as_bearer_token();
        let jwt = from_auth_header_as_jwt_token();

        assert_eq!(bearer.extract(&auth("bearer t1")).unwrap().unwrap(), "t1");
        assert!(bearer.extract(&auth("JWT t1")).unwrap().is_none());
        assert_eq!(jwt.extract(&auth("jwt t2")).unwrap().unwrap(), "t2");
        assert!(jwt.extract(&auth("Bearer t2")).unwrap().is_none());
    }

    #[test]
    fn header_extractor() {
        let extractor = from_header(HeaderName::from_static("x-api-key"));

        let request = parts("/", &[("X-Api-Key", "k1")]);
        assert_eq!(extractor.extract(&request).unwrap().unwrap(), "k1");

        assert!(extractor.extract(&parts("/", &[])).unwrap().is_none());
        assert!(extractor
            .extract(&parts("/", &[("x-api-key", "")]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn query_parameter_extractor() {
        let extractor = from_url_query_parameter("access_token");

        let request = parts("/items?page=2&access_token=a%20b&access_token=second", &[]);
        assert_eq!(extractor.extract(&request).unwrap().unwrap(), "a b");

        assert!(extractor.extract(&parts("/items?page=2", &[])).unwrap().is_none());
        assert!(extractor.extract(&parts("/items", &[])).unwrap().is_none());
        assert!(extractor
            .extract(&parts("/items?access_token=", &[]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn body_field_extractor() {
        let extractor = from_body_field("token");
        let mut request = parts("/", &[]);

        assert!(extractor.extract(&request).unwrap().is_none());

        let body = serde_json::json!({ "token": "b1", "count": 3 });
        let Value::Object(map) = body else {
            unreachable!()
        };
        request.extensions.insert(ParsedBody(map));
        assert_eq!(extractor.extract(&request).unwrap().unwrap(), "b1");

        assert!(from_body_field("count").extract(&request).unwrap().is_none());
        assert!(from_body_field("missing").extract(&request).unwrap().is_none());
    }

    #[test]
    fn non_string_body_field_is_no_token() {
        let body = serde_json::json!({
            "token": 123,
            "flag": true,
            "nested": { "token": "inner" },
            "list": ["a"],
            "empty": "",
        });
        let Value::Object(map) = body else {
            unreachable!()
        };
        let mut request = parts("/", &[]);
        request.extensions.insert(ParsedBody(map));

        for field in ["token", "flag", "nested", "list", "empty"] {
            assert!(
                from_body_field(field).extract(&request).unwrap().is_none(),
                "{field} should not yield a token"
            );
        }
    }

    #[test]
    fn cookie_extractor_reads_the_right_map() {
        let mut request = parts("/", &[]);
        request
            .extensions
            .insert(Cookies::from_iter([("token", "plain")]));
        request
            .extensions
            .insert(SignedCookies::from_iter([("token", "signed")]));

        assert_eq!(
            from_cookie("token", false).extract(&request).unwrap().unwrap(),
            "plain"
        );
        assert_eq!(
            from_cookie("token", true).extract(&request).unwrap().unwrap(),
            "signed"
        );
        assert!(from_cookie("other", false)
            .extract(&request)
            .unwrap()
            .is_none());
    }

    #[test]
    fn cookie_extractor_without_parser_is_a_config_error() {
        let mut request = parts("/", &[]);

        assert_eq!(
            from_cookie("token", false).extract(&request).unwrap_err(),
            ConfigError::MissingCookieParser { signed: false }
        );

        request.extensions.insert(Cookies::default());
        assert!(from_cookie("token", false).extract(&request).unwrap().is_none());
        assert_eq!(
            from_cookie("token", true).extract(&request).unwrap_err(),
            ConfigError::MissingCookieParser { signed: true }
        );
    }

    #[test]
    fn chain_short_circuits_on_first_token() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let chain = from_extractors([
            constant(Some("one"), first.clone()),
            constant(Some("two"), second.clone()),
        ])
        .unwrap();

        assert_eq!(chain.extract(&parts("/", &[])).unwrap().unwrap(), "one");
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn chain_falls_through_to_later_extractors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = from_extractors([
            constant(None, calls.clone()),
            constant(Some("two"), calls.clone()),
        ])
        .unwrap();
        assert_eq!(chain.extract(&parts("/", &[])).unwrap().unwrap(), "two");

        let empty = from_extractors([constant(None, calls.clone()), constant(None, calls.clone())])
            .unwrap();
        assert!(empty.extract(&parts("/", &[])).unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn chain_propagates_config_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = from_extractors([
            from_cookie("token", false),
            constant(Some("never"), calls.clone()),
        ])
        .unwrap();

        assert_eq!(
            chain.extract(&parts("/", &[])).unwrap_err(),
            ConfigError::MissingCookieParser { signed: false }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert_eq!(
            from_extractors(Vec::new()).unwrap_err(),
            ConfigError::EmptyExtractorChain
        );
    }
}
