use thiserror::Error;

/// Type-erased error produced by verification routines.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration errors.
///
/// These describe a mis-wired strategy rather than a request without
/// credentials, and are always surfaced to the caller instead of being treated
/// as "no token found".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No verify routine was supplied.
    #[error("strategy requires a verify callback")]
    MissingVerify,
    /// No extractor was supplied.
    #[error("strategy requires an extractor to retrieve tokens from requests (see `from_request`)")]
    MissingExtractor,
    /// `pass_request_to_callback` does not match the shape of the verify routine.
    #[error("pass_request_to_callback is {expected} but the verify callback {}", verify_shape(.expected))]
    VerifyShapeMismatch {
        /// The configured `pass_request_to_callback` value.
        expected: bool,
    },
    /// A cookie extractor ran on a request that no cookie parser has seen.
    #[error("{} cookies are missing from the request; is the cookie parser installed?", cookie_map(.signed))]
    MissingCookieParser {
        /// Whether the signed cookie map was expected.
        signed: bool,
    },
    /// `from_extractors` was given nothing to chain.
    #[error("from_extractors expects at least one extractor")]
    EmptyExtractorChain,
    /// A configured header name is not a valid HTTP header name.
    #[error("invalid header name: {0}")]
    InvalidHeaderName(String),
}

fn verify_shape(expected: &bool) -> &'static str {
    if *expected {
        "does not take the request"
    } else {
        "takes the request"
    }
}

fn cookie_map(signed: &bool) -> &'static str {
    if *signed {
        "signed"
    } else {
        "plain"
    }
}

/// Errors reported through the Error outcome of an authentication attempt.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The verify routine reported an error.
    #[error("token verification failed: {0}")]
    Verify(#[source] BoxError),
    /// The verify routine failed while being dispatched.
    #[error("could not dispatch token verification: {0}")]
    Dispatch(#[source] BoxError),
    /// The verification handle was dropped without reporting a result.
    #[error("token verification was abandoned without a result")]
    Abandoned,
    /// Verification did not complete in time.
    #[error("token verification timed out")]
    TimedOut,
}
