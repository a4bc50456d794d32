use std::fmt;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use http::request::Parts;
use http::StatusCode;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::extract::Extractor;
use crate::{AuthError, BoxError, ConfigError, Token};

/// Protocol name hosts use to select and log this strategy.
pub const NAME: &str = "access-token";

/// Extra data a verify routine attaches to a success or a rejection.
pub type Info = Value;

type VerifyFn<P> = dyn Fn(Token, Verified<P>) -> Result<(), BoxError> + Send + Sync;
type VerifyWithRequestFn<P> =
    dyn Fn(&Parts, Token, Verified<P>) -> Result<(), BoxError> + Send + Sync;

/// The caller's verification routine.
///
/// The variant decides whether the request is handed to the routine. An `Err`
/// return means the routine failed before it could take ownership of the
/// [`Verified`] handle. A panic during the call is treated the same way.
pub enum Verify<P> {
    /// `verify(token, verified)`.
    Token(Arc<VerifyFn<P>>),
    /// `verify(request, token, verified)`.
    WithRequest(Arc<VerifyWithRequestFn<P>>),
}

impl<P> Clone for Verify<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Token(f) => Self::Token(Arc::clone(f)),
            Self::WithRequest(f) => Self::WithRequest(Arc::clone(f)),
        }
    }
}

impl<P> fmt::Debug for Verify<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Verify::Token(..)"),
            Self::WithRequest(_) => f.write_str("Verify::WithRequest(..)"),
        }
    }
}

impl<P: Send + 'static> Verify<P> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Token, Verified<P>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::Token(Arc::new(f))
    }

    pub fn with_request<F>(f: F) -> Self
    where
        F: Fn(&Parts, Token, Verified<P>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::WithRequest(Arc::new(f))
    }

    /// Run an async verification on the current tokio runtime.
    ///
    /// Dispatch fails when called outside a runtime.
    pub fn spawn<F, Fut>(f: F) -> Self
    where
        F: Fn(Token) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Verification<P>> + Send + 'static,
    {
        Self::new(move |token, verified| {
            let handle = tokio::runtime::Handle::try_current()?;
            let verification = f(token);
            handle.spawn(async move { verified.report(verification.await) });
            Ok(())
        })
    }

    /// Like [`Verify::spawn`], with the request head available while the
    /// future is built.
    pub fn spawn_with_request<F, Fut>(f: F) -> Self
    where
        F: Fn(&Parts, Token) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Verification<P>> + Send + 'static,
    {
        Self::with_request(move |parts, token, verified| {
            let handle = tokio::runtime::Handle::try_current()?;
            let verification = f(parts, token);
            handle.spawn(async move { verified.report(verification.await) });
            Ok(())
        })
    }

    pub fn takes_request(&self) -> bool {
        matches!(self, Self::WithRequest(_))
    }
}

/// What a verify routine decided about a token.
#[derive(Debug)]
pub enum Verification<P> {
    Success { principal: P, info: Option<Info> },
    Rejected(Option<Info>),
    Error(BoxError),
}

impl<P, E> From<Result<Option<P>, E>> for Verification<P>
where
    E: Into<BoxError>,
{
    fn from(result: Result<Option<P>, E>) -> Self {
        match result {
            Ok(Some(principal)) => Self::Success {
                principal,
                info: None,
            },
            Ok(None) => Self::Rejected(None),
            Err(error) => Self::Error(error.into()),
        }
    }
}

/// One-shot completion handle passed to the verify routine.
///
/// Every reporting method consumes the handle, so an attempt can be resolved
/// at most once.
pub struct Verified<P> {
    tx: oneshot::Sender<Verification<P>>,
}

impl<P> Verified<P> {
    pub fn report(self, verification: Verification<P>) {
        // The host may have stopped waiting; nothing is left to notify then.
        let _ = self.tx.send(verification);
    }

    /// Report in `(error, principal, info)` form.
    pub fn done(self, result: Result<Option<P>, BoxError>, info: Option<Info>) {
        let verification = match result {
            Err(error) => Verification::Error(error),
            Ok(None) => Verification::Rejected(info),
            Ok(Some(principal)) => Verification::Success { principal, info },
        };
        self.report(verification);
    }

    pub fn success(self, principal: P, info: Option<Info>) {
        self.report(Verification::Success { principal, info });
    }

    pub fn reject(self, info: Option<Info>) {
        self.report(Verification::Rejected(info));
    }

    pub fn error(self, error: impl Into<BoxError>) {
        self.report(Verification::Error(error.into()));
    }
}

impl<P> fmt::Debug for Verified<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verified")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Challenge {
    /// The request carried no token.
    NoToken,
    /// The verify routine rejected the token.
    Rejected(Option<Info>),
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoToken => f.write_str("No auth token"),
            Self::Rejected(Some(Value::String(message))) => f.write_str(message),
            Self::Rejected(Some(info)) => write!(f, "{info}"),
            Self::Rejected(None) => f.write_str("Unauthorized"),
        }
    }
}

/// Terminal result of one authentication attempt.
#[derive(Debug)]
pub enum Outcome<P> {
    Success { principal: P, info: Option<Info> },
    Fail { challenge: Challenge, status: StatusCode },
    Error(AuthError),
}

impl<P> Outcome<P> {
    /// Hand the outcome to exactly one of the host's reporting operations.
    pub fn report<H: Outcomes<P>>(self, host: H) -> H::Output {
        match self {
            Self::Success { principal, info } => host.success(principal, info),
            Self::Fail { challenge, status } => host.fail(challenge, status),
            Self::Error(error) => host.error(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl<P> From<Verification<P>> for Outcome<P> {
    fn from(verification: Verification<P>) -> Self {
        match verification {
            Verification::Success { principal, info } => Self::Success { principal, info },
            Verification::Rejected(info) => Self::Fail {
                challenge: Challenge::Rejected(info),
                status: StatusCode::UNAUTHORIZED,
            },
            Verification::Error(error) => Self::Error(AuthError::Verify(error)),
        }
    }
}

/// Reporting operations a host framework provides for an attempt.
pub trait Outcomes<P> {
    type Output;

    fn success(self, principal: P, info: Option<Info>) -> Self::Output;

    fn fail(self, challenge: Challenge, status: StatusCode) -> Self::Output;

    fn error(self, error: AuthError) -> Self::Output;
}

/// What a host framework needs from a strategy.
pub trait AuthenticationStrategy<P>: Send + Sync {
    fn name(&self) -> &str;

    /// Start an attempt for the request.
    ///
    /// Returns once verification has been dispatched; the [`Attempt`] resolves
    /// to the outcome.
    fn authenticate(&self, parts: &Parts) -> Result<Attempt<P>, ConfigError>;
}

/// An in-flight authentication attempt.
pub struct Attempt<P> {
    inner: Pin<Box<dyn Future<Output = Outcome<P>> + Send>>,
}

impl<P: Send + 'static> Attempt<P> {
    /// An attempt that has already reached its outcome.
    pub fn ready(outcome: Outcome<P>) -> Self {
        Self {
            inner: Box::pin(std::future::ready(outcome)),
        }
    }

    fn pending(rx: oneshot::Receiver<Verification<P>>) -> Self {
        Self {
            inner: Box::pin(async move {
                match rx.await {
                    Ok(verification) => verification.into(),
                    Err(_) => {
                        tracing::warn!(strategy = NAME, "verify callback dropped its handle");
                        Outcome::Error(AuthError::Abandoned)
                    }
                }
            }),
        }
    }

    /// Resolve to [`AuthError::TimedOut`] if no outcome arrives in time.
    pub fn timeout(self, duration: Duration) -> Self {
        Self {
            inner: Box::pin(async move {
                match tokio::time::timeout(duration, self).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!(strategy = NAME, ?duration, "token verification timed out");
                        Outcome::Error(AuthError::TimedOut)
                    }
                }
            }),
        }
    }
}

impl<P> Future for Attempt<P> {
    type Output = Outcome<P>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<P> fmt::Debug for Attempt<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attempt").finish_non_exhaustive()
    }
}

/// Options for [`Strategy::new`].
#[derive(Debug, Clone, Default)]
pub struct StrategyOptions {
    /// Where to look for the token. Required.
    pub from_request: Option<Extractor>,
    /// Whether the verify routine takes the request. Must match the
    /// [`Verify`] variant.
    pub pass_request_to_callback: bool,
}

/// Access-token authentication strategy.
///
/// Immutable once built and cheap to share across concurrent requests.
///
/// # Example
///
/// ```rust
/// use access_token::{extract, Strategy, Verify};
///
/// let strategy = Strategy::builder()
///     .from_request(extract::from_auth_header_as_bearer_token())
///     .verify(Verify::new(|token, verified| {
///         if token == "let-me-in" {
///             verified.success("ferris".to_string(), None);
///         } else {
///             verified.reject(None);
///         }
///         Ok(())
///     }))
///     .build()
///     .unwrap();
///
/// assert_eq!(strategy.name(), "access-token");
/// ```
pub struct Strategy<P> {
    extractor: Extractor,
    verify: Verify<P>,
}

impl<P: Send + 'static> Strategy<P> {
    pub fn new(options: StrategyOptions, verify: Option<Verify<P>>) -> Result<Self, ConfigError> {
        let verify = verify.ok_or(ConfigError::MissingVerify)?;
        let extractor = options.from_request.ok_or(ConfigError::MissingExtractor)?;

        if options.pass_request_to_callback != verify.takes_request() {
            return Err(ConfigError::VerifyShapeMismatch {
                expected: options.pass_request_to_callback,
            });
        }

        Ok(Self { extractor, verify })
    }

    pub fn builder() -> StrategyBuilder<P> {
        StrategyBuilder::default()
    }

    pub fn name(&self) -> &'static str {
        NAME
    }

    pub fn pass_request_to_callback(&self) -> bool {
        self.verify.takes_request()
    }

    pub fn authenticate(&self, parts: &Parts) -> Result<Attempt<P>, ConfigError> {
        let Some(token) = self.extractor.extract(parts)? else {
            tracing::debug!(strategy = NAME, "no auth token in request");
            return Ok(Attempt::ready(Outcome::Fail {
                challenge: Challenge::NoToken,
                status: StatusCode::UNAUTHORIZED,
            }));
        };

        let (tx, rx) = oneshot::channel();
        let verified = Verified { tx };

        let dispatched = panic::catch_unwind(AssertUnwindSafe(|| match &self.verify {
            Verify::Token(verify) => verify(token, verified),
            Verify::WithRequest(verify) => verify(parts, token, verified),
        }))
        .unwrap_or_else(|payload| Err(panic_message(payload).into()));

        if let Err(error) = dispatched {
            tracing::warn!(strategy = NAME, %error, "verify callback failed during dispatch");
            return Ok(Attempt::ready(Outcome::Error(AuthError::Dispatch(error))));
        }

        tracing::debug!(strategy = NAME, "token verification dispatched");
        Ok(Attempt::pending(rx))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast_ref::<&str>() {
            Some(message) => (*message).to_string(),
            None => "verify callback panicked".to_string(),
        },
    }
}

impl<P: Send + 'static> AuthenticationStrategy<P> for Strategy<P> {
    fn name(&self) -> &str {
        NAME
    }

    fn authenticate(&self, parts: &Parts) -> Result<Attempt<P>, ConfigError> {
        Strategy::authenticate(self, parts)
    }
}

impl<P> Clone for Strategy<P> {
    fn clone(&self) -> Self {
        Self {
            extractor: self.extractor.clone(),
            verify: self.verify.clone(),
        }
    }
}

impl<P> fmt::Debug for Strategy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("name", &NAME)
            .field("extractor", &self.extractor)
            .field("verify", &self.verify)
            .finish()
    }
}

/// Fluent construction for [`Strategy`].
pub struct StrategyBuilder<P> {
    options: StrategyOptions,
    verify: Option<Verify<P>>,
}

impl<P> Default for StrategyBuilder<P> {
    fn default() -> Self {
        Self {
            options: StrategyOptions::default(),
            verify: None,
        }
    }
}

impl<P: Send + 'static> StrategyBuilder<P> {
    pub fn from_request(mut self, extractor: Extractor) -> Self {
        self.options.from_request = Some(extractor);
        self
    }

    /// Set the verify routine; its variant decides `pass_request_to_callback`.
    pub fn verify(mut self, verify: Verify<P>) -> Self {
        self.options.pass_request_to_callback = verify.takes_request();
        self.verify = Some(verify);
        self
    }

    pub fn build(self) -> Result<Strategy<P>, ConfigError> {
        Strategy::new(self.options, self.verify)
    }
}
