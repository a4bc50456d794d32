use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use access_token::{
    AuthError, AuthenticationStrategy, Challenge, ConfigError, Info, Outcomes, Strategy, Verify,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower::{Layer, Service};
use tracing::Instrument;

use crate::config::{AuthConfig, Environment};
use crate::error::AuthRejection;
use crate::Authenticated;

/// Runs an access-token strategy in front of the wrapped service.
///
/// Success stores [`Authenticated`] in the request extensions and calls the
/// inner service. Fail answers 401 and Error answers 500, both as JSON.
pub struct AccessTokenLayer<A, P> {
    strategy: Arc<A>,
    environment: Environment,
    verify_timeout: Option<Duration>,
    _principal: PhantomData<fn() -> P>,
}

impl<P> AccessTokenLayer<Strategy<P>, P>
where
    P: Clone + Send + Sync + 'static,
{
    /// Build the strategy described by `config` around `verify`.
    pub fn from_config(config: &AuthConfig, verify: Verify<P>) -> Result<Self, ConfigError> {
        let strategy = Strategy::new(config.strategy.options()?, Some(verify))?;
        let layer = Self::new(strategy).with_environment(config.environment);

        Ok(match config.verify_timeout() {
            Some(timeout) => layer.with_verify_timeout(timeout),
            None => layer,
        })
    }
}

impl<A, P> AccessTokenLayer<A, P>
where
    A: AuthenticationStrategy<P> + 'static,
    P: Clone + Send + Sync + 'static,
{
    pub fn new(strategy: A) -> Self {
        Self {
            strategy: Arc::new(strategy),
            environment: Environment::default(),
            verify_timeout: None,
            _principal: PhantomData,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Answer 500 when verification takes longer than `timeout`.
    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = Some(timeout);
        self
    }
}

impl<A, P> Clone for AccessTokenLayer<A, P> {
    fn clone(&self) -> Self {
        Self {
            strategy: Arc::clone(&self.strategy),
            environment: self.environment,
            verify_timeout: self.verify_timeout,
            _principal: PhantomData,
        }
    }
}

impl<A, P> fmt::Debug for AccessTokenLayer<A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenLayer")
            .field("environment", &self.environment)
            .field("verify_timeout", &self.verify_timeout)
            .finish_non_exhaustive()
    }
}

impl<S, A, P> Layer<S> for AccessTokenLayer<A, P> {
    type Service = AccessTokenService<S, A, P>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessTokenService {
            inner,
            layer: self.clone(),
        }
    }
}

/// Service produced by [`AccessTokenLayer`].
pub struct AccessTokenService<S, A, P> {
    inner: S,
    layer: AccessTokenLayer<A, P>,
}

impl<S: Clone, A, P> Clone for AccessTokenService<S, A, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            layer: self.layer.clone(),
        }
    }
}

impl<S, A, P> Service<Request<Body>> for AccessTokenService<S, A, P>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    A: AuthenticationStrategy<P> + 'static,
    P: Clone + Send + Sync + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let (mut parts, body) = req.into_parts();
        let span = tracing::info_span!(
            "authenticate",
            strategy = self.layer.strategy.name(),
            method = %parts.method,
            path = %parts.uri.path(),
        );

        let attempt = span.in_scope(|| self.layer.strategy.authenticate(&parts));
        let responder = Responder {
            environment: self.layer.environment,
        };
        let verify_timeout = self.layer.verify_timeout;

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                let attempt = match attempt {
                    Ok(attempt) => attempt,
                    Err(error) => return Ok(responder.misconfigured(error)),
                };
                let attempt = match verify_timeout {
                    Some(timeout) => attempt.timeout(timeout),
                    None => attempt,
                };

                match attempt.await.report(responder) {
                    Ok(authenticated) => {
                        tracing::debug!("request authenticated");
                        parts.extensions.insert::<Authenticated<P>>(authenticated);
                        inner.call(Request::from_parts(parts, body)).await
                    }
                    Err(rejection) => Ok(rejection.into_response()),
                }
            }
            .instrument(span),
        )
    }
}

/// Maps outcomes onto the request pipeline: proceed or short-circuit.
#[derive(Debug, Clone, Copy)]
struct Responder {
    environment: Environment,
}

impl Responder {
    fn internal(&self, detail: String) -> AuthRejection {
        if self.environment.is_production() {
            let reason = StatusCode::INTERNAL_SERVER_ERROR.canonical_reason();
            AuthRejection::Internal(reason.unwrap_or("Internal Server Error").to_string())
        } else {
            AuthRejection::Internal(detail)
        }
    }

    fn misconfigured(&self, error: ConfigError) -> Response {
        tracing::error!(%error, "access-token strategy is misconfigured");
        self.internal(error.to_string()).into_response()
    }
}

impl<P> Outcomes<P> for Responder {
    type Output = Result<Authenticated<P>, AuthRejection>;

    fn success(self, principal: P, info: Option<Info>) -> Self::Output {
        Ok(Authenticated { principal, info })
    }

    fn fail(self, challenge: Challenge, status: StatusCode) -> Self::Output {
        tracing::debug!(%challenge, status = status.as_u16(), "authentication failed");
        Err(AuthRejection::Unauthorized {
            status,
            message: challenge.to_string(),
        })
    }

    fn error(self, error: AuthError) -> Self::Output {
        tracing::error!(%error, "authentication errored");
        Err(self.internal(error.to_string()))
    }
}

/// Extension trait for adding access-token authentication to a Router.
pub trait AccessTokenExt {
    fn with_access_token<A, P>(self, layer: AccessTokenLayer<A, P>) -> Self
    where
        A: AuthenticationStrategy<P> + 'static,
        P: Clone + Send + Sync + 'static;
}

impl<St> AccessTokenExt for Router<St>
where
    St: Clone + Send + Sync + 'static,
{
    fn with_access_token<A, P>(self, layer: AccessTokenLayer<A, P>) -> Self
    where
        A: AuthenticationStrategy<P> + 'static,
        P: Clone + Send + Sync + 'static,
    {
        self.layer(layer)
    }
}
