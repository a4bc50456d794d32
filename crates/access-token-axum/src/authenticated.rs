use access_token::Info;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;

/// The principal a successful attempt produced, with the verifier's info.
///
/// Inserted into request extensions by
/// [`AccessTokenLayer`](crate::AccessTokenLayer) and usable as a handler
/// argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Authenticated<P> {
    pub principal: P,
    pub info: Option<Info>,
}

impl<S, P> FromRequestParts<S> for Authenticated<P>
where
    S: Send + Sync,
    P: Clone + Send + Sync + 'static,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Can't extract authenticated principal. Is `AccessTokenLayer` enabled?",
        ))
    }
}
