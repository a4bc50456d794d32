//! Cookie parsing for [`extract::from_cookie`](access_token::extract::from_cookie).

use std::task::{Context, Poll};

use access_token::extract::{Cookies, SignedCookies};
use axum::http::Request;
use axum_extra::extract::cookie::{CookieJar, Key, SignedCookieJar};
use tower::{Layer, Service};

/// Parses the `Cookie` header into [`Cookies`], and into [`SignedCookies`]
/// when a signing key is configured.
///
/// Signed cookies that fail verification are left out of the map.
#[derive(Clone, Default)]
pub struct CookieLayer {
    key: Option<Key>,
}

impl CookieLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed(key: Key) -> Self {
        Self { key: Some(key) }
    }
}

impl std::fmt::Debug for CookieLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieLayer")
            .field("signed", &self.key.is_some())
            .finish()
    }
}

impl<S> Layer<S> for CookieLayer {
    type Service = CookieService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CookieService {
            inner,
            key: self.key.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CookieService<S> {
    inner: S,
    key: Option<Key>,
}

impl<S, B> Service<Request<B>> for CookieService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let headers = req.headers();

        let cookies: Cookies = CookieJar::from_headers(headers)
            .iter()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();

        let signed = self.key.as_ref().map(|key| {
            SignedCookieJar::from_headers(headers, key.clone())
                .iter()
                .map(|c| (c.name().to_string(), c.value().to_string()))
                .collect::<SignedCookies>()
        });

        req.extensions_mut().insert(cookies);
        if let Some(signed) = signed {
            req.extensions_mut().insert(signed);
        }

        self.inner.call(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Extension, Router};
    use axum_extra::extract::cookie::Cookie;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn key() -> Key {
        Key::from(&[7u8; 64][..])
    }

    fn signed_cookie(name: &'static str, value: &'static str) -> String {
        let jar = SignedCookieJar::new(key()).add(Cookie::new(name, value));
        let response = (jar, ()).into_response();
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn plain_cookies_are_parsed() {
        let app = Router::new()
            .route(
                "/",
                get(|Extension(cookies): Extension<Cookies>| async move {
                    cookies.get("access_token").unwrap_or("-").to_string()
                }),
            )
            .layer(CookieLayer::new());

        let request = Request::builder()
            .uri("/")
            .header(header::COOKIE, "theme=dark; access_token=tok1")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "tok1");
    }

    #[tokio::test]
    async fn unsigned_layer_inserts_no_signed_map() {
        let app = Router::new()
            .route(
                "/",
                get(|signed: Option<Extension<SignedCookies>>| async move {
                    signed.is_some().to_string()
                }),
            )
            .layer(CookieLayer::new());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "false");
    }

    #[tokio::test]
    async fn signed_cookies_are_verified() {
        let app = Router::new()
            .route(
                "/",
                get(|Extension(signed): Extension<SignedCookies>| async move {
                    format!(
                        "{}|{}",
                        signed.get("access_token").unwrap_or("-"),
                        signed.get("forged").unwrap_or("-"),
                    )
                }),
            )
            .layer(CookieLayer::signed(key()));

        let cookie = format!("{}; forged=tok2", signed_cookie("access_token", "tok1"));
        let request = Request::builder()
            .uri("/")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(body_string(response).await, "tok1|-");
    }
}
