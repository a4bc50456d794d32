//! # access-token-axum
//!
//! Runs an [`access_token::Strategy`] as a tower layer in front of axum
//! handlers.
//!
//! Successful requests carry an [`Authenticated`] principal into the handler;
//! failed ones are answered with a JSON [`ErrorResponse`]: 401 on Fail and 500
//! on Error.
//!
//! ## Features
//!
//! - `tracing` - Enable logging initialization with tracing-subscriber
//! - `cookie` - [`CookieLayer`], the cookie parser `from_cookie` reads from
//!
//! ## Example
//!
//! ```rust,no_run
//! use access_token_axum::access_token::{extract, Strategy, Verify};
//! use access_token_axum::{AccessTokenExt, AccessTokenLayer, Authenticated};
//! use axum::{routing::get, Router};
//!
//! let strategy = Strategy::builder()
//!     .from_request(extract::from_auth_header_as_bearer_token())
//!     .verify(Verify::new(|token, verified| {
//!         verified.done(Ok((token == "tok1").then_some(1_u64)), None);
//!         Ok(())
//!     }))
//!     .build()?;
//!
//! let app: Router = Router::new()
//!     .route("/me", get(|user: Authenticated<u64>| async move { user.principal.to_string() }))
//!     .with_access_token(AccessTokenLayer::new(strategy));
//! # Ok::<_, access_token_axum::access_token::ConfigError>(())
//! ```

mod authenticated;
mod config;
#[cfg(feature = "cookie")]
mod cookie;
mod error;
mod layer;
mod logging;

pub use access_token;

pub use authenticated::Authenticated;
pub use config::{AuthConfig, ConfigBuilder, ConfigFormat, Environment, LoadError, ENV_PREFIX};
#[cfg(feature = "cookie")]
pub use cookie::{CookieLayer, CookieService};
pub use error::{AuthRejection, ErrorResponse};
pub use layer::{AccessTokenExt, AccessTokenLayer, AccessTokenService};
pub use logging::{LogFormat, DEFAULT_FILTER};

#[cfg(feature = "tracing")]
pub use logging::{init_logging, init_logging_from_env};

#[cfg(feature = "cookie")]
pub use axum_extra::extract::cookie::Key;
