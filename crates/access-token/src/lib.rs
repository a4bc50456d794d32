//! Pluggable access-token authentication.
//!
//! Pulls a bearer credential out of a request with a configurable
//! [`Extractor`], hands it to a caller-supplied [`Verify`] routine, and turns
//! the result into one of three terminal [`Outcome`]s: success, fail or error.
//!
//! # Example
//!
//! ```rust
//! use access_token::{extract, Outcome, Strategy, Verify};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let strategy = Strategy::builder()
//!     .from_request(extract::from_auth_header_as_bearer_token())
//!     .verify(Verify::new(|token, verified| {
//!         match token.as_str() {
//!             "tok1" => verified.success(1_u64, None),
//!             _ => verified.reject(None),
//!         }
//!         Ok(())
//!     }))
//!     .build()
//!     .unwrap();
//!
//! let (parts, _) = http::Request::builder()
//!     .header("authorization", "Bearer tok1")
//!     .body(())
//!     .unwrap()
//!     .into_parts();
//!
//! let outcome = strategy.authenticate(&parts).unwrap().await;
//! assert!(matches!(outcome, Outcome::Success { principal: 1, .. }));
//! # }
//! ```

pub mod config;
pub mod extract;

mod error;
mod strategy;
mod token;

pub use config::{ExtractorConfig, StrategyConfig};
pub use error::{AuthError, BoxError, ConfigError};
pub use extract::Extractor;
pub use strategy::{
    Attempt, AuthenticationStrategy, Challenge, Info, Outcome, Outcomes, Strategy,
    StrategyBuilder, StrategyOptions, Verification, Verified, Verify, NAME,
};
pub use token::Token;
