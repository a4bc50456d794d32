//! Declarative strategy configuration.
//!
//! Lets extractor chains live in a config file instead of code:
//!
//! ```toml
//! pass_request_to_callback = false
//!
//! [[extractors]]
//! kind = "bearer"
//!
//! [[extractors]]
//! kind = "cookie"
//! name = "access_token"
//! signed = true
//! ```

use http::header::HeaderName;
use serde::{Deserialize, Serialize};

use crate::extract::{self, Extractor};
use crate::strategy::StrategyOptions;
use crate::ConfigError;

/// One extraction rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorConfig {
    Header {
        name: String,
    },
    Cookie {
        name: String,
        #[serde(default)]
        signed: bool,
    },
    BodyField {
        name: String,
    },
    QueryParameter {
        name: String,
    },
    AuthScheme {
        scheme: String,
    },
    Bearer,
    Jwt,
}

impl ExtractorConfig {
    pub fn build(&self) -> Result<Extractor, ConfigError> {
        Ok(match self {
            Self::Header { name } => {
                let name = HeaderName::try_from(name.as_str())
                    .map_err(|_| ConfigError::InvalidHeaderName(name.clone()))?;
                extract::from_header(name)
            }
            Self::Cookie { name, signed } => extract::from_cookie(name.as_str(), *signed),
            Self::BodyField { name } => extract::from_body_field(name.as_str()),
            Self::QueryParameter { name } => extract::from_url_query_parameter(name.as_str()),
            Self::AuthScheme { scheme } => extract::from_auth_header_with_scheme(scheme.as_str()),
            Self::Bearer => extract::from_auth_header_as_bearer_token(),
            Self::Jwt => extract::from_auth_header_as_jwt_token(),
        })
    }
}

/// Strategy settings minus the verify routine, which only code can supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_extractors")]
    pub extractors: Vec<ExtractorConfig>,
    #[serde(default)]
    pub pass_request_to_callback: bool,
}

fn default_extractors() -> Vec<ExtractorConfig> {
    vec![ExtractorConfig::Bearer]
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            extractors: default_extractors(),
            pass_request_to_callback: false,
        }
    }
}

impl StrategyConfig {
    /// The configured extractor; several rules become an ordered chain.
    pub fn extractor(&self) -> Result<Extractor, ConfigError> {
        match self.extractors.as_slice() {
            [single] => single.build(),
            rules => extract::from_extractors(
                rules
                    .iter()
                    .map(ExtractorConfig::build)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        }
    }

    pub fn options(&self) -> Result<StrategyOptions, ConfigError> {
        Ok(StrategyOptions {
            from_request: Some(self.extractor()?),
            pass_request_to_callback: self.pass_request_to_callback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Cookies;

    fn parts(uri: &str, headers: &[(&str, &str)]) -> http::request::Parts {
        let mut builder = http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn deserializes_tagged_rules() {
        let config: StrategyConfig = serde_json::from_str(
            r#"{
                "extractors": [
                    { "kind": "bearer" },
                    { "kind": "header", "name": "x-api-key" },
                    { "kind": "cookie", "name": "token" },
                    { "kind": "auth_scheme", "scheme": "Token" },
                    { "kind": "query_parameter", "name": "access_token" }
                ],
                "pass_request_to_callback": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.extractors.len(), 5);
        assert_eq!(
            config.extractors[2],
            ExtractorConfig::Cookie {
                name: "token".into(),
                signed: false
            }
        );
        assert!(config.pass_request_to_callback);
    }

    #[test]
    fn defaults_to_bearer() {
        let config: StrategyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, StrategyConfig::default());

        let extractor = config.extractor().unwrap();
        let request = parts("/", &[("authorization", "Bearer abc")]);
        assert_eq!(extractor.extract(&request).unwrap().unwrap(), "abc");
    }

    #[test]
    fn chain_follows_configured_order() {
        let config = StrategyConfig {
            extractors: vec![
                ExtractorConfig::QueryParameter {
                    name: "access_token".into(),
                },
                ExtractorConfig::Jwt,
            ],
            pass_request_to_callback: false,
        };
        let extractor = config.extractor().unwrap();

        let request = parts("/?access_token=q", &[("authorization", "JWT h")]);
        assert_eq!(extractor.extract(&request).unwrap().unwrap(), "q");

        let request = parts("/", &[("authorization", "JWT h")]);
        assert_eq!(extractor.extract(&request).unwrap().unwrap(), "h");
    }

    #[test]
    fn cookie_rule_keeps_its_config_error() {
        let config = StrategyConfig {
            extractors: vec![ExtractorConfig::Cookie {
                name: "token".into(),
                signed: false,
            }],
            pass_request_to_callback: false,
        };
        let extractor = config.extractor().unwrap();

        let mut request = parts("/", &[]);
        assert_eq!(
            extractor.extract(&request).unwrap_err(),
            ConfigError::MissingCookieParser { signed: false }
        );

        request.extensions.insert(Cookies::from_iter([("token", "c")]));
        assert_eq!(extractor.extract(&request).unwrap().unwrap(), "c");
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let rule = ExtractorConfig::Header {
            name: "bad header".into(),
        };
        assert_eq!(
            rule.build().unwrap_err(),
            ConfigError::InvalidHeaderName("bad header".into())
        );
    }

    #[test]
    fn empty_rule_list_is_rejected() {
        let config = StrategyConfig {
            extractors: Vec::new(),
            pass_request_to_callback: false,
        };
        assert_eq!(
            config.options().unwrap_err(),
            ConfigError::EmptyExtractorChain
        );
    }
}
