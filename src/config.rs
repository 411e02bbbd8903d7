// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! [`BridgeConfig`] is assembled once at startup from layers, lowest
//! precedence first:
//!
//! 1. built-in defaults ([`BridgeConfig::default`]);
//! 2. environment variables ([`ConfigLayer::from_env`]);
//! 3. the JSON file named by `CONFIG_LOCATION` ([`ConfigLayer::from_file`]);
//! 4. explicit overrides passed by the embedding code.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `IP` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `SERVER_NAME` | Public host name of the bridge | `discourse-sso.example.com` |
//! | `PREFERRED_URL_SCHEME` | Scheme of public URLs | `https` |
//! | `SECRET_KEY` | Session cookie signing secret | `dummy_secret_key` |
//! | `SESSION_LIFETIME_SECS` | Server-side session lifetime | `3600` |
//! | `SESSION_CAPACITY` | Sessions kept per table before the least recently used is evicted | `10000` |
//! | `DEBUG` | `true` lowers the default log level to `debug` | `false` |
//! | `OIDC_ISSUER` | Issuer used for discovery | `https://login.salesforce.com/` |
//! | `OIDC_CLIENT_ID` | OAuth2 client id | `dummy_client_id` |
//! | `OIDC_CLIENT_SECRET` | OAuth2 client secret | `dummy_client_secret` |
//! | `OIDC_SCOPE` | Comma separated scopes | `openid,profile` |
//! | `OIDC_EXTRA_AUTH_REQUEST_PARAMS` | JSON object of extra authorization parameters | `{}` |
//! | `OIDC_PROVIDER_METADATA` | JSON static provider metadata, skips discovery | `{}` |
//! | `OIDC_LOGOUT_REDIRECT_URI` | Post-logout redirect registered with the provider | `<scheme>://<SERVER_NAME>/logout` |
//! | `DISCOURSE_URL` | Forum base URL | `https://discourse.example.com` |
//! | `DISCOURSE_SECRET_KEY` | SSO secret shared with the forum | `dummy_discourse_secret_key` |
//! | `USERINFO_SSO_MAP` | JSON object of claim → attribute rules | `{"sub": "external_id", "preferred_username": "username"}` |
//! | `DEFAULT_SSO_ATTRIBUTES` | JSON object of default attributes | `{}` |
//! | `CONFIG_LOCATION` | Path of an optional JSON config file | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! The JSON file uses the same names as keys. Structured settings are plain
//! JSON there instead of JSON-in-a-string.

use std::collections::BTreeMap;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use crate::identity::oidc::StaticProviderMetadata;
use crate::sso::mapper::claim_text;
use crate::sso::{DefaultAttributes, MappingRules};

/// Environment variable naming the optional JSON config file.
pub const CONFIG_LOCATION_ENV: &str = "CONFIG_LOCATION";

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DUMMY_SECRET_KEY: &str = "dummy_secret_key";
pub const DUMMY_DISCOURSE_SECRET_KEY: &str = "dummy_discourse_secret_key";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

/// Fully resolved bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub ip: IpAddr,
    pub port: u16,
    pub server_name: String,
    pub preferred_url_scheme: String,
    pub secret_key: String,
    pub session_lifetime_secs: u64,
    pub session_capacity: usize,
    pub debug: bool,
    pub oidc_issuer: String,
    pub oidc_client_id: String,
    pub oidc_client_secret: String,
    pub oidc_scope: Vec<String>,
    pub oidc_extra_auth_request_params: BTreeMap<String, String>,
    /// `None` means the provider is discovered from `oidc_issuer`.
    pub oidc_provider_metadata: Option<StaticProviderMetadata>,
    pub oidc_logout_redirect_uri: Option<String>,
    pub discourse_url: String,
    pub discourse_secret_key: String,
    pub userinfo_sso_map: MappingRules,
    pub default_sso_attributes: DefaultAttributes,
    pub log_format: LogFormat,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            server_name: "discourse-sso.example.com".to_string(),
            preferred_url_scheme: "https".to_string(),
            secret_key: DUMMY_SECRET_KEY.to_string(),
            session_lifetime_secs: 3600,
            session_capacity: 10_000,
            debug: false,
            oidc_issuer: "https://login.salesforce.com/".to_string(),
            oidc_client_id: "dummy_client_id".to_string(),
            oidc_client_secret: "dummy_client_secret".to_string(),
            oidc_scope: vec!["openid".to_string(), "profile".to_string()],
            oidc_extra_auth_request_params: BTreeMap::new(),
            oidc_provider_metadata: None,
            oidc_logout_redirect_uri: None,
            discourse_url: "https://discourse.example.com".to_string(),
            discourse_secret_key: DUMMY_DISCOURSE_SECRET_KEY.to_string(),
            userinfo_sso_map: MappingRules::from([
                ("sub".to_string(), "external_id".to_string()),
                ("preferred_username".to_string(), "username".to_string()),
            ]),
            default_sso_attributes: DefaultAttributes::new(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl BridgeConfig {
    /// Defaults, then the environment, then `CONFIG_LOCATION` if set.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default().apply(ConfigLayer::from_env()?);

        if let Some(path) = env::var_os(CONFIG_LOCATION_ENV) {
            config = config.apply(ConfigLayer::from_file(path)?);
        }

        Ok(config)
    }

    /// Overrides every field the layer sets.
    pub fn apply(mut self, layer: ConfigLayer) -> Self {
        set(&mut self.ip, layer.ip);
        set(&mut self.port, layer.port);
        set(&mut self.server_name, layer.server_name);
        set(&mut self.preferred_url_scheme, layer.preferred_url_scheme);
        set(&mut self.secret_key, layer.secret_key);
        set(&mut self.session_lifetime_secs, layer.session_lifetime_secs);
        set(&mut self.session_capacity, layer.session_capacity);
        set(&mut self.debug, layer.debug);
        set(&mut self.oidc_issuer, layer.oidc_issuer);
        set(&mut self.oidc_client_id, layer.oidc_client_id);
        set(&mut self.oidc_client_secret, layer.oidc_client_secret);
        set(
            &mut self.oidc_extra_auth_request_params,
            layer.oidc_extra_auth_request_params,
        );
        set(&mut self.oidc_provider_metadata, layer.oidc_provider_metadata);
        set(&mut self.discourse_url, layer.discourse_url);
        set(&mut self.discourse_secret_key, layer.discourse_secret_key);
        set(&mut self.userinfo_sso_map, layer.userinfo_sso_map);
        set(&mut self.default_sso_attributes, layer.default_sso_attributes);
        set(&mut self.log_format, layer.log_format);

        if let Some(scope) = layer.oidc_scope {
            self.oidc_scope = split_scopes(&scope);
        }
        if let Some(uri) = layer.oidc_logout_redirect_uri {
            self.oidc_logout_redirect_uri = Some(uri);
        }

        self
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    pub fn public_url(&self, path: &str) -> String {
        format!("{}://{}{}", self.preferred_url_scheme, self.server_name, path)
    }

    /// Where the identity provider sends the browser back to.
    pub fn redirect_uri(&self) -> String {
        self.public_url("/redirect_uri")
    }

    /// First entry of `OIDC_LOGOUT_REDIRECT_URI`, or `/logout` on this host.
    pub fn logout_redirect_uri(&self) -> String {
        self.oidc_logout_redirect_uri
            .as_deref()
            .and_then(|uris| uris.split(',').map(str::trim).find(|uri| !uri.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| self.public_url("/logout"))
    }

    pub fn secure_cookies(&self) -> bool {
        self.preferred_url_scheme.eq_ignore_ascii_case("https")
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_lifetime_secs)
    }

    /// Names of the secrets still at their published dummy value.
    pub fn dummy_secrets(&self) -> Vec<&'static str> {
        let mut dummies = Vec::new();
        if self.secret_key == DUMMY_SECRET_KEY {
            dummies.push("SECRET_KEY");
        }
        if self.discourse_secret_key == DUMMY_DISCOURSE_SECRET_KEY {
            dummies.push("DISCOURSE_SECRET_KEY");
        }
        dummies
    }

    /// Log filter used when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug {
            "debug,tower_http=debug"
        } else {
            "info,tower_http=debug"
        }
    }
}

/// One partial source of configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ConfigLayer {
    pub ip: Option<IpAddr>,
    pub port: Option<u16>,
    pub server_name: Option<String>,
    pub preferred_url_scheme: Option<String>,
    pub secret_key: Option<String>,
    pub session_lifetime_secs: Option<u64>,
    pub session_capacity: Option<usize>,
    pub debug: Option<bool>,
    pub oidc_issuer: Option<String>,
    pub oidc_client_id: Option<String>,
    pub oidc_client_secret: Option<String>,
    /// Comma separated, as in the environment.
    pub oidc_scope: Option<String>,
    pub oidc_extra_auth_request_params: Option<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "provider_metadata")]
    pub oidc_provider_metadata: Option<Option<StaticProviderMetadata>>,
    pub oidc_logout_redirect_uri: Option<String>,
    pub discourse_url: Option<String>,
    pub discourse_secret_key: Option<String>,
    pub userinfo_sso_map: Option<MappingRules>,
    #[serde(default, deserialize_with = "default_attributes")]
    pub default_sso_attributes: Option<DefaultAttributes>,
    pub log_format: Option<LogFormat>,
}

impl ConfigLayer {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a layer from any `name → value` source shaped like the
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &'static str| lookup(key);

        Ok(Self {
            ip: lookup("IP").map(|raw| parse_str("IP", &raw)).transpose()?,
            port: lookup("PORT").map(|raw| parse_str("PORT", &raw)).transpose()?,
            server_name: text("SERVER_NAME"),
            preferred_url_scheme: text("PREFERRED_URL_SCHEME"),
            secret_key: text("SECRET_KEY"),
            session_lifetime_secs: lookup("SESSION_LIFETIME_SECS")
                .map(|raw| parse_str("SESSION_LIFETIME_SECS", &raw))
                .transpose()?,
            session_capacity: lookup("SESSION_CAPACITY")
                .map(|raw| parse_str("SESSION_CAPACITY", &raw))
                .transpose()?,
            debug: text("DEBUG").map(|raw| raw.eq_ignore_ascii_case("true")),
            oidc_issuer: text("OIDC_ISSUER"),
            oidc_client_id: text("OIDC_CLIENT_ID"),
            oidc_client_secret: text("OIDC_CLIENT_SECRET"),
            oidc_scope: text("OIDC_SCOPE"),
            oidc_extra_auth_request_params: lookup("OIDC_EXTRA_AUTH_REQUEST_PARAMS")
                .map(|raw| parse_json("OIDC_EXTRA_AUTH_REQUEST_PARAMS", &raw))
                .transpose()?,
            oidc_provider_metadata: lookup("OIDC_PROVIDER_METADATA")
                .map(|raw| {
                    parse_json::<Value>("OIDC_PROVIDER_METADATA", &raw).and_then(|value| {
                        metadata_from_value(value).map_err(|message| ConfigError::Invalid {
                            key: "OIDC_PROVIDER_METADATA",
                            message,
                        })
                    })
                })
                .transpose()?,
            oidc_logout_redirect_uri: text("OIDC_LOGOUT_REDIRECT_URI"),
            discourse_url: text("DISCOURSE_URL"),
            discourse_secret_key: text("DISCOURSE_SECRET_KEY"),
            userinfo_sso_map: lookup("USERINFO_SSO_MAP")
                .map(|raw| parse_json("USERINFO_SSO_MAP", &raw))
                .transpose()?,
            default_sso_attributes: lookup("DEFAULT_SSO_ATTRIBUTES")
                .map(|raw| {
                    parse_json::<BTreeMap<String, Value>>("DEFAULT_SSO_ATTRIBUTES", &raw)
                        .map(render_attributes)
                })
                .transpose()?,
            log_format: lookup(LOG_FORMAT_ENV)
                .map(|raw| parse_str(LOG_FORMAT_ENV, &raw))
                .transpose()?,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn parse_str<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}

fn parse_json<T: DeserializeOwned>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}

fn split_scopes(scope: &str) -> Vec<String> {
    scope
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn render_attributes(values: BTreeMap<String, Value>) -> DefaultAttributes {
    values
        .into_iter()
        .map(|(key, value)| (key, claim_text(&value)))
        .collect()
}

/// An empty object selects discovery.
fn metadata_from_value(value: Value) -> Result<Option<StaticProviderMetadata>, String> {
    match value {
        Value::Object(ref fields) if fields.is_empty() => Ok(None),
        Value::Null => Ok(None),
        other => serde_json::from_value(other)
            .map(Some)
            .map_err(|e| e.to_string()),
    }
}

fn provider_metadata<'de, D>(
    deserializer: D,
) -> Result<Option<Option<StaticProviderMetadata>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    metadata_from_value(value)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

fn default_attributes<'de, D>(deserializer: D) -> Result<Option<DefaultAttributes>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(Some(render_attributes(values)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn layer(pairs: &[(&str, &str)]) -> Result<ConfigLayer, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigLayer::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = BridgeConfig::default();
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.redirect_uri(), "https://discourse-sso.example.com/redirect_uri");
        assert_eq!(
            config.logout_redirect_uri(),
            "https://discourse-sso.example.com/logout"
        );
        assert_eq!(config.oidc_scope, vec!["openid", "profile"]);
        assert_eq!(config.userinfo_sso_map["sub"], "external_id");
        assert!(config.secure_cookies());
        assert_eq!(config.dummy_secrets(), vec!["SECRET_KEY", "DISCOURSE_SECRET_KEY"]);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = BridgeConfig::default().apply(
            layer(&[
                ("PORT", "9000"),
                ("SESSION_CAPACITY", "500"),
                ("SERVER_NAME", "sso.forum.test"),
                ("PREFERRED_URL_SCHEME", "http"),
                ("DEBUG", "True"),
                ("OIDC_SCOPE", "openid, email ,profile"),
                ("USERINFO_SSO_MAP", r#"{"oid": "external_id"}"#),
                ("DEFAULT_SSO_ATTRIBUTES", r#"{"locale": "sv", "suppress_welcome_message": true}"#),
                ("DISCOURSE_SECRET_KEY", "s3cret"),
                ("LOG_FORMAT", "json"),
            ])
            .unwrap(),
        );

        assert_eq!(config.port, 9000);
        assert_eq!(config.session_capacity, 500);
        assert_eq!(config.redirect_uri(), "http://sso.forum.test/redirect_uri");
        assert!(config.debug);
        assert!(!config.secure_cookies());
        assert_eq!(config.oidc_scope, vec!["openid", "email", "profile"]);
        assert_eq!(
            config.userinfo_sso_map,
            MappingRules::from([("oid".to_string(), "external_id".to_string())])
        );
        assert_eq!(config.default_sso_attributes["suppress_welcome_message"], "true");
        assert_eq!(config.dummy_secrets(), vec!["SECRET_KEY"]);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.default_log_filter(), "debug,tower_http=debug");
    }

    #[test]
    fn malformed_values_are_reported_by_name() {
        let err = layer(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let err = layer(&[("USERINFO_SSO_MAP", "{not json")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "USERINFO_SSO_MAP", .. }));
    }

    #[test]
    fn empty_provider_metadata_selects_discovery() {
        let layer = layer(&[("OIDC_PROVIDER_METADATA", "{}")]).unwrap();
        assert!(matches!(layer.oidc_provider_metadata, Some(None)));
    }

    #[test]
    fn static_provider_metadata_is_parsed() {
        let layer = layer(&[(
            "OIDC_PROVIDER_METADATA",
            r#"{
                "issuer": "https://op.example.com",
                "authorization_endpoint": "https://op.example.com/a_very_unique_auth",
                "jwks_uri": "https://op.example.com/jwks"
            }"#,
        )])
        .unwrap();
        let config = BridgeConfig::default().apply(layer);
        let metadata = config.oidc_provider_metadata.unwrap();
        assert_eq!(metadata.issuer, "https://op.example.com");
        assert_eq!(metadata.token_endpoint, None);
    }

    #[test]
    fn logout_redirect_uses_first_listed_uri() {
        let config = BridgeConfig::default().apply(
            layer(&[(
                "OIDC_LOGOUT_REDIRECT_URI",
                "https://a.example.com/bye, https://b.example.com/bye",
            )])
            .unwrap(),
        );
        assert_eq!(config.logout_redirect_uri(), "https://a.example.com/bye");
    }

    #[test]
    fn file_layer_overrides_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "DISCOURSE_URL": "https://forum.example.org",
                "USERINFO_SSO_MAP": {{"email": "email"}},
                "DEFAULT_SSO_ATTRIBUTES": {{"add_groups": "crazy_cat_club"}}
            }}"#
        )
        .unwrap();

        let config = BridgeConfig::default()
            .apply(layer(&[("DISCOURSE_URL", "https://env.example.org")]).unwrap())
            .apply(ConfigLayer::from_file(file.path()).unwrap());

        assert_eq!(config.discourse_url, "https://forum.example.org");
        assert_eq!(config.userinfo_sso_map["email"], "email");
        assert_eq!(config.default_sso_attributes["add_groups"], "crazy_cat_club");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLayer::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn explicit_overrides_win() {
        let overrides = ConfigLayer {
            discourse_secret_key: Some("override".to_string()),
            ..ConfigLayer::default()
        };
        let config = BridgeConfig::default().apply(overrides);
        assert_eq!(config.discourse_secret_key, "override");
        assert_eq!(config.server_name, "discourse-sso.example.com");
    }
}
