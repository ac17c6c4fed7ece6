//! Client configuration and the process-wide default.
//!
//! A [`Config`] is handed to [`crate::ApiClient`] at construction. A global
//! instance can be installed with [`set_global`] for code that prefers not to
//! thread a client through every call; explicit clients always win.

use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Version segment at the start of every resource path.
pub const API_PATH_VERSION: &str = "v1";

static GLOBAL: RwLock<Option<Config>> = RwLock::new(None);

/// Country whose regional API host is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Country {
    #[default]
    Mexico,
    Colombia,
    Peru,
}

impl Country {
    pub fn code(self) -> &'static str {
        match self {
            Country::Mexico => "mx",
            Country::Colombia => "co",
            Country::Peru => "pe",
        }
    }
}

impl FromStr for Country {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mx" => Ok(Country::Mexico),
            "co" => Ok(Country::Colombia),
            "pe" => Ok(Country::Peru),
            _ => Err(Error::Configuration(format!(
                "country {s:?} is not supported; expected one of mx, co, pe"
            ))),
        }
    }
}

impl TryFrom<String> for Country {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Country> for String {
    fn from(country: Country) -> Self {
        country.code().to_owned()
    }
}

/// Credentials and endpoint selection for one API client.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Secret key sent as the Basic-auth username.
    pub api_key: Option<String>,
    pub merchant_id: String,
    /// Production host instead of the sandbox.
    pub production: bool,
    /// Sent as the `Openpay-Version` header when set.
    pub api_version: Option<String>,
    pub verify_ssl_certs: bool,
    pub country: Country,
    /// Replaces the regional host entirely, e.g. for a local mock.
    pub api_base: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            merchant_id: String::new(),
            production: false,
            api_version: None,
            verify_ssl_certs: true,
            country: Country::default(),
            api_base: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("merchant_id", &self.merchant_id)
            .field("production", &self.production)
            .field("api_version", &self.api_version)
            .field("verify_ssl_certs", &self.verify_ssl_certs)
            .field("country", &self.country)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Config {
    pub fn new(merchant_id: impl Into<String>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn with_verify_ssl_certs(mut self, verify: bool) -> Self {
        self.verify_ssl_certs = verify;
        self
    }

    pub fn with_country(mut self, country: Country) -> Self {
        self.country = country;
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Reads `OPENPAY_*` environment variables. `OPENPAY_MERCHANT_ID` is
    /// required; everything else falls back to the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let merchant_id = lookup("OPENPAY_MERCHANT_ID")
            .filter(|m| !m.is_empty())
            .ok_or_else(|| Error::Configuration("OPENPAY_MERCHANT_ID is not set".to_owned()))?;
        let mut config = Config::new(merchant_id);
        config.api_key = lookup("OPENPAY_API_KEY").filter(|k| !k.is_empty());
        config.api_version = lookup("OPENPAY_API_VERSION").filter(|v| !v.is_empty());
        config.api_base = lookup("OPENPAY_API_BASE").filter(|b| !b.is_empty());
        if let Some(production) = lookup("OPENPAY_PRODUCTION") {
            config.production = parse_flag("OPENPAY_PRODUCTION", &production)?;
        }
        if let Some(verify) = lookup("OPENPAY_VERIFY_SSL") {
            config.verify_ssl_certs = parse_flag("OPENPAY_VERIFY_SSL", &verify)?;
        }
        if let Some(country) = lookup("OPENPAY_COUNTRY") {
            config.country = country.parse()?;
        }
        Ok(config)
    }

    /// Base URL requests are issued against, without a trailing slash.
    pub fn api_base(&self) -> String {
        if let Some(base) = &self.api_base {
            return base.trim_end_matches('/').to_owned();
        }
        let host = if self.production { "api" } else { "sandbox-api" };
        format!("https://{host}.openpay.{}", self.country.code())
    }

    /// The installed process-wide configuration.
    pub fn global() -> Result<Config> {
        GLOBAL
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                Error::Configuration(
                    "no global configuration installed; call openpay_core::config::set_global"
                        .to_owned(),
                )
            })
    }
}

/// Installs (or replaces) the process-wide default configuration.
pub fn set_global(config: Config) {
    *GLOBAL.write().unwrap_or_else(PoisonError::into_inner) = Some(config);
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Configuration(format!(
            "{name} must be a boolean, got {value:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn sandbox_hosts_follow_country() {
        let config = Config::new("m1");
        assert_eq!(config.api_base(), "https://sandbox-api.openpay.mx");
        let config = config.with_country(Country::Colombia);
        assert_eq!(config.api_base(), "https://sandbox-api.openpay.co");
    }

    #[test]
    fn production_hosts_follow_country() {
        let config = Config::new("m1")
            .with_production(true)
            .with_country(Country::Peru);
        assert_eq!(config.api_base(), "https://api.openpay.pe");
    }

    #[test]
    fn explicit_base_wins_and_loses_trailing_slash() {
        let config = Config::new("m1")
            .with_production(true)
            .with_api_base("http://127.0.0.1:3000/");
        assert_eq!(config.api_base(), "http://127.0.0.1:3000");
    }

    #[test]
    fn unknown_country_fails_fast() {
        let err = "ar".parse::<Country>().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("\"ar\""));
    }

    #[test]
    fn country_deserializes_from_code() {
        let config: Config =
            serde_json::from_str(r#"{"merchant_id":"m1","country":"CO"}"#).unwrap();
        assert_eq!(config.country, Country::Colombia);
        assert!(config.verify_ssl_certs);

        let result: std::result::Result<Config, _> =
            serde_json::from_str(r#"{"merchant_id":"m1","country":"xx"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn from_lookup_reads_all_settings() {
        let config = Config::from_lookup(lookup(&[
            ("OPENPAY_MERCHANT_ID", "m1"),
            ("OPENPAY_API_KEY", "sk_1"),
            ("OPENPAY_PRODUCTION", "true"),
            ("OPENPAY_COUNTRY", "pe"),
            ("OPENPAY_VERIFY_SSL", "0"),
            ("OPENPAY_API_VERSION", "2024-01-01"),
        ]))
        .unwrap();
        assert_eq!(config.merchant_id, "m1");
        assert_eq!(config.api_key.as_deref(), Some("sk_1"));
        assert!(config.production);
        assert!(!config.verify_ssl_certs);
        assert_eq!(config.country, Country::Peru);
        assert_eq!(config.api_version.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn from_lookup_requires_merchant() {
        let err = Config::from_lookup(lookup(&[("OPENPAY_API_KEY", "sk_1")])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn from_lookup_rejects_bad_country() {
        let err = Config::from_lookup(lookup(&[
            ("OPENPAY_MERCHANT_ID", "m1"),
            ("OPENPAY_COUNTRY", "br"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn debug_redacts_the_key() {
        let config = Config::new("m1").with_api_key("sk_secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk_secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
