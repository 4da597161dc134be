//! Configuration for the gate.
//!
//! A [`Config`] names the three remote collaborators (authorization server,
//! payment server, hosted accounts service), the service credential used to
//! call them, and the payment surface of the protected resource: mount path,
//! minimum payment, payee name, and the configured payment options.
//!
//! Configuration can be built programmatically via [`Config::builder`],
//! loaded from a JSON file via [`Config::from_json`], or read from the
//! environment via [`Config::from_env`]. All three paths run the same
//! validation, so a constructed `Config` is always internally consistent.

use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::money::{MoneyAmount, MoneyAmountParseError};
use crate::types::PaymentOption;

pub const ENV_AUTHORIZATION_SERVER: &str = "TOLLGATE_AUTHORIZATION_SERVER";
pub const ENV_PAYMENT_SERVER: &str = "TOLLGATE_PAYMENT_SERVER";
pub const ENV_ACCOUNTS_SERVICE: &str = "TOLLGATE_ACCOUNTS_SERVICE";
pub const ENV_SERVICE_CREDENTIAL: &str = "TOLLGATE_SERVICE_CREDENTIAL";
pub const ENV_PAYEE_NAME: &str = "TOLLGATE_PAYEE_NAME";
pub const ENV_MOUNT_PATH: &str = "TOLLGATE_MOUNT_PATH";
pub const ENV_MINIMUM_PAYMENT: &str = "TOLLGATE_MINIMUM_PAYMENT";
pub const ENV_PAYMENT_OPTIONS: &str = "TOLLGATE_PAYMENT_OPTIONS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "TOLLGATE_REQUEST_TIMEOUT_SECS";

/// The static service-to-service credential sent as a bearer token on every
/// call to the authorization server, the payment server, and the hosted
/// accounts service.
///
/// `Debug` output is redacted so the credential never lands in logs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ServiceCredential(String);

impl ServiceCredential {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    /// The raw credential, for constructing an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ServiceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceCredential(***)")
    }
}

impl From<&str> for ServiceCredential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

mod limits {
    use super::*;
    use once_cell::sync::Lazy;

    pub const MINIMUM_PAYMENT_CEILING_STR: &str = "1.00";

    pub static MINIMUM_PAYMENT_CEILING: Lazy<MoneyAmount> =
        Lazy::new(|| MINIMUM_PAYMENT_CEILING_STR.parse().expect("valid decimal"));
}

/// The fixed upper bound for [`Config::minimum_payment`].
pub fn minimum_payment_ceiling() -> MoneyAmount {
    *limits::MINIMUM_PAYMENT_CEILING
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),
    #[error("Invalid value in {name}: {message}")]
    InvalidEnv {
        name: &'static str,
        message: String,
    },
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("At least one payment option is required")]
    NoPaymentOptions,
    #[error("Payment option {index} has a blank {field}")]
    IncompleteOption { index: usize, field: &'static str },
    #[error(
        "Minimum payment {minimum} exceeds the {} ceiling",
        limits::MINIMUM_PAYMENT_CEILING_STR
    )]
    MinimumAboveCeiling { minimum: MoneyAmount },
}

/// Gate configuration.
///
/// Construction always validates: at least one payment option, no blank
/// addresses or currencies, and a minimum payment at or below the fixed
/// ceiling of `1.00`. The mount path is normalized (leading slash, no
/// trailing slash) so path comparison elsewhere can be a plain equality
/// check.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    authorization_server: Url,
    payment_server: Url,
    accounts_service: Url,
    service_credential: ServiceCredential,
    payee_name: String,
    #[serde(default = "config_defaults::default_mount_path")]
    mount_path: String,
    #[serde(default = "config_defaults::default_minimum_payment")]
    minimum_payment: MoneyAmount,
    payment_options: Vec<PaymentOption>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
}

pub mod config_defaults {
    use super::*;

    pub const DEFAULT_MOUNT_PATH: &str = "/";

    /// Default mount path with fallback: $TOLLGATE_MOUNT_PATH env var -> "/".
    pub fn default_mount_path() -> String {
        env::var(ENV_MOUNT_PATH).unwrap_or_else(|_| DEFAULT_MOUNT_PATH.to_string())
    }

    /// Default minimum payment with fallback: $TOLLGATE_MINIMUM_PAYMENT env var -> 0.
    pub fn default_minimum_payment() -> MoneyAmount {
        env::var(ENV_MINIMUM_PAYMENT)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(MoneyAmount::ZERO)
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Base URL of the authorization server.
    pub fn authorization_server(&self) -> &Url {
        &self.authorization_server
    }

    /// Base URL of the payment server.
    pub fn payment_server(&self) -> &Url {
        &self.payment_server
    }

    /// Base URL of the hosted accounts service.
    pub fn accounts_service(&self) -> &Url {
        &self.accounts_service
    }

    pub fn service_credential(&self) -> &ServiceCredential {
        &self.service_credential
    }

    /// Payee name stamped onto every charge document.
    pub fn payee_name(&self) -> &str {
        &self.payee_name
    }

    /// Normalized mount path of the protected resource.
    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    /// Minimum payment a token's funding claim must cover.
    pub fn minimum_payment(&self) -> MoneyAmount {
        self.minimum_payment
    }

    pub fn payment_options(&self) -> &[PaymentOption] {
        &self.payment_options
    }

    /// Timeout applied to every remote call, when configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Load configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()
    }

    /// Load configuration from the environment.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    /// `TOLLGATE_PAYMENT_OPTIONS` holds the options as a JSON array.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let authorization_server = env_url(ENV_AUTHORIZATION_SERVER)?;
        let payment_server = env_url(ENV_PAYMENT_SERVER)?;
        let accounts_service = env_url(ENV_ACCOUNTS_SERVICE)?;
        let service_credential = ServiceCredential::new(require_env(ENV_SERVICE_CREDENTIAL)?);
        let payee_name = require_env(ENV_PAYEE_NAME)?;
        let minimum_payment = match env::var(ENV_MINIMUM_PAYMENT) {
            Ok(raw) => raw
                .parse()
                .map_err(|e: MoneyAmountParseError| ConfigError::InvalidEnv {
                    name: ENV_MINIMUM_PAYMENT,
                    message: e.to_string(),
                })?,
            Err(_) => MoneyAmount::ZERO,
        };
        let payment_options = match env::var(ENV_PAYMENT_OPTIONS) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidEnv {
                name: ENV_PAYMENT_OPTIONS,
                message: e.to_string(),
            })?,
            Err(_) => Vec::new(),
        };
        let request_timeout_secs = match env::var(ENV_REQUEST_TIMEOUT_SECS) {
            Ok(raw) => Some(raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnv {
                name: ENV_REQUEST_TIMEOUT_SECS,
                message: e.to_string(),
            })?),
            Err(_) => None,
        };
        let config = Config {
            authorization_server,
            payment_server,
            accounts_service,
            service_credential,
            payee_name,
            mount_path: config_defaults::default_mount_path(),
            minimum_payment,
            payment_options,
            request_timeout_secs,
        };
        config.validate()
    }

    fn validate(mut self) -> Result<Self, ConfigError> {
        self.mount_path = normalize_mount_path(&self.mount_path);
        if self.payment_options.is_empty() {
            return Err(ConfigError::NoPaymentOptions);
        }
        for (index, option) in self.payment_options.iter().enumerate() {
            if option.address.trim().is_empty() {
                return Err(ConfigError::IncompleteOption {
                    index,
                    field: "address",
                });
            }
            if option.currency.as_str().trim().is_empty() {
                return Err(ConfigError::IncompleteOption {
                    index,
                    field: "currency",
                });
            }
        }
        if self.minimum_payment > minimum_payment_ceiling() {
            return Err(ConfigError::MinimumAboveCeiling {
                minimum: self.minimum_payment,
            });
        }
        Ok(self)
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnv(name))
}

fn env_url(name: &'static str) -> Result<Url, ConfigError> {
    require_env(name)?
        .parse()
        .map_err(|e: url::ParseError| ConfigError::InvalidEnv {
            name,
            message: e.to_string(),
        })
}

pub(crate) fn normalize_mount_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    authorization_server: Option<Url>,
    payment_server: Option<Url>,
    accounts_service: Option<Url>,
    service_credential: Option<ServiceCredential>,
    payee_name: Option<String>,
    mount_path: Option<String>,
    minimum_payment: Option<MoneyAmount>,
    payment_options: Vec<PaymentOption>,
    request_timeout: Option<Duration>,
}

impl ConfigBuilder {
    pub fn authorization_server(mut self, url: Url) -> Self {
        self.authorization_server = Some(url);
        self
    }

    pub fn payment_server(mut self, url: Url) -> Self {
        self.payment_server = Some(url);
        self
    }

    pub fn accounts_service(mut self, url: Url) -> Self {
        self.accounts_service = Some(url);
        self
    }

    pub fn service_credential<C: Into<ServiceCredential>>(mut self, credential: C) -> Self {
        self.service_credential = Some(credential.into());
        self
    }

    pub fn payee_name<S: Into<String>>(mut self, name: S) -> Self {
        self.payee_name = Some(name.into());
        self
    }

    pub fn mount_path<S: Into<String>>(mut self, path: S) -> Self {
        self.mount_path = Some(path.into());
        self
    }

    pub fn minimum_payment(mut self, amount: MoneyAmount) -> Self {
        self.minimum_payment = Some(amount);
        self
    }

    /// Appends one payment option.
    pub fn payment_option(mut self, option: PaymentOption) -> Self {
        self.payment_options.push(option);
        self
    }

    /// Replaces the payment option list.
    pub fn payment_options(mut self, options: Vec<PaymentOption>) -> Self {
        self.payment_options = options;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let authorization_server = self
            .authorization_server
            .ok_or(ConfigError::MissingField("authorization_server"))?;
        let payment_server = self
            .payment_server
            .ok_or(ConfigError::MissingField("payment_server"))?;
        let accounts_service = self
            .accounts_service
            .ok_or(ConfigError::MissingField("accounts_service"))?;
        let service_credential = self
            .service_credential
            .ok_or(ConfigError::MissingField("service_credential"))?;
        let payee_name = self
            .payee_name
            .ok_or(ConfigError::MissingField("payee_name"))?;
        let config = Config {
            authorization_server,
            payment_server,
            accounts_service,
            service_credential,
            payee_name,
            mount_path: self
                .mount_path
                .unwrap_or_else(|| config_defaults::DEFAULT_MOUNT_PATH.to_string()),
            minimum_payment: self.minimum_payment.unwrap_or(MoneyAmount::ZERO),
            payment_options: self.payment_options,
            request_timeout_secs: self.request_timeout.map(|t| t.as_secs()),
        };
        config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::types::Currency;

    fn base_option() -> PaymentOption {
        PaymentOption {
            network: Network::Base,
            currency: Currency::new("USDC"),
            address: "0x2222000000000000000000000000000000000222".to_string(),
            amount: MoneyAmount::ZERO,
        }
    }

    fn builder() -> ConfigBuilder {
        Config::builder()
            .authorization_server("https://auth.example.com/".parse().unwrap())
            .payment_server("https://pay.example.com/".parse().unwrap())
            .accounts_service("https://accounts.example.com/".parse().unwrap())
            .service_credential("svc-secret")
            .payee_name("Example API")
    }

    #[test]
    fn test_builder_happy_path() {
        let config = builder()
            .mount_path("/mcp")
            .minimum_payment("0.10".parse().unwrap())
            .payment_option(base_option())
            .build()
            .unwrap();
        assert_eq!(config.mount_path(), "/mcp");
        assert_eq!(config.payee_name(), "Example API");
        assert_eq!(config.payment_options().len(), 1);
    }

    #[test]
    fn test_builder_missing_required_field() {
        let result = Config::builder()
            .authorization_server("https://auth.example.com/".parse().unwrap())
            .payment_option(base_option())
            .build();
        assert!(matches!(result, Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_no_payment_options_rejected() {
        let result = builder().build();
        assert!(matches!(result, Err(ConfigError::NoPaymentOptions)));
    }

    #[test]
    fn test_blank_address_rejected() {
        let mut option = base_option();
        option.address = "   ".to_string();
        let result = builder().payment_option(option).build();
        assert!(matches!(
            result,
            Err(ConfigError::IncompleteOption { index: 0, field: "address" })
        ));
    }

    #[test]
    fn test_minimum_above_ceiling_rejected() {
        let result = builder()
            .minimum_payment("1.50".parse().unwrap())
            .payment_option(base_option())
            .build();
        assert!(matches!(result, Err(ConfigError::MinimumAboveCeiling { .. })));
    }

    #[test]
    fn test_minimum_at_ceiling_accepted() {
        let config = builder()
            .minimum_payment("1.00".parse().unwrap())
            .payment_option(base_option())
            .build()
            .unwrap();
        assert_eq!(config.minimum_payment(), minimum_payment_ceiling());
    }

    #[test]
    fn test_mount_path_normalization() {
        let config = builder()
            .mount_path("mcp/")
            .payment_option(base_option())
            .build()
            .unwrap();
        assert_eq!(config.mount_path(), "/mcp");

        let config = builder()
            .mount_path("")
            .payment_option(base_option())
            .build()
            .unwrap();
        assert_eq!(config.mount_path(), "/");
    }

    #[test]
    fn test_from_json_file() {
        let json = serde_json::json!({
            "authorizationServer": "https://auth.example.com/",
            "paymentServer": "https://pay.example.com/",
            "accountsService": "https://accounts.example.com/",
            "serviceCredential": "svc-secret",
            "payeeName": "Example API",
            "mountPath": "/mcp",
            "minimumPayment": "0.25",
            "paymentOptions": [
                {
                    "network": "hosted",
                    "currency": "USD",
                    "address": "acct_9001",
                    "amount": "0"
                }
            ],
            "requestTimeoutSecs": 5
        });
        let path = env::temp_dir().join("tollgate-config-test.json");
        fs::write(&path, serde_json::to_vec_pretty(&json).unwrap()).unwrap();
        let config = Config::from_json(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(config.minimum_payment().to_string(), "0.25");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.payment_options()[0].network, Network::Hosted);
    }

    #[test]
    fn test_from_json_missing_file_names_the_path() {
        let path = env::temp_dir().join("tollgate-config-test-missing.json");
        let error = Config::from_json(&path).unwrap_err();
        assert!(matches!(error, ConfigError::FileRead(..)));
        assert!(
            error
                .to_string()
                .contains("tollgate-config-test-missing.json")
        );
    }

    #[test]
    fn test_service_credential_debug_is_redacted() {
        let credential = ServiceCredential::new("svc-secret");
        assert_eq!(format!("{credential:?}"), "ServiceCredential(***)");
    }
}
