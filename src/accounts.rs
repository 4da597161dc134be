//! Client for the hosted accounts service.
//!
//! Hosted payment options name an account handle instead of an on-chain
//! address; this client resolves such a handle into concrete deposit
//! addresses via `GET /accounts/{handle}/deposit-addresses`. The service can
//! scope addresses to a pending payment request and to the paying parties,
//! passed along as query parameters.

use http::{HeaderMap, StatusCode};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;
use url::Url;

use crate::chain::ChainId;
use crate::config::{Config, ServiceCredential};
use crate::types::{Currency, PayerId, PaymentRequestId};

/// One deposit address the hosted service provisioned for an account.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositAddress {
    /// CAIP-2 chain the address lives on.
    pub chain: ChainId,
    pub currency: Currency,
    pub address: String,
}

#[derive(Debug, Deserialize)]
struct DepositAddressesResponse {
    addresses: Vec<DepositAddress>,
}

/// Errors that can occur while talking to the accounts service.
#[derive(Debug, thiserror::Error)]
pub enum AccountsClientError {
    #[error("accounts service URL cannot serve as a base: {0}")]
    InvalidBaseUrl(Url),
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

const DEPOSIT_ADDRESSES_CONTEXT: &str = "GET /accounts/{handle}/deposit-addresses";

/// HTTP client for the hosted accounts service.
#[derive(Clone, Debug)]
pub struct HostedAccountsClient {
    /// Base URL of the accounts service.
    base_url: Url,
    /// Shared Reqwest HTTP client.
    client: Client,
    /// Service credential presented on every request.
    credential: ServiceCredential,
    /// Extra headers attached to every request.
    headers: HeaderMap,
    /// Optional request timeout.
    timeout: Option<Duration>,
}

impl HostedAccountsClient {
    /// Constructs a client for the given accounts service.
    pub fn try_new(
        base_url: Url,
        credential: ServiceCredential,
    ) -> Result<Self, AccountsClientError> {
        if base_url.cannot_be_a_base() {
            return Err(AccountsClientError::InvalidBaseUrl(base_url));
        }
        Ok(Self {
            base_url,
            client: Client::new(),
            credential,
            headers: HeaderMap::new(),
            timeout: None,
        })
    }

    /// Constructs a client from a [`Config`], applying its request timeout.
    pub fn from_config(config: &Config) -> Result<Self, AccountsClientError> {
        let client = Self::try_new(
            config.accounts_service().clone(),
            config.service_credential().clone(),
        )?;
        Ok(match config.request_timeout() {
            Some(timeout) => client.with_timeout(timeout),
            None => client,
        })
    }

    /// Attaches extra headers to all future requests.
    pub fn with_headers(&self, headers: HeaderMap) -> Self {
        let mut this = self.clone();
        this.headers.extend(headers);
        this
    }

    /// Sets a timeout for all future requests.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut this = self.clone();
        this.timeout = Some(timeout);
        this
    }

    /// Returns the base URL of the accounts service.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetches the deposit addresses provisioned for `account`.
    ///
    /// `payment_request_id` and `sources` scope the lookup when present;
    /// empty inputs are simply not sent.
    #[instrument(skip_all, fields(account = %account))]
    pub async fn deposit_addresses(
        &self,
        account: &str,
        sources: &[PayerId],
        payment_request_id: Option<&PaymentRequestId>,
    ) -> Result<Vec<DepositAddress>, AccountsClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AccountsClientError::InvalidBaseUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push("accounts")
            .push(account)
            .push("deposit-addresses");
        if payment_request_id.is_some() || !sources.is_empty() {
            let mut pairs = url.query_pairs_mut();
            if let Some(id) = payment_request_id {
                pairs.append_pair("paymentRequestId", id.as_str());
            }
            for source in sources {
                pairs.append_pair("source", source.as_str());
            }
        }

        let mut req = self
            .client
            .get(url)
            .bearer_auth(self.credential.expose());
        for (name, value) in self.headers.iter() {
            req = req.header(name, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let response = req.send().await.map_err(|e| AccountsClientError::Http {
            context: DEPOSIT_ADDRESSES_CONTEXT,
            source: e,
        })?;

        let status = response.status();
        if status == StatusCode::OK {
            let body: DepositAddressesResponse =
                response
                    .json()
                    .await
                    .map_err(|e| AccountsClientError::JsonDeserialization {
                        context: DEPOSIT_ADDRESSES_CONTEXT,
                        source: e,
                    })?;
            Ok(body.addresses)
        } else {
            let body =
                response
                    .text()
                    .await
                    .map_err(|e| AccountsClientError::ResponseBodyRead {
                        context: DEPOSIT_ADDRESSES_CONTEXT,
                        source: e,
                    })?;
            Err(AccountsClientError::HttpStatus {
                context: DEPOSIT_ADDRESSES_CONTEXT,
                status,
                body,
            })
        }
    }
}
