//! Payment server protocol and HTTP client.
//!
//! The payment server is the component that actually moves money. This
//! module defines the [`PaymentServer`] trait the engine charges through,
//! and [`PaymentServerClient`], the HTTP implementation speaking the
//! two-endpoint wire protocol: `POST /charge` either settles immediately
//! (200) or reports that an out-of-band payment is required (402), and
//! `POST /payment-request` opens a payment request the payer can fulfil
//! later.

use http::{HeaderMap, StatusCode};
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;

use crate::config::{Config, ServiceCredential};
use crate::types::{Charge, ChargeOutcome, PaymentRequestId, PendingPayment};

/// Something that can settle charges and open payment requests.
///
/// [`PaymentServerClient`] is the standard implementation; tests and
/// embedders can substitute their own.
pub trait PaymentServer {
    type Error: std::fmt::Debug + std::fmt::Display + Send + Sync + 'static;

    /// Attempts to settle `charge` immediately.
    fn charge(
        &self,
        charge: &Charge,
    ) -> impl Future<Output = Result<ChargeOutcome, Self::Error>> + Send;

    /// Opens a payment request covering `charge`, returning its id.
    fn create_payment_request(
        &self,
        charge: &Charge,
    ) -> impl Future<Output = Result<PaymentRequestId, Self::Error>> + Send;
}

impl<T: PaymentServer + Sync> PaymentServer for Arc<T> {
    type Error = T::Error;

    fn charge(
        &self,
        charge: &Charge,
    ) -> impl Future<Output = Result<ChargeOutcome, Self::Error>> + Send {
        self.as_ref().charge(charge)
    }

    fn create_payment_request(
        &self,
        charge: &Charge,
    ) -> impl Future<Output = Result<PaymentRequestId, Self::Error>> + Send {
        self.as_ref().create_payment_request(charge)
    }
}

/// Errors that can occur while talking to the payment server.
#[derive(Debug, thiserror::Error)]
pub enum PaymentServerError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
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
    #[error("payment server returned a payment request without an id")]
    MissingPaymentRequestId,
}

const CHARGE_CONTEXT: &str = "POST /charge";
const PAYMENT_REQUEST_CONTEXT: &str = "POST /payment-request";

#[derive(Debug, Deserialize)]
struct PaymentRequestReceipt {
    id: PaymentRequestId,
}

/// HTTP client for a payment server.
#[derive(Clone, Debug)]
pub struct PaymentServerClient {
    /// Base URL of the payment server.
    base_url: Url,
    /// Full URL of the `POST ./charge` endpoint.
    charge_url: Url,
    /// Full URL of the `POST ./payment-request` endpoint.
    payment_request_url: Url,
    /// Shared Reqwest HTTP client.
    client: Client,
    /// Service credential presented on every request.
    credential: ServiceCredential,
    /// Extra headers attached to every request.
    headers: HeaderMap,
    /// Optional request timeout.
    timeout: Option<Duration>,
}

impl PaymentServerClient {
    /// Constructs a client for the given payment server.
    pub fn try_new(
        base_url: Url,
        credential: ServiceCredential,
    ) -> Result<Self, PaymentServerError> {
        let base_url = ensure_trailing_slash(base_url);
        let charge_url = base_url
            .join("./charge")
            .map_err(|e| PaymentServerError::UrlParse {
                context: "Failed to construct ./charge URL",
                source: e,
            })?;
        let payment_request_url =
            base_url
                .join("./payment-request")
                .map_err(|e| PaymentServerError::UrlParse {
                    context: "Failed to construct ./payment-request URL",
                    source: e,
                })?;
        Ok(Self {
            base_url,
            charge_url,
            payment_request_url,
            client: Client::new(),
            credential,
            headers: HeaderMap::new(),
            timeout: None,
        })
    }

    /// Constructs a client from a [`Config`], applying its request timeout.
    pub fn from_config(config: &Config) -> Result<Self, PaymentServerError> {
        let client = Self::try_new(
            config.payment_server().clone(),
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

    /// Returns the base URL of the payment server.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the computed `./charge` URL relative to [`PaymentServerClient::base_url`].
    pub fn charge_url(&self) -> &Url {
        &self.charge_url
    }

    /// Returns the computed `./payment-request` URL relative to [`PaymentServerClient::base_url`].
    pub fn payment_request_url(&self) -> &Url {
        &self.payment_request_url
    }

    /// Attempts to charge the payer for the given destinations.
    ///
    /// A 200 settles the charge; a 402 means the payer must fund the pending
    /// payment the response describes.
    #[instrument(skip_all)]
    pub async fn charge(&self, charge: &Charge) -> Result<ChargeOutcome, PaymentServerError> {
        let response = self.post(&self.charge_url, CHARGE_CONTEXT, charge).await?;
        let status = response.status();
        match status {
            StatusCode::OK => Ok(ChargeOutcome::Charged),
            StatusCode::PAYMENT_REQUIRED => {
                let pending: PendingPayment =
                    response
                        .json()
                        .await
                        .map_err(|e| PaymentServerError::JsonDeserialization {
                            context: CHARGE_CONTEXT,
                            source: e,
                        })?;
                Ok(ChargeOutcome::PaymentRequired(pending))
            }
            _ => {
                let body =
                    response
                        .text()
                        .await
                        .map_err(|e| PaymentServerError::ResponseBodyRead {
                            context: CHARGE_CONTEXT,
                            source: e,
                        })?;
                Err(PaymentServerError::HttpStatus {
                    context: CHARGE_CONTEXT,
                    status,
                    body,
                })
            }
        }
    }

    /// Opens a payment request covering `charge` and returns its id.
    #[instrument(skip_all)]
    pub async fn create_payment_request(
        &self,
        charge: &Charge,
    ) -> Result<PaymentRequestId, PaymentServerError> {
        let response = self
            .post(&self.payment_request_url, PAYMENT_REQUEST_CONTEXT, charge)
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response
                .text()
                .await
                .map_err(|e| PaymentServerError::ResponseBodyRead {
                    context: PAYMENT_REQUEST_CONTEXT,
                    source: e,
                })?;
            return Err(PaymentServerError::HttpStatus {
                context: PAYMENT_REQUEST_CONTEXT,
                status,
                body,
            });
        }
        let receipt: PaymentRequestReceipt =
            response
                .json()
                .await
                .map_err(|e| PaymentServerError::JsonDeserialization {
                    context: PAYMENT_REQUEST_CONTEXT,
                    source: e,
                })?;
        if receipt.id.is_empty() {
            return Err(PaymentServerError::MissingPaymentRequestId);
        }
        Ok(receipt.id)
    }

    async fn post(
        &self,
        url: &Url,
        context: &'static str,
        payload: &Charge,
    ) -> Result<reqwest::Response, PaymentServerError> {
        let mut req = self
            .client
            .post(url.clone())
            .bearer_auth(self.credential.expose())
            .json(payload);
        for (name, value) in self.headers.iter() {
            req = req.header(name, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        req.send().await.map_err(|e| PaymentServerError::Http {
            context,
            source: e,
        })
    }
}

impl PaymentServer for PaymentServerClient {
    type Error = PaymentServerError;

    fn charge(
        &self,
        charge: &Charge,
    ) -> impl Future<Output = Result<ChargeOutcome, Self::Error>> + Send {
        self.charge(charge)
    }

    fn create_payment_request(
        &self,
        charge: &Charge,
    ) -> impl Future<Output = Result<PaymentRequestId, Self::Error>> + Send {
        self.create_payment_request(charge)
    }
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainId;
    use crate::types::{Currency, Destination, PayerId};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> PaymentServerClient {
        PaymentServerClient::try_new(
            server.uri().parse().unwrap(),
            ServiceCredential::new("svc-secret"),
        )
        .unwrap()
    }

    fn test_charge() -> Charge {
        Charge {
            source: PayerId::new("user-1"),
            destinations: vec![Destination {
                chain: ChainId::new("eip155", "8453"),
                currency: Currency::new("USDC"),
                address: "0x1111111111111111111111111111111111111111".to_string(),
                amount: "0.10".parse().unwrap(),
            }],
            payee_name: "Example API".to_string(),
        }
    }

    #[test]
    fn test_endpoint_urls() {
        let client = PaymentServerClient::try_new(
            "https://pay.example.com/api".parse().unwrap(),
            ServiceCredential::new("svc-secret"),
        )
        .unwrap();
        assert_eq!(client.charge_url().as_str(), "https://pay.example.com/api/charge");
        assert_eq!(
            client.payment_request_url().as_str(),
            "https://pay.example.com/api/payment-request"
        );
    }

    #[tokio::test]
    async fn test_charge_settles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/charge"))
            .and(header("authorization", "Bearer svc-secret"))
            .and(body_partial_json(json!({
                "source": "user-1",
                "payeeName": "Example API",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server).charge(&test_charge()).await.unwrap();
        assert!(outcome.is_charged());
    }

    #[tokio::test]
    async fn test_charge_reports_payment_required() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/charge"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "id": "pr-1",
                "amount": "0.10",
                "fundingUrl": "https://pay.example.com/fund/pr-1",
            })))
            .mount(&server)
            .await;

        let outcome = client_for(&server).charge(&test_charge()).await.unwrap();
        let pending = outcome.pending().unwrap();
        assert_eq!(pending.id.as_str(), "pr-1");
        assert_eq!(pending.amount.to_string(), "0.1");
        assert_eq!(
            pending.extra["fundingUrl"],
            "https://pay.example.com/fund/pr-1"
        );
    }

    #[tokio::test]
    async fn test_charge_rejects_malformed_402_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/charge"))
            .respond_with(ResponseTemplate::new(402).set_body_string("not json"))
            .mount(&server)
            .await;

        let error = client_for(&server).charge(&test_charge()).await.unwrap_err();
        assert!(matches!(
            error,
            PaymentServerError::JsonDeserialization { .. }
        ));
    }

    #[tokio::test]
    async fn test_charge_surfaces_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/charge"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let error = client_for(&server).charge(&test_charge()).await.unwrap_err();
        match error {
            PaymentServerError::HttpStatus { status, body, .. } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_payment_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment-request"))
            .and(header("authorization", "Bearer svc-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "pr-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client_for(&server)
            .create_payment_request(&test_charge())
            .await
            .unwrap();
        assert_eq!(id.as_str(), "pr-1");
    }

    #[tokio::test]
    async fn test_create_payment_request_rejects_blank_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment-request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "" })))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .create_payment_request(&test_charge())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            PaymentServerError::MissingPaymentRequestId
        ));
    }

    #[tokio::test]
    async fn test_create_payment_request_surfaces_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment-request"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .create_payment_request(&test_charge())
            .await
            .unwrap_err();
        assert!(matches!(error, PaymentServerError::HttpStatus { .. }));
    }

    #[tokio::test]
    async fn test_extra_headers_are_attached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/charge"))
            .and(header("x-request-source", "tollgate-test"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-request-source", "tollgate-test".parse().unwrap());
        let client = client_for(&server).with_headers(headers);
        client.charge(&test_charge()).await.unwrap();
    }
}
