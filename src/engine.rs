//! The payment engine.
//!
//! [`PaymentEngine::require_payment`] is the one call a metered operation
//! makes: it prices the current request, resolves the configured payment
//! options into destinations, and asks the payment server to charge the
//! request's payer. When the payer cannot be charged outright the engine
//! falls back to a payment request the client can fulfil out of band,
//! reusing one the caller already knows about instead of opening a
//! duplicate.
//!
//! The engine reads the payer and configuration from the ambient
//! [`RequestContext`], so it must run inside [`RequestContext::scope`].

use std::future::Future;
use tracing::{debug, instrument};
use url::Url;

use crate::accounts::{AccountsClientError, HostedAccountsClient};
use crate::config::Config;
use crate::context::RequestContext;
use crate::money::MoneyAmount;
use crate::payment_server::{PaymentServer, PaymentServerClient, PaymentServerError};
use crate::resolve::{ResolveError, ResolverRegistry};
use crate::types::{Charge, ChargeOutcome, PaymentOption, PaymentRequestId};

/// A payment the client must complete before retrying.
#[derive(Debug, Clone, PartialEq)]
pub struct RequiredPayment {
    /// The authorization server the client should settle through.
    pub authorization_server: Url,
    /// The payment request to fulfil.
    pub payment_request_id: PaymentRequestId,
    /// The amount still owed.
    pub amount: MoneyAmount,
}

/// The outcome of [`PaymentEngine::require_payment`].
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    /// The payer was charged; the operation can proceed.
    Charged,
    /// The payer must complete a payment first.
    Required(RequiredPayment),
}

impl PaymentOutcome {
    pub fn is_charged(&self) -> bool {
        matches!(self, PaymentOutcome::Charged)
    }

    pub fn required(&self) -> Option<&RequiredPayment> {
        match self {
            PaymentOutcome::Charged => None,
            PaymentOutcome::Required(required) => Some(required),
        }
    }
}

/// Errors that can occur while requiring a payment.
#[derive(Debug, thiserror::Error)]
pub enum EngineError<SE> {
    #[error("no request context is current; require_payment must run inside RequestContext::scope")]
    NoRequestContext,
    #[error("the current request has no verified payer")]
    MissingPayer,
    #[error("no payment option resolved to a destination")]
    NoDestinations,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("payment server error: {0}")]
    PaymentServer(SE),
}

/// Errors that can occur while constructing an engine from configuration.
#[derive(Debug, thiserror::Error)]
pub enum EngineSetupError {
    #[error(transparent)]
    PaymentServer(#[from] PaymentServerError),
    #[error(transparent)]
    Accounts(#[from] AccountsClientError),
}

/// Charges the current request's payer, falling back to payment requests.
#[derive(Debug, Clone)]
pub struct PaymentEngine<S = PaymentServerClient> {
    server: S,
    registry: ResolverRegistry,
}

impl<S: PaymentServer> PaymentEngine<S> {
    pub fn new(server: S, registry: ResolverRegistry) -> Self {
        Self { server, registry }
    }

    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    /// Requires a payment of `price` from the current request's payer.
    ///
    /// The configured payment options are stamped with `price`, resolved
    /// into destinations, and submitted as one charge. A settled charge
    /// yields [`PaymentOutcome::Charged`]. When the payment server answers
    /// 402 instead, `existing_payment` is consulted: a payment request id it
    /// returns is reused, with the amount the server reported still owed;
    /// otherwise a fresh payment request over the full price is opened. The
    /// lookup runs at most once, and only after a 402.
    #[instrument(skip_all, fields(price = %price))]
    pub async fn require_payment<F, Fut>(
        &self,
        price: MoneyAmount,
        existing_payment: F,
    ) -> Result<PaymentOutcome, EngineError<S::Error>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<PaymentRequestId>>,
    {
        let context = RequestContext::current().ok_or(EngineError::NoRequestContext)?;
        let data = context
            .token_check()
            .data()
            .ok_or(EngineError::MissingPayer)?;
        let source = data.sub.clone();
        let config = context.config();

        let options: Vec<PaymentOption> = config
            .payment_options()
            .iter()
            .map(|option| option.with_amount(price))
            .collect();
        let destinations = self
            .registry
            .resolve_all(&options, std::slice::from_ref(&source), None)
            .await?;
        if destinations.is_empty() {
            return Err(EngineError::NoDestinations);
        }

        let charge = Charge {
            source,
            destinations,
            payee_name: config.payee_name().to_string(),
        };
        let outcome = self
            .server
            .charge(&charge)
            .await
            .map_err(EngineError::PaymentServer)?;
        let pending = match outcome {
            ChargeOutcome::Charged => return Ok(PaymentOutcome::Charged),
            ChargeOutcome::PaymentRequired(pending) => pending,
        };

        if let Some(payment_request_id) = existing_payment().await {
            debug!(id = %payment_request_id, "reusing existing payment request");
            return Ok(PaymentOutcome::Required(RequiredPayment {
                authorization_server: config.authorization_server().clone(),
                payment_request_id,
                amount: pending.amount,
            }));
        }

        let payment_request_id = self
            .server
            .create_payment_request(&charge)
            .await
            .map_err(EngineError::PaymentServer)?;
        Ok(PaymentOutcome::Required(RequiredPayment {
            authorization_server: config.authorization_server().clone(),
            payment_request_id,
            amount: price,
        }))
    }
}

impl PaymentEngine<PaymentServerClient> {
    /// Constructs an engine from a [`Config`]: an HTTP payment server
    /// client plus resolvers for every network the payment options name.
    pub fn from_config(config: &Config) -> Result<Self, EngineSetupError> {
        let server = PaymentServerClient::from_config(config)?;
        let accounts = HostedAccountsClient::from_config(config)?;
        let registry = ResolverRegistry::from_config(config, &accounts);
        Ok(Self::new(server, registry))
    }
}
