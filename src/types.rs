//! Wire and domain types for the charging protocol.
//!
//! Everything that crosses an HTTP boundary lives here: payment options as
//! configured, destinations as resolved, the charge document submitted to the
//! payment server, and the pending-payment descriptor that comes back on a
//! declined charge. Amounts are decimal strings, chains are CAIP-2 strings,
//! field names are camelCase.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

use crate::chain::ChainId;
use crate::money::MoneyAmount;
use crate::network::Network;

/// Subject identifier of the authenticated payer, as minted by the
/// authorization server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayerId(String);

impl PayerId {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of a payment request held open at the payment server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentRequestId(String);

impl PaymentRequestId {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for PaymentRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PaymentRequestId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Currency code carried on options and destinations, e.g. `USD` or `USDC`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A configured way to get paid.
///
/// For passthrough networks `address` is an on-chain address. For the hosted
/// network it is an opaque account handle understood by the hosted accounts
/// service. The configured `amount` is a placeholder: the engine stamps the
/// requested price onto every option before resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOption {
    pub network: Network,
    pub currency: Currency,
    pub address: String,
    pub amount: MoneyAmount,
}

impl PaymentOption {
    /// Returns a copy of this option carrying `amount`.
    pub fn with_amount(&self, amount: MoneyAmount) -> Self {
        let mut this = self.clone();
        this.amount = amount;
        this
    }
}

/// A concrete place money can be sent, produced by destination resolution.
///
/// The chain is serialized under the `network` key as a CAIP-2 string, the
/// same vocabulary the hosted accounts service uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    #[serde(rename = "network")]
    pub chain: ChainId,
    pub currency: Currency,
    pub address: String,
    pub amount: MoneyAmount,
}

/// The charge document submitted to the payment server.
///
/// Every destination independently carries the full requested amount. The
/// payment server settles against whichever destination the payer funds;
/// amounts are never split across destinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
    pub source: PayerId,
    pub destinations: Vec<Destination>,
    pub payee_name: String,
}

/// Descriptor of an unpaid charge, returned by the payment server with
/// status 402.
///
/// Payment servers attach fields beyond `id` and `amount` (settlement
/// hints, memos); they are kept verbatim in `extra` and travel along when
/// the descriptor is re-serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPayment {
    pub id: PaymentRequestId,
    pub amount: MoneyAmount,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of a charge submission.
///
/// A declined charge is not an error: the payment server answers 402 with a
/// [`PendingPayment`] descriptor, and the engine turns that into a
/// payment-required signal for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ChargeOutcome {
    /// The payer's balance covered the charge.
    Charged,
    /// The charge was declined; the payer must fund the described payment.
    PaymentRequired(PendingPayment),
}

impl ChargeOutcome {
    pub fn is_charged(&self) -> bool {
        matches!(self, ChargeOutcome::Charged)
    }

    pub fn pending(&self) -> Option<&PendingPayment> {
        match self {
            ChargeOutcome::Charged => None,
            ChargeOutcome::PaymentRequired(pending) => Some(pending),
        }
    }
}
