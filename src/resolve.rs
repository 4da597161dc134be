//! Destination resolution.
//!
//! A configured [`PaymentOption`] names a network and an address-like
//! target; resolution turns it into zero or more concrete [`Destination`]s
//! money can actually be sent to. Passthrough networks map one option to one
//! destination on a fixed chain. The hosted network instead asks the
//! accounts service which deposit addresses back the named account, which
//! can fan out across several chains.
//!
//! A [`ResolverRegistry`] holds one resolver per configured network and
//! resolves options against all of them concurrently, keeping the output
//! deterministic: destinations appear in option order, then in registry
//! order, regardless of which remote lookup finishes first.

use futures_util::future::try_join_all;
use tracing::instrument;

use crate::accounts::{AccountsClientError, HostedAccountsClient};
use crate::config::Config;
use crate::network::Network;
use crate::types::{Destination, PayerId, PaymentOption, PaymentRequestId};

/// Errors that can occur during destination resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Accounts(#[from] AccountsClientError),
}

/// Resolves options for one fixed network onto its chain as-is.
#[derive(Debug, Clone)]
pub struct PassthroughResolver {
    network: Network,
}

impl PassthroughResolver {
    pub fn new(network: Network) -> Self {
        Self { network }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Maps the option to a single destination, or to nothing when the
    /// option targets a different network.
    pub fn resolve(&self, option: &PaymentOption) -> Vec<Destination> {
        if option.network != self.network {
            return Vec::new();
        }
        let Some(chain) = self.network.chain_id() else {
            return Vec::new();
        };
        vec![Destination {
            chain,
            currency: option.currency.clone(),
            address: option.address.clone(),
            amount: option.amount,
        }]
    }
}

/// Resolves hosted options through the accounts service.
#[derive(Debug, Clone)]
pub struct HostedResolver {
    accounts: HostedAccountsClient,
}

impl HostedResolver {
    pub fn new(accounts: HostedAccountsClient) -> Self {
        Self { accounts }
    }

    /// Expands a hosted option into one destination per deposit address the
    /// accounts service provisioned for the account. Each destination
    /// carries the full option amount; the payment server settles whichever
    /// one the payer uses.
    pub async fn resolve(
        &self,
        option: &PaymentOption,
        sources: &[PayerId],
        payment_request_id: Option<&PaymentRequestId>,
    ) -> Result<Vec<Destination>, ResolveError> {
        if option.network != Network::Hosted {
            return Ok(Vec::new());
        }
        let addresses = self
            .accounts
            .deposit_addresses(&option.address, sources, payment_request_id)
            .await?;
        Ok(addresses
            .into_iter()
            .map(|deposit| Destination {
                chain: deposit.chain,
                currency: deposit.currency,
                address: deposit.address,
                amount: option.amount,
            })
            .collect())
    }
}

/// One destination resolver, keyed by the network it serves.
#[derive(Debug, Clone)]
pub enum Resolver {
    Passthrough(PassthroughResolver),
    Hosted(HostedResolver),
}

impl Resolver {
    pub fn network(&self) -> Network {
        match self {
            Resolver::Passthrough(resolver) => resolver.network(),
            Resolver::Hosted(_) => Network::Hosted,
        }
    }

    pub async fn resolve(
        &self,
        option: &PaymentOption,
        sources: &[PayerId],
        payment_request_id: Option<&PaymentRequestId>,
    ) -> Result<Vec<Destination>, ResolveError> {
        match self {
            Resolver::Passthrough(resolver) => Ok(resolver.resolve(option)),
            Resolver::Hosted(resolver) => {
                resolver.resolve(option, sources, payment_request_id).await
            }
        }
    }
}

/// A fixed set of resolvers, one per network payments can arrive on.
#[derive(Debug, Clone)]
pub struct ResolverRegistry {
    resolvers: Vec<Resolver>,
}

impl ResolverRegistry {
    pub fn new(resolvers: Vec<Resolver>) -> Self {
        Self { resolvers }
    }

    /// Builds a registry covering exactly the given networks, in order.
    ///
    /// The match is deliberately exhaustive so adding a [`Network`] variant
    /// forces a decision on how it resolves.
    pub fn for_networks(networks: &[Network], accounts: &HostedAccountsClient) -> Self {
        let resolvers = networks
            .iter()
            .map(|network| match network {
                Network::Base => Resolver::Passthrough(PassthroughResolver::new(Network::Base)),
                Network::BaseSepolia => {
                    Resolver::Passthrough(PassthroughResolver::new(Network::BaseSepolia))
                }
                Network::Polygon => {
                    Resolver::Passthrough(PassthroughResolver::new(Network::Polygon))
                }
                Network::Solana => Resolver::Passthrough(PassthroughResolver::new(Network::Solana)),
                Network::SolanaDevnet => {
                    Resolver::Passthrough(PassthroughResolver::new(Network::SolanaDevnet))
                }
                Network::Hosted => Resolver::Hosted(HostedResolver::new(accounts.clone())),
            })
            .collect();
        Self { resolvers }
    }

    /// Builds a registry for the networks the config's payment options name,
    /// deduplicated in first-seen order.
    pub fn from_config(config: &Config, accounts: &HostedAccountsClient) -> Self {
        let mut networks: Vec<Network> = Vec::new();
        for option in config.payment_options() {
            if !networks.contains(&option.network) {
                networks.push(option.network);
            }
        }
        Self::for_networks(&networks, accounts)
    }

    pub fn resolvers(&self) -> &[Resolver] {
        &self.resolvers
    }

    /// Resolves one option against every resolver, concatenating results in
    /// registry order.
    pub async fn resolve_option(
        &self,
        option: &PaymentOption,
        sources: &[PayerId],
        payment_request_id: Option<&PaymentRequestId>,
    ) -> Result<Vec<Destination>, ResolveError> {
        let lookups = self
            .resolvers
            .iter()
            .map(|resolver| resolver.resolve(option, sources, payment_request_id));
        let resolved = try_join_all(lookups).await?;
        Ok(resolved.into_iter().flatten().collect())
    }

    /// Resolves every option, concatenating results in option order. An
    /// option whose network has no resolver contributes nothing.
    #[instrument(skip_all, fields(options = options.len()))]
    pub async fn resolve_all(
        &self,
        options: &[PaymentOption],
        sources: &[PayerId],
        payment_request_id: Option<&PaymentRequestId>,
    ) -> Result<Vec<Destination>, ResolveError> {
        let lookups = options
            .iter()
            .map(|option| self.resolve_option(option, sources, payment_request_id));
        let resolved = try_join_all(lookups).await?;
        Ok(resolved.into_iter().flatten().collect())
    }
}
