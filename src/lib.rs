//! Bearer-token authorization and payment charging for JSON-RPC services.
//!
//! This crate provides the building blocks for putting a paid JSON-RPC
//! service behind OAuth-style bearer tokens: token introspection, RFC 6750
//! challenges, request classification, and an idempotent charge-or-defer
//! exchange with a remote payment server.
//!
//! # Overview
//!
//! A protected resource answers `402 Payment Required`-style flows in two
//! layers. First, every request must carry a bearer token the authorization
//! server vouches for; requests that do not are answered with an RFC 6750
//! challenge pointing at the resource's RFC 9728 metadata document. Second,
//! priced JSON-RPC calls are charged against the token's subject through a
//! payment server, which either settles immediately or names a payment
//! request the client must fulfil before retrying.
//!
//! # Flow
//!
//! - **Classify**: [`classify`] decides which HTTP requests carry JSON-RPC
//!   calls addressed to the protected mount path.
//! - **Verify**: [`token`] introspects the bearer token and produces a
//!   [`TokenCheck`](token::TokenCheck).
//! - **Challenge**: [`challenge`] maps a failed check onto the HTTP response
//!   the resource must answer with.
//! - **Scope**: [`context`] binds configuration, resource URL, and the check
//!   to the current task.
//! - **Charge**: [`engine`] resolves payment destinations and drives the
//!   charge, falling back to payment requests.
//!
//! # Modules
//!
//! - [`accounts`] — Client for the hosted accounts service that fans account
//!   handles out to per-chain deposit addresses.
//! - [`chain`] — CAIP-2 chain identifiers.
//! - [`challenge`] — RFC 6750 bearer challenges for failed token checks.
//! - [`classify`] — JSON-RPC request classification for the mount path.
//! - [`config`] — Configuration from the environment, a JSON file, or a builder.
//! - [`context`] — Task-scoped request context.
//! - [`engine`] — The payment engine: resolve, charge, defer.
//! - [`money`] — Decimal money amounts with string JSON encoding.
//! - [`network`] — The payment networks destinations can live on.
//! - [`payment_server`] — Payment server protocol and HTTP client.
//! - [`resolve`] — Destination resolution, passthrough and hosted.
//! - [`timestamp`] — Unix timestamps for token expiry claims.
//! - [`token`] — Bearer-token verification via remote introspection.
//! - [`types`] — Shared wire types: options, destinations, charges.
//!
//! # Example
//!
//! For an end-to-end request walkthrough, from classification through
//! challenge to charging, see the README and the [`engine`] module
//! documentation.

pub mod accounts;
pub mod chain;
pub mod challenge;
pub mod classify;
pub mod config;
pub mod context;
pub mod engine;
pub mod money;
pub mod network;
pub mod payment_server;
pub mod resolve;
pub mod timestamp;
pub mod token;
pub mod types;
