//! Bearer-token verification against a remote authorization server.
//!
//! [`TokenVerifier`] introspects bearer tokens (RFC 7662 shape) and folds the
//! result into a [`TokenCheck`]: either a pass carrying the decoded
//! [`TokenData`], or a [`TokenProblem`] describing why the request must be
//! challenged. The check itself never fails; remote faults become
//! [`TokenProblem::IntrospectError`] so the caller can answer with a 502-class
//! challenge instead of crashing the request.
//!
//! Every check also computes the RFC 9728 protected-resource-metadata URL for
//! the resource, which the challenge builder quotes in `WWW-Authenticate`.
//!
//! ## Error Handling
//!
//! Custom error types capture detailed failure contexts, including
//! - URL construction
//! - HTTP transport failures
//! - JSON parse errors
//! - Unexpected HTTP status responses

use http::{HeaderMap, StatusCode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;
use std::time::Duration;
use tracing::{instrument, warn};
use url::Url;

use crate::config::{Config, ServiceCredential};
use crate::money::MoneyAmount;
use crate::timestamp::UnixTimestamp;
use crate::types::PayerId;

/// The raw bearer token as presented by the caller.
///
/// `Debug` output is redacted so tokens never land in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    /// The raw token, for forwarding to downstream services.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Why a token check did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenProblem {
    /// No `Authorization` header was presented.
    NoToken,
    /// An `Authorization` header was presented, but it does not carry a
    /// bearer token.
    NonBearerAuthHeader,
    /// The token is inactive, expired, revoked, or otherwise unusable.
    InvalidToken,
    /// The token's audience claim does not cover this resource.
    InvalidAudience,
    /// The token is valid but its funding claim is below the configured
    /// minimum payment.
    NonSufficientFunds,
    /// The authorization server could not be consulted.
    IntrospectError,
}

impl fmt::Display for TokenProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenProblem::NoToken => "no bearer token",
            TokenProblem::NonBearerAuthHeader => "authorization header is not a bearer token",
            TokenProblem::InvalidToken => "token is invalid or expired",
            TokenProblem::InvalidAudience => "token audience does not match the resource",
            TokenProblem::NonSufficientFunds => "token funding is below the minimum payment",
            TokenProblem::IntrospectError => "token introspection failed",
        };
        f.write_str(text)
    }
}

/// Decoded claims of a token that passed the check.
#[derive(Debug, Clone)]
pub struct TokenData {
    /// Subject identifier, the payer charges are billed against.
    pub sub: PayerId,
    /// Audience claim as a list, empty when the server emitted none.
    pub aud: Vec<String>,
    pub scope: Option<String>,
    pub exp: Option<UnixTimestamp>,
    /// Funding advertised by the authorization server, when it does so.
    pub balance: Option<MoneyAmount>,
    /// The raw introspection claims document, for auditing.
    pub claims: Box<RawValue>,
}

#[derive(Debug, Clone)]
enum CheckOutcome {
    Passed { token: BearerToken, data: TokenData },
    Failed { problem: TokenProblem },
}

/// The outcome of verifying one request's bearer token.
///
/// Either the check passed and the token plus its decoded claims are
/// available, or it failed with a [`TokenProblem`]. The
/// protected-resource-metadata URL is populated in both cases.
#[derive(Debug, Clone)]
pub struct TokenCheck {
    outcome: CheckOutcome,
    resource_metadata_url: Url,
}

impl TokenCheck {
    pub fn passed(token: BearerToken, data: TokenData, resource_metadata_url: Url) -> Self {
        Self {
            outcome: CheckOutcome::Passed { token, data },
            resource_metadata_url,
        }
    }

    pub fn failed(problem: TokenProblem, resource_metadata_url: Url) -> Self {
        Self {
            outcome: CheckOutcome::Failed { problem },
            resource_metadata_url,
        }
    }

    pub fn passes(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Passed { .. })
    }

    /// The problem behind a failed check, `None` when it passed.
    pub fn problem(&self) -> Option<TokenProblem> {
        match &self.outcome {
            CheckOutcome::Passed { .. } => None,
            CheckOutcome::Failed { problem } => Some(*problem),
        }
    }

    /// The verified token, `None` when the check failed.
    pub fn token(&self) -> Option<&BearerToken> {
        match &self.outcome {
            CheckOutcome::Passed { token, .. } => Some(token),
            CheckOutcome::Failed { .. } => None,
        }
    }

    /// The decoded claims, `None` when the check failed.
    pub fn data(&self) -> Option<&TokenData> {
        match &self.outcome {
            CheckOutcome::Passed { data, .. } => Some(data),
            CheckOutcome::Failed { .. } => None,
        }
    }

    pub fn resource_metadata_url(&self) -> &Url {
        &self.resource_metadata_url
    }
}

/// The RFC 9728 protected-resource-metadata document served at
/// [`resource_metadata_url`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    pub resource: Url,
    pub authorization_servers: Vec<Url>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bearer_methods_supported: Vec<String>,
}

impl ProtectedResourceMetadata {
    pub fn new(resource: Url, authorization_server: Url) -> Self {
        Self {
            resource,
            authorization_servers: vec![authorization_server],
            bearer_methods_supported: vec!["header".to_string()],
        }
    }
}

/// Computes the RFC 9728 well-known metadata URL for a resource.
///
/// The well-known segment is inserted between the origin and the resource
/// path: `https://host/mcp` becomes
/// `https://host/.well-known/oauth-protected-resource/mcp`.
pub fn resource_metadata_url(resource: &Url) -> Url {
    let mut url = resource.clone();
    let path = resource.path().trim_end_matches('/');
    url.set_path(&format!("/.well-known/oauth-protected-resource{path}"));
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Errors that can occur while talking to the authorization server.
#[derive(Debug, thiserror::Error)]
pub enum TokenVerifierError {
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
    #[error("Failed to parse JSON: {context}: {source}")]
    JsonParse {
        context: &'static str,
        #[source]
        source: serde_json::Error,
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

const INTROSPECT_CONTEXT: &str = "POST /introspect";

/// Introspection reply, RFC 7662 shape plus the `balance` funding claim.
#[derive(Debug, Deserialize)]
struct IntrospectionReply {
    active: bool,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    aud: Option<Audience>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    exp: Option<UnixTimestamp>,
    #[serde(default)]
    balance: Option<MoneyAmount>,
}

/// The `aud` claim is a single string or an array of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn into_vec(self) -> Vec<String> {
        match self {
            Audience::One(value) => vec![value],
            Audience::Many(values) => values,
        }
    }
}

/// Verifies bearer tokens by introspecting them at the authorization server.
#[derive(Clone, Debug)]
pub struct TokenVerifier {
    /// Base URL of the authorization server.
    base_url: Url,
    /// Full URL of the `POST ./introspect` endpoint.
    introspect_url: Url,
    /// Shared Reqwest HTTP client.
    client: Client,
    /// Service credential presented to the introspection endpoint.
    credential: ServiceCredential,
    /// Minimum payment a funding claim must cover.
    minimum_payment: MoneyAmount,
    /// Extra headers attached to every request.
    headers: HeaderMap,
    /// Optional request timeout.
    timeout: Option<Duration>,
}

impl TokenVerifier {
    /// Constructs a verifier for the given authorization server.
    pub fn try_new(
        authorization_server: Url,
        credential: ServiceCredential,
        minimum_payment: MoneyAmount,
    ) -> Result<Self, TokenVerifierError> {
        let client = Client::new();
        let authorization_server = ensure_trailing_slash(authorization_server);
        let introspect_url =
            authorization_server
                .join("./introspect")
                .map_err(|e| TokenVerifierError::UrlParse {
                    context: "Failed to construct ./introspect URL",
                    source: e,
                })?;
        Ok(Self {
            base_url: authorization_server,
            introspect_url,
            client,
            credential,
            minimum_payment,
            headers: HeaderMap::new(),
            timeout: None,
        })
    }

    /// Constructs a verifier from a [`Config`], applying its request timeout.
    pub fn from_config(config: &Config) -> Result<Self, TokenVerifierError> {
        let verifier = Self::try_new(
            config.authorization_server().clone(),
            config.service_credential().clone(),
            config.minimum_payment(),
        )?;
        Ok(match config.request_timeout() {
            Some(timeout) => verifier.with_timeout(timeout),
            None => verifier,
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

    /// Returns the base URL of the authorization server.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the computed `./introspect` URL relative to [`TokenVerifier::base_url`].
    pub fn introspect_url(&self) -> &Url {
        &self.introspect_url
    }

    /// Checks the `Authorization` header of a request against `resource`.
    ///
    /// Decision order: missing header, non-bearer scheme, introspection
    /// fault, audience mismatch, inactive or expired token, insufficient
    /// funding. The audience check only fires when the server emitted an
    /// `aud` claim; an inactive token's reply legitimately carries no claims
    /// at all.
    #[instrument(skip_all, fields(resource = %resource))]
    pub async fn check(&self, resource: &Url, authorization: Option<&str>) -> TokenCheck {
        let metadata_url = resource_metadata_url(resource);
        let Some(header) = authorization else {
            return TokenCheck::failed(TokenProblem::NoToken, metadata_url);
        };
        let Some(token) = bearer_token(header) else {
            return TokenCheck::failed(TokenProblem::NonBearerAuthHeader, metadata_url);
        };
        let (reply, claims) = match self.introspect(token).await {
            Ok(introspection) => introspection,
            Err(error) => {
                warn!(%error, "token introspection failed");
                return TokenCheck::failed(TokenProblem::IntrospectError, metadata_url);
            }
        };

        let audience = reply.aud.map(Audience::into_vec).unwrap_or_default();
        if !audience.is_empty() && !audience_matches(&audience, resource) {
            return TokenCheck::failed(TokenProblem::InvalidAudience, metadata_url);
        }
        if !reply.active {
            return TokenCheck::failed(TokenProblem::InvalidToken, metadata_url);
        }
        // An active token without a subject cannot be charged against.
        let sub = match reply.sub {
            Some(sub) if !sub.is_empty() => PayerId::new(sub),
            _ => return TokenCheck::failed(TokenProblem::InvalidToken, metadata_url),
        };
        // An expiry in the past overrides a stale active flag.
        if let Some(exp) = reply.exp {
            if exp < UnixTimestamp::now() {
                return TokenCheck::failed(TokenProblem::InvalidToken, metadata_url);
            }
        }
        if let Some(balance) = reply.balance {
            if balance < self.minimum_payment {
                return TokenCheck::failed(TokenProblem::NonSufficientFunds, metadata_url);
            }
        }

        let data = TokenData {
            sub,
            aud: audience,
            scope: reply.scope,
            exp: reply.exp,
            balance: reply.balance,
            claims,
        };
        TokenCheck::passed(BearerToken::new(token), data, metadata_url)
    }

    /// Sends a `POST ./introspect` request with the token as a form
    /// parameter, per RFC 7662.
    async fn introspect(
        &self,
        token: &str,
    ) -> Result<(IntrospectionReply, Box<RawValue>), TokenVerifierError> {
        let mut req = self
            .client
            .post(self.introspect_url.clone())
            .bearer_auth(self.credential.expose())
            .form(&[("token", token)]);
        for (name, value) in self.headers.iter() {
            req = req.header(name, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let response = req.send().await.map_err(|e| TokenVerifierError::Http {
            context: INTROSPECT_CONTEXT,
            source: e,
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TokenVerifierError::ResponseBodyRead {
                context: INTROSPECT_CONTEXT,
                source: e,
            })?;
        if status != StatusCode::OK {
            return Err(TokenVerifierError::HttpStatus {
                context: INTROSPECT_CONTEXT,
                status,
                body,
            });
        }
        let reply: IntrospectionReply =
            serde_json::from_str(&body).map_err(|e| TokenVerifierError::JsonParse {
                context: INTROSPECT_CONTEXT,
                source: e,
            })?;
        let claims = RawValue::from_string(body).map_err(|e| TokenVerifierError::JsonParse {
            context: INTROSPECT_CONTEXT,
            source: e,
        })?;
        Ok((reply, claims))
    }
}

/// Extracts the token from a bearer `Authorization` header value.
///
/// The scheme comparison is case-insensitive. An empty credentials part is
/// malformed, not an invalid token.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn audience_matches(audience: &[String], resource: &Url) -> bool {
    let resource = resource.as_str().trim_end_matches('/');
    audience
        .iter()
        .any(|aud| aud.trim_end_matches('/') == resource)
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }
    url
}
