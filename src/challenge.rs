//! RFC 6750 bearer challenges for failed token checks.
//!
//! [`build_challenge`] maps a failed [`TokenCheck`] to the HTTP response the
//! resource must answer with: a status code, an optional `error` code for the
//! body, and a `WWW-Authenticate` header pointing the client at the
//! protected-resource-metadata document so it can discover the authorization
//! server.

use http::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{Response, StatusCode};
use std::fmt;
use url::Url;

use crate::token::{TokenCheck, TokenProblem};

/// RFC 6750 error codes quoted in challenge bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BearerErrorCode {
    InvalidRequest,
    InvalidToken,
    InsufficientScope,
    ServerError,
}

impl BearerErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BearerErrorCode::InvalidRequest => "invalid_request",
            BearerErrorCode::InvalidToken => "invalid_token",
            BearerErrorCode::InsufficientScope => "insufficient_scope",
            BearerErrorCode::ServerError => "server_error",
        }
    }
}

impl fmt::Display for BearerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bearer challenge ready to be rendered as an HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    status: StatusCode,
    error: Option<BearerErrorCode>,
    resource_metadata_url: Url,
}

impl Challenge {
    pub fn new(
        status: StatusCode,
        error: Option<BearerErrorCode>,
        resource_metadata_url: Url,
    ) -> Self {
        Self {
            status,
            error,
            resource_metadata_url,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn error(&self) -> Option<BearerErrorCode> {
        self.error
    }

    /// The `WWW-Authenticate` header value for this challenge.
    pub fn www_authenticate(&self) -> String {
        format!(
            "Bearer resource_metadata=\"{}\"",
            self.resource_metadata_url
        )
    }

    /// The JSON body quoting the error code, `None` for bare challenges.
    pub fn body(&self) -> Option<String> {
        self.error
            .map(|code| format!("{{\"error\":\"{}\"}}", code.as_str()))
    }

    /// Renders the challenge as an [`http::Response`].
    pub fn to_http(&self) -> Result<Response<Vec<u8>>, http::Error> {
        let mut builder = Response::builder()
            .status(self.status)
            .header(WWW_AUTHENTICATE, self.www_authenticate());
        let body = match self.body() {
            Some(body) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                body.into_bytes()
            }
            None => Vec::new(),
        };
        builder.body(body)
    }
}

/// Builds the challenge for a token check, `None` when the check passed.
///
/// | problem               | status | error                |
/// |-----------------------|--------|----------------------|
/// | `NoToken`             | 401    | none                 |
/// | `NonBearerAuthHeader` | 400    | `invalid_request`    |
/// | `InvalidToken`        | 401    | `invalid_token`      |
/// | `InvalidAudience`     | 401    | `invalid_token`      |
/// | `NonSufficientFunds`  | 403    | `insufficient_scope` |
/// | `IntrospectError`     | 502    | `server_error`       |
pub fn build_challenge(check: &TokenCheck) -> Option<Challenge> {
    let problem = check.problem()?;
    let (status, error) = match problem {
        TokenProblem::NoToken => (StatusCode::UNAUTHORIZED, None),
        TokenProblem::NonBearerAuthHeader => (
            StatusCode::BAD_REQUEST,
            Some(BearerErrorCode::InvalidRequest),
        ),
        TokenProblem::InvalidToken | TokenProblem::InvalidAudience => {
            (StatusCode::UNAUTHORIZED, Some(BearerErrorCode::InvalidToken))
        }
        TokenProblem::NonSufficientFunds => (
            StatusCode::FORBIDDEN,
            Some(BearerErrorCode::InsufficientScope),
        ),
        TokenProblem::IntrospectError => {
            (StatusCode::BAD_GATEWAY, Some(BearerErrorCode::ServerError))
        }
    };
    Some(Challenge::new(
        status,
        error,
        check.resource_metadata_url().clone(),
    ))
}
