//! Task-scoped request context.
//!
//! A [`RequestContext`] carries the configuration, the resource URL, and the
//! token check outcome of the request currently being served. The host
//! transport establishes it once per request with [`RequestContext::scope`];
//! everything running inside that future, including the payment engine, can
//! then pick it up with [`RequestContext::current`] without threading it
//! through every call.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use url::Url;

use crate::config::Config;
use crate::token::TokenCheck;

tokio::task_local! {
    static CURRENT_CONTEXT: RequestContext;
}

struct ContextInner {
    config: Arc<Config>,
    resource: Url,
    token_check: TokenCheck,
}

/// Per-request state shared through a tokio task-local.
///
/// Cloning is cheap; all clones refer to the same request.
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

impl RequestContext {
    pub fn new(config: Arc<Config>, resource: Url, token_check: TokenCheck) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                config,
                resource,
                token_check,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        self.inner.config.as_ref()
    }

    /// The canonical URL of the resource serving this request.
    pub fn resource(&self) -> &Url {
        &self.inner.resource
    }

    pub fn token_check(&self) -> &TokenCheck {
        &self.inner.token_check
    }

    /// Runs `f` with this context installed as the current one.
    ///
    /// Nested scopes shadow the outer context for their duration.
    pub async fn scope<F: Future>(self, f: F) -> F::Output {
        CURRENT_CONTEXT.scope(self, f).await
    }

    /// The context of the request being served, `None` outside a
    /// [`RequestContext::scope`] call.
    pub fn current() -> Option<RequestContext> {
        CURRENT_CONTEXT.try_with(|context| context.clone()).ok()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("resource", &self.inner.resource.as_str())
            .field("token_check", &self.inner.token_check)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::money::MoneyAmount;
    use crate::token::{TokenCheck, TokenProblem};
    use crate::types::PaymentOption;

    fn test_config() -> Arc<Config> {
        let config = ConfigBuilder::default()
            .authorization_server("https://auth.example.com/".parse().unwrap())
            .payment_server("https://pay.example.com/".parse().unwrap())
            .accounts_service("https://accounts.example.com/".parse().unwrap())
            .service_credential("svc-secret")
            .payee_name("Example API")
            .payment_option(PaymentOption {
                network: "base".parse().unwrap(),
                currency: "USDC".into(),
                address: "0x1111111111111111111111111111111111111111".to_string(),
                amount: MoneyAmount::ZERO,
            })
            .build()
            .unwrap();
        Arc::new(config)
    }

    fn test_context(resource: &str) -> RequestContext {
        let resource: Url = resource.parse().unwrap();
        let check = TokenCheck::failed(
            TokenProblem::NoToken,
            crate::token::resource_metadata_url(&resource),
        );
        RequestContext::new(test_config(), resource, check)
    }

    #[tokio::test]
    async fn test_current_inside_scope() {
        let context = test_context("https://api.example.com/mcp");
        context
            .scope(async {
                let current = RequestContext::current().unwrap();
                assert_eq!(current.resource().as_str(), "https://api.example.com/mcp");
                assert_eq!(current.token_check().problem(), Some(TokenProblem::NoToken));
            })
            .await;
    }

    #[tokio::test]
    async fn test_current_outside_scope_is_none() {
        assert!(RequestContext::current().is_none());
    }

    #[tokio::test]
    async fn test_scopes_are_task_isolated() {
        let first = tokio::spawn(
            test_context("https://one.example.com/mcp").scope(async {
                tokio::task::yield_now().await;
                RequestContext::current().unwrap().resource().to_string()
            }),
        );
        let second = tokio::spawn(
            test_context("https://two.example.com/mcp").scope(async {
                tokio::task::yield_now().await;
                RequestContext::current().unwrap().resource().to_string()
            }),
        );
        assert_eq!(first.await.unwrap(), "https://one.example.com/mcp");
        assert_eq!(second.await.unwrap(), "https://two.example.com/mcp");
    }

    #[tokio::test]
    async fn test_nested_scope_shadows_and_restores() {
        let outer = test_context("https://outer.example.com/mcp");
        let inner = test_context("https://inner.example.com/mcp");
        outer
            .scope(async move {
                inner
                    .scope(async {
                        let current = RequestContext::current().unwrap();
                        assert_eq!(
                            current.resource().as_str(),
                            "https://inner.example.com/mcp"
                        );
                    })
                    .await;
                let current = RequestContext::current().unwrap();
                assert_eq!(current.resource().as_str(), "https://outer.example.com/mcp");
            })
            .await;
    }
}
