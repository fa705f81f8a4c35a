use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use crate::core::models::cost::ModelCost;
use crate::core::models::usage::ModelUsage;
use crate::core::providers::{Provider, ProviderError};

pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ProviderUsage, ProviderError>> + Send + 'a>>;

/// Result of a provider fetch for one day.
#[derive(Debug, Clone)]
pub struct ProviderUsage {
    pub provider: Provider,
    pub usage: Vec<ModelUsage>,
    /// Present only when the provider reports cost itself.
    pub costs: Option<BTreeMap<String, ModelCost>>,
}

impl ProviderUsage {
    pub fn new(provider: Provider, usage: Vec<ModelUsage>) -> Self {
        Self {
            provider,
            usage,
            costs: None,
        }
    }

    pub fn with_native_costs(mut self, costs: BTreeMap<String, ModelCost>) -> Self {
        self.costs = Some(costs);
        self
    }
}

/// Validate that a resolved endpoint URL uses HTTPS.
///
/// Providers that allow endpoint overrides must call this before sending
/// credentials, to prevent exfiltration over plain HTTP or other schemes.
pub fn validate_endpoint(url: &str, provider: Provider) -> Result<(), ProviderError> {
    if !url.starts_with("https://") {
        return Err(ProviderError::auth(
            provider,
            format!("endpoint must use HTTPS, got: {}", url),
        ));
    }
    Ok(())
}
