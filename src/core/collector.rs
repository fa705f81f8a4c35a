use crate::core::aggregate::{aggregate, OverlapPolicy};
use crate::core::cost::pricing::PricingTable;
use crate::core::models::record::{DailyRecord, DayWindow};
use crate::core::providers::fetch::ProviderUsage;
use crate::core::providers::{Provider, ProviderError, UsageProvider};
use crate::core::store::{JsonStore, StoreError};

/// What one refresh of one day produced.
#[derive(Debug)]
pub struct DayOutcome {
    pub window: DayWindow,
    /// `None` when every provider failed; the stored day is left alone.
    pub record: Option<DailyRecord>,
    pub succeeded: Vec<Provider>,
    pub failures: Vec<ProviderError>,
}

impl DayOutcome {
    pub fn is_partial(&self) -> bool {
        self.record.is_some() && !self.failures.is_empty()
    }

    /// Count providers that could not even be set up (missing key or CLI)
    /// as failures of this day.
    pub fn with_skipped(mut self, skipped: &[ProviderError]) -> Self {
        self.failures.splice(0..0, skipped.iter().cloned());
        self
    }
}

/// Fetch every provider for `window`, one after another, and aggregate
/// whatever succeeded.
pub async fn collect_day(
    providers: &[Box<dyn UsageProvider>],
    window: &DayWindow,
    table: &PricingTable,
    policy: OverlapPolicy,
) -> DayOutcome {
    let mut fetched: Vec<ProviderUsage> = Vec::new();
    let mut failures = Vec::new();

    for provider in providers {
        tracing::info!(provider = provider.provider().id(), date = %window.label(), "fetching usage");
        match provider.fetch(window).await {
            Ok(usage) => {
                tracing::debug!(
                    provider = provider.provider().id(),
                    models = usage.usage.len(),
                    native_costs = usage.costs.is_some(),
                    "usage fetched"
                );
                fetched.push(usage);
            }
            Err(e) => {
                tracing::warn!(error = %e, date = %window.label(), "provider skipped for this run");
                failures.push(e);
            }
        }
    }

    let succeeded: Vec<Provider> = fetched.iter().map(|f| f.provider).collect();
    let record = if fetched.is_empty() {
        None
    } else {
        Some(aggregate(window, &fetched, table, policy))
    };

    if let Some(r) = &record {
        let unpriced = r.unpriced_models();
        if !unpriced.is_empty() {
            tracing::warn!(date = %window.label(), models = %unpriced.join(", "), "no pricing data");
        }
    }

    DayOutcome {
        window: *window,
        record,
        succeeded,
        failures,
    }
}

/// Collect one day and upsert it, replacing whatever was stored for it.
pub async fn refresh_day(
    store: &JsonStore,
    providers: &[Box<dyn UsageProvider>],
    window: &DayWindow,
    table: &PricingTable,
    policy: OverlapPolicy,
) -> Result<DayOutcome, StoreError> {
    let outcome = collect_day(providers, window, table, policy).await;
    match &outcome.record {
        Some(record) => {
            store.upsert(window.date, record.clone())?;
            tracing::info!(
                date = %window.label(),
                tokens = record.summary.tokens,
                requests = record.summary.requests,
                cost = record.total_cost(),
                "daily record stored"
            );
        }
        None if providers.is_empty() => {
            tracing::warn!(date = %window.label(), "no providers configured, nothing stored");
        }
        None => {
            tracing::error!(date = %window.label(), "all providers failed, keeping previous record");
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::usage::ModelUsage;
    use crate::core::providers::fetch::FetchFuture;
    use chrono::NaiveDate;

    enum Behaviour {
        Usage(Vec<ModelUsage>),
        Unavailable,
        Unauthorized,
    }

    struct FakeProvider {
        provider: Provider,
        behaviour: Behaviour,
    }

    impl UsageProvider for FakeProvider {
        fn provider(&self) -> Provider {
            self.provider
        }

        fn fetch<'a>(&'a self, _window: &'a DayWindow) -> FetchFuture<'a> {
            Box::pin(async move {
                match &self.behaviour {
                    Behaviour::Usage(u) => Ok(ProviderUsage::new(self.provider, u.clone())),
                    Behaviour::Unavailable => {
                        Err(ProviderError::unavailable(self.provider, "connection reset"))
                    }
                    Behaviour::Unauthorized => Err(ProviderError::auth(self.provider, "HTTP 401")),
                }
            })
        }
    }

    fn fake(provider: Provider, behaviour: Behaviour) -> Box<dyn UsageProvider> {
        Box::new(FakeProvider {
            provider,
            behaviour,
        })
    }

    fn kimi(tokens: u64) -> Vec<ModelUsage> {
        vec![ModelUsage {
            input_tokens: tokens,
            requests: 1,
            ..ModelUsage::new("kimi-k2.5")
        }]
    }

    fn window() -> DayWindow {
        DayWindow::utc(NaiveDate::from_ymd_opt(2026, 2, 7).unwrap())
    }

    #[tokio::test]
    async fn unavailable_provider_does_not_block_the_other() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("token_usage.json"));
        let providers = vec![
            fake(Provider::OpenAi, Behaviour::Unavailable),
            fake(Provider::Moonshot, Behaviour::Usage(kimi(158_000))),
        ];

        let outcome = refresh_day(
            &store,
            &providers,
            &window(),
            &PricingTable::builtin(),
            OverlapPolicy::Sum,
        )
        .await
        .unwrap();

        assert!(outcome.is_partial());
        assert_eq!(outcome.succeeded, vec![Provider::Moonshot]);
        assert_eq!(outcome.failures.len(), 1);
        let stored = store.get(window().date).unwrap().unwrap();
        assert_eq!(stored.summary.tokens, 158_000);
    }

    #[tokio::test]
    async fn providers_skipped_at_setup_make_the_day_partial() {
        let providers = vec![fake(Provider::Moonshot, Behaviour::Usage(kimi(10)))];
        let outcome = collect_day(
            &providers,
            &window(),
            &PricingTable::builtin(),
            OverlapPolicy::Sum,
        )
        .await;
        assert!(!outcome.is_partial());

        let outcome =
            outcome.with_skipped(&[ProviderError::auth(Provider::OpenAi, "no admin key")]);
        assert!(outcome.is_partial());
        assert_eq!(outcome.failures[0].provider(), Provider::OpenAi);
        assert_eq!(outcome.succeeded, vec![Provider::Moonshot]);
    }

    #[tokio::test]
    async fn auth_failure_is_isolated_too() {
        let providers = vec![
            fake(Provider::OpenAi, Behaviour::Unauthorized),
            fake(Provider::Moonshot, Behaviour::Usage(kimi(10))),
        ];
        let outcome = collect_day(
            &providers,
            &window(),
            &PricingTable::builtin(),
            OverlapPolicy::Sum,
        )
        .await;
        assert!(matches!(outcome.failures[0], ProviderError::Auth { .. }));
        assert_eq!(outcome.record.unwrap().summary.tokens, 10);
    }

    #[tokio::test]
    async fn all_failed_keeps_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("token_usage.json"));
        let ok = vec![fake(Provider::Moonshot, Behaviour::Usage(kimi(42)))];
        refresh_day(&store, &ok, &window(), &PricingTable::builtin(), OverlapPolicy::Sum)
            .await
            .unwrap();

        let broken = vec![
            fake(Provider::OpenAi, Behaviour::Unavailable),
            fake(Provider::Moonshot, Behaviour::Unavailable),
        ];
        let outcome = refresh_day(
            &store,
            &broken,
            &window(),
            &PricingTable::builtin(),
            OverlapPolicy::Sum,
        )
        .await
        .unwrap();

        assert!(outcome.record.is_none());
        assert_eq!(store.get(window().date).unwrap().unwrap().summary.tokens, 42);
    }

    #[tokio::test]
    async fn repeated_refresh_overwrites_the_day() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("token_usage.json"));
        for tokens in [100, 250] {
            let providers = vec![fake(Provider::Moonshot, Behaviour::Usage(kimi(tokens)))];
            refresh_day(
                &store,
                &providers,
                &window(),
                &PricingTable::builtin(),
                OverlapPolicy::Sum,
            )
            .await
            .unwrap();
        }
        assert_eq!(store.get(window().date).unwrap().unwrap().summary.tokens, 250);
    }

    #[tokio::test]
    async fn corrupt_store_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token_usage.json");
        std::fs::write(&path, "not json").unwrap();
        let store = JsonStore::new(&path);
        let providers = vec![fake(Provider::Moonshot, Behaviour::Usage(kimi(1)))];
        let result = refresh_day(
            &store,
            &providers,
            &window(),
            &PricingTable::builtin(),
            OverlapPolicy::Sum,
        )
        .await;
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json");
    }
}
