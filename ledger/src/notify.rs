use async_trait::async_trait;
use dg_utxo_core::errors::LedgerError;
use dg_utxo_core::traits::services::Notifier;
use log::info;
#[cfg(feature = "metrics")]
use dashmap::DashMap;
#[cfg(feature = "metrics")]
use prometheus::core::{AtomicU64, GenericCounter};
#[cfg(feature = "metrics")]
use prometheus::Registry;

/// Writes every notice to the log and nothing else.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogNotifier;
#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<(), LedgerError> {
        info!("Publish {topic}: {message}");
        Ok(())
    }
    async fn enqueue(&self, queue: &str, message: &str, dedupe_key: &str) -> Result<(), LedgerError> {
        info!("Enqueue {queue} ({dedupe_key}): {message}");
        Ok(())
    }
    async fn increment_counter(&self, name: &str) -> Result<(), LedgerError> {
        info!("Counter {name} +1");
        Ok(())
    }
}

/// Counters land in a prometheus registry, messages are logged.
#[cfg(feature = "metrics")]
pub struct PrometheusNotifier {
    registry: Registry,
    counters: DashMap<String, GenericCounter<AtomicU64>>,
}
#[cfg(feature = "metrics")]
impl PrometheusNotifier {
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            counters: DashMap::new(),
        }
    }
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
    #[must_use]
    pub fn counter_value(&self, name: &str) -> Option<u64> {
        self.counters.get(&metric_name(name)).map(|c| c.get())
    }
}

/// Prometheus names allow `[a-zA-Z0-9_:]` only.
#[cfg(feature = "metrics")]
fn metric_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == ':' { c } else { '_' })
        .collect()
}

#[cfg(feature = "metrics")]
#[async_trait]
impl Notifier for PrometheusNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<(), LedgerError> {
        LogNotifier.publish(topic, message).await
    }
    async fn enqueue(&self, queue: &str, message: &str, dedupe_key: &str) -> Result<(), LedgerError> {
        LogNotifier.enqueue(queue, message, dedupe_key).await
    }
    async fn increment_counter(&self, name: &str) -> Result<(), LedgerError> {
        let metric = metric_name(name);
        if let Some(counter) = self.counters.get(&metric) {
            counter.inc();
            return Ok(());
        }
        let counter = self
            .counters
            .entry(metric.clone())
            .or_try_insert_with(|| {
                let counter: GenericCounter<AtomicU64> =
                    GenericCounter::new(metric.as_str(), format!("Count of {name}"))?;
                self.registry.register(Box::new(counter.clone()))?;
                Ok::<_, prometheus::Error>(counter)
            })
            .map_err(|e| LedgerError::remote("metrics", e))?;
        counter.inc();
        Ok(())
    }
}
