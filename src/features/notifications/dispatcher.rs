//! Ordered notification fallback chain.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;

/// One way of surfacing a notification to the user
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// `Ok(())` when the notification was plausibly displayed
    async fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Tries each provider in order, stopping at the first success
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    providers: Vec<Arc<dyn NotificationProvider>>,
}

impl NotificationDispatcher {
    pub fn new(providers: Vec<Arc<dyn NotificationProvider>>) -> Self {
        NotificationDispatcher { providers }
    }

    pub fn with_provider(mut self, provider: Arc<dyn NotificationProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Never fails; `false` means every provider failed and the caller should alert in-app
    pub async fn attempt_notify(&self, title: &str, body: &str) -> bool {
        for provider in &self.providers {
            match provider.notify(title, body).await {
                Ok(()) => {
                    info!("Notification '{}' shown via {}", title, provider.name());
                    return true;
                }
                Err(e) => {
                    warn!("Notification via {} failed: {:#}", provider.name(), e);
                }
            }
        }
        debug!(
            "No notification provider succeeded for '{}' ({} tried)",
            title,
            self.providers.len()
        );
        false
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Provider that records calls and succeeds or fails on demand
    pub struct RecordingProvider {
        name: String,
        succeed: bool,
        delay: Option<std::time::Duration>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl RecordingProvider {
        pub fn new(name: &str, succeed: bool) -> Arc<Self> {
            Arc::new(RecordingProvider {
                name: name.to_string(),
                succeed,
                delay: None,
                calls: Mutex::new(Vec::new()),
            })
        }

        /// Succeeds, but only after `delay`
        pub fn slow(name: &str, delay: std::time::Duration) -> Arc<Self> {
            Arc::new(RecordingProvider {
                name: name.to_string(),
                succeed: true,
                delay: Some(delay),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    /// Dispatcher over the given providers, in order
    pub fn chain(providers: &[&Arc<RecordingProvider>]) -> NotificationDispatcher {
        providers.iter().fold(NotificationDispatcher::default(), |d, p| {
            d.with_provider(Arc::clone(*p) as Arc<dyn NotificationProvider>)
        })
    }

    #[async_trait]
    impl NotificationProvider for RecordingProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn notify(&self, title: &str, body: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.succeed {
                Ok(())
            } else {
                Err(anyhow::anyhow!("{} unavailable", self.name))
            }
        }
    }
}
