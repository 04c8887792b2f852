//! Telegram long-polling transport.

pub mod client;
pub mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{RelayConfig, TelegramConfig};
use crate::observability::metrics;
use crate::relay::RelayRouter;
use crate::resilience::backoff::calculate_backoff;
use crate::store::MappingStore;
use crate::transport::{Transport, TransportError};

pub use client::BotApi;

/// Polls `getUpdates` and hands every message to the relay router.
pub struct TelegramTransport {
    api: BotApi,
    router: RelayRouter<BotApi>,
    config: TelegramConfig,
    closed: AtomicBool,
}

impl TelegramTransport {
    pub fn new(config: &RelayConfig, store: Arc<MappingStore>) -> Result<Self, TransportError> {
        let api = BotApi::new(config)?;
        let router = RelayRouter::new(api.clone(), store, config.support_group_id);
        Ok(Self {
            api,
            router,
            config: config.telegram.clone(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn start_polling(&self) -> Result<(), TransportError> {
        tracing::info!(timeout_secs = self.config.poll_timeout_secs, "Polling for updates");

        let mut offset: Option<i64> = None;
        let mut failures: u32 = 0;

        while !self.is_closed() {
            match self.api.get_updates(offset, self.config.poll_timeout_secs).await {
                Ok(updates) => {
                    failures = 0;
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.router.handle_update(&update).await;
                    }
                }
                Err(TransportError::Unauthorized) => {
                    tracing::error!("Bot token rejected, stopping poll loop");
                    return Err(TransportError::Unauthorized);
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    metrics::record_poll_error();
                    let delay = calculate_backoff(
                        failures,
                        self.config.retry_base_delay_ms,
                        self.config.retry_max_delay_ms,
                    );
                    tracing::warn!(error = %e, attempt = failures, delay = ?delay, "Polling failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        tracing::info!("Poll loop finished");
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!("Telegram session closed");
        }
        Ok(())
    }
}
