//! Fan-out of saved settings to every open start page.
//!
//! Delivery is best-effort: a listener that is not subscribed yet, or that
//! falls behind the channel capacity, misses the message.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::error::Result;
use crate::models::SettingsRecord;
use crate::storage::{settings_from_value, KeyValueStore, SETTINGS_KEY};

const DEFAULT_CAPACITY: usize = 16;

/// Message delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SettingsMessage {
    UpdateSettings { settings: SettingsRecord },
}

/// Source of settings changes, whether pushed or polled.
#[allow(async_fn_in_trait)]
pub trait ChangeFeed {
    /// Wait for the next change. `None` once the feed can produce no more.
    async fn next_change(&mut self) -> Option<SettingsRecord>;
}

/// Push side of settings propagation.
#[derive(Debug, Clone)]
pub struct SettingsBroadcaster {
    sender: broadcast::Sender<SettingsMessage>,
}

impl Default for SettingsBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SettingsBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver `settings` to every live listener; returns how many were reached.
    pub fn broadcast(&self, settings: &SettingsRecord) -> usize {
        let message = SettingsMessage::UpdateSettings {
            settings: settings.clone(),
        };
        match self.sender.send(message) {
            Ok(listeners) => {
                tracing::debug!(listeners, "Broadcast settings update");
                listeners
            }
            Err(_) => {
                tracing::debug!("No listeners for settings update");
                0
            }
        }
    }

    pub fn subscribe(&self) -> SettingsSubscription {
        SettingsSubscription {
            receiver: self.sender.subscribe(),
        }
    }
}

/// A listener registered with a [`SettingsBroadcaster`].
#[derive(Debug)]
pub struct SettingsSubscription {
    receiver: broadcast::Receiver<SettingsMessage>,
}

impl SettingsSubscription {
    /// Next raw message, skipping anything this listener lagged behind on.
    pub async fn recv(&mut self) -> Option<SettingsMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Settings listener lagged, skipped updates");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl ChangeFeed for SettingsSubscription {
    async fn next_change(&mut self) -> Option<SettingsRecord> {
        self.recv()
            .await
            .map(|SettingsMessage::UpdateSettings { settings }| settings)
    }
}

/// Pull side: polls the settings key and reports when it changes.
pub struct PollingWatcher<'a, S> {
    kv: &'a S,
    ticker: Interval,
    last_seen: Option<Value>,
}

impl<'a, S: KeyValueStore> PollingWatcher<'a, S> {
    /// Start watching; the currently stored record is the baseline.
    pub async fn new(kv: &'a S, period: Duration) -> Result<Self> {
        let last_seen = kv.get_value(SETTINGS_KEY).await?;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Ok(Self {
            kv,
            ticker,
            last_seen,
        })
    }
}

impl<S: KeyValueStore> ChangeFeed for PollingWatcher<'_, S> {
    async fn next_change(&mut self) -> Option<SettingsRecord> {
        loop {
            self.ticker.tick().await;
            let current = match self.kv.get_value(SETTINGS_KEY).await {
                Ok(current) => current,
                Err(error) => {
                    tracing::warn!(%error, "Polling settings failed");
                    continue;
                }
            };
            if current == self.last_seen {
                continue;
            }
            self.last_seen.clone_from(&current);
            return Some(current.map(settings_from_value).unwrap_or_default());
        }
    }
}
