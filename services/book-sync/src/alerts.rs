//! Price alerts
//!
//! Watches instrument velocity on the configured detection window and
//! raises typed alerts when a dip or spike threshold is crossed.
//!
//! Cooldown is tracked per `(instrument, alert type)`: a dip does not
//! suppress a spike on the same instrument and vice versa. A single
//! evaluation can cross at most one threshold, since the change cannot be
//! both negative and positive, so the outcome never depends on check order.
//!
//! Crossings inside the cooldown are dropped, not queued.

use std::collections::{BTreeMap, VecDeque};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use types::ids::{AlertId, InstrumentId};
use types::numeric::Price;

use crate::config::{AlertConfig, AlertConfigStore, ConfigError};
use crate::notify::{NotificationChannel, NotificationSink};
use crate::registry::OrderBookRegistry;
use crate::velocity::VelocityWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertType {
    Dip,
    Spike,
}

/// A raised alert. Only `seen` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: AlertId,
    pub alert_type: AlertType,
    pub instrument_id: InstrumentId,
    /// Absolute fractional change that triggered the alert.
    pub magnitude: Decimal,
    pub current_price: Decimal,
    /// Price at the start of the detection window.
    pub previous_price: Decimal,
    pub last_trade_price: Option<Price>,
    pub timestamp: i64,
    pub seen: bool,
}

/// Input to threshold evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSignal {
    pub instrument_id: InstrumentId,
    pub window: VelocityWindow,
    /// Fractional change over `window`.
    pub change: Decimal,
    pub current_price: Decimal,
    pub previous_price: Decimal,
    pub last_trade_price: Option<Price>,
}

pub struct AlertEngine {
    config: AlertConfig,
    store: Option<AlertConfigStore>,
    alerts: VecDeque<PriceAlert>,
    cooldowns: BTreeMap<(InstrumentId, AlertType), i64>,
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl AlertEngine {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            store: None,
            alerts: VecDeque::new(),
            cooldowns: BTreeMap::new(),
            sinks: Vec::new(),
        }
    }

    /// Engine whose config is loaded from, and saved to, `store`.
    pub fn with_store(store: AlertConfigStore) -> Result<Self, ConfigError> {
        let config = store.load()?;
        let mut engine = Self::new(config);
        engine.store = Some(store);
        Ok(engine)
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// Build a signal for an instrument from registry state.
    ///
    /// `None` unless the registry recalculated velocity at `now`.
    pub fn signal_for(&self, registry: &OrderBookRegistry, instrument_id: &InstrumentId, now: i64) -> Option<PriceSignal> {
        let window = self.config.detection_window;
        let velocity = registry
            .get_velocity(instrument_id)
            .filter(|velocity| velocity.calculated_at == now)?;
        let current_price = registry.get_history(instrument_id)?.latest()?.midpoint;
        let previous_price = registry
            .get_price_at(instrument_id, now - window.duration_ms())
            .unwrap_or(current_price);

        Some(PriceSignal {
            instrument_id: instrument_id.clone(),
            window,
            change: velocity.change(window),
            current_price,
            previous_price,
            last_trade_price: registry.get_last_trade(instrument_id).map(|trade| trade.price),
        })
    }

    /// Evaluate one instrument against the thresholds.
    pub fn evaluate(&mut self, registry: &OrderBookRegistry, instrument_id: &InstrumentId, now: i64) -> Option<PriceAlert> {
        if !self.config.enabled {
            return None;
        }
        let signal = self.signal_for(registry, instrument_id, now)?;
        self.evaluate_signal(&signal, now)
    }

    /// Evaluate a prepared signal, raising at most one alert.
    pub fn evaluate_signal(&mut self, signal: &PriceSignal, now: i64) -> Option<PriceAlert> {
        if !self.config.enabled {
            return None;
        }

        let alert_type = if signal.change <= -self.config.dip_threshold {
            AlertType::Dip
        } else if signal.change >= self.config.spike_threshold {
            AlertType::Spike
        } else {
            return None;
        };

        let key = (signal.instrument_id.clone(), alert_type);
        if let Some(&last) = self.cooldowns.get(&key) {
            if now - last < self.config.cooldown_ms {
                debug!(
                    instrument = %signal.instrument_id,
                    alert_type = ?alert_type,
                    remaining_ms = self.config.cooldown_ms - (now - last),
                    "Threshold crossed within cooldown"
                );
                return None;
            }
        }
        self.cooldowns.insert(key, now);

        let alert = PriceAlert {
            id: AlertId::new(),
            alert_type,
            instrument_id: signal.instrument_id.clone(),
            magnitude: signal.change.abs(),
            current_price: signal.current_price,
            previous_price: signal.previous_price,
            last_trade_price: signal.last_trade_price,
            timestamp: now,
            seen: false,
        };

        info!(
            alert_id = %alert.id,
            alert_type = ?alert.alert_type,
            instrument = %alert.instrument_id,
            change = %signal.change,
            window = ?signal.window,
            "Raised price alert"
        );

        self.alerts.push_back(alert.clone());
        self.enforce_cap();
        self.notify(&alert);
        Some(alert)
    }

    fn notify(&mut self, alert: &PriceAlert) {
        let sound = self.config.sound_enabled;
        let platform = self.config.notifications_enabled;

        for sink in self.sinks.iter_mut() {
            let enabled = match sink.channel() {
                NotificationChannel::Sound => sound,
                NotificationChannel::Platform => platform,
            };
            if !enabled {
                continue;
            }
            if let Err(err) = sink.deliver(alert) {
                warn!(channel = ?sink.channel(), error = %err, "Notification delivery failed");
            }
        }
    }

    fn enforce_cap(&mut self) {
        while self.alerts.len() > self.config.max_alerts {
            self.alerts.pop_front();
        }
    }

    /// Flag one alert as seen. Returns false when the id is unknown.
    pub fn mark_seen(&mut self, id: AlertId) -> bool {
        match self.alerts.iter_mut().find(|alert| alert.id == id) {
            Some(alert) => {
                alert.seen = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_seen(&mut self) {
        for alert in self.alerts.iter_mut() {
            alert.seen = true;
        }
    }

    pub fn unseen_count(&self) -> usize {
        self.alerts.iter().filter(|alert| !alert.seen).count()
    }

    /// Alerts, oldest first.
    pub fn alerts(&self) -> impl Iterator<Item = &PriceAlert> {
        self.alerts.iter()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    pub fn clear_alerts(&mut self) {
        self.alerts.clear();
    }

    /// Drop cooldown state for an instrument.
    pub fn clear(&mut self, instrument_id: &InstrumentId) {
        self.cooldowns.retain(|(id, _), _| id != instrument_id);
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Replace the config, saving it when a store is attached.
    ///
    /// On a save failure the previous config stays in effect.
    pub fn set_config(&mut self, config: AlertConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if let Some(store) = &self.store {
            store.save(&config)?;
        }
        self.config = config;
        self.enforce_cap();
        Ok(())
    }
}
