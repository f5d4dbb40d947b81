//! Imminent weather alerts from the hourly forecast.
//!
//! Looks at the next hour of forecast samples and raises at most one alert,
//! by priority storm > snow > rain > fog. Unlike radar proximity alerts,
//! dismissal here is a cooldown: the same alert may come back after
//! [`DISMISS_COOLDOWN_MS`]. External notifications have their own, shorter
//! cooldown.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::Clock;
use crate::storage::{read_json, write_json, SessionStore};
use crate::types::Location;

pub const DISMISS_COOLDOWN_MS: i64 = 30 * 60 * 1000;
pub const NOTIFY_COOLDOWN_MS: i64 = 5 * 60 * 1000;

/// Humidity above this percentage counts as fog.
const FOG_HUMIDITY: f64 = 95.0;

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1..=2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            56 | 57 => Self::Sleet, // Freezing drizzle
            61 | 63 | 80 => Self::Rain,
            65 | 81 | 82 => Self::HeavyRain,
            66 | 67 => Self::Sleet, // Freezing rain
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Clear, // Unknown codes default to clear
        }
    }

    /// Imminent alert category this condition raises, if any.
    /// Sleet raises nothing.
    fn alert_type(&self) -> Option<ImminentAlertType> {
        match self {
            Self::Thunderstorm => Some(ImminentAlertType::Storm),
            Self::Snow => Some(ImminentAlertType::Snow),
            Self::Drizzle | Self::Rain | Self::HeavyRain => Some(ImminentAlertType::Rain),
            Self::Fog => Some(ImminentAlertType::Fog),
            _ => None,
        }
    }
}

/// One hourly forecast entry as delivered by the forecast client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    pub timestamp: DateTime<Utc>,
    pub weather_code: i32,
    pub humidity: Option<f64>,
}

/// Alert categories, in descending priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImminentAlertType {
    Storm,
    Snow,
    Rain,
    Fog,
}

impl ImminentAlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storm => "storm",
            Self::Snow => "snow",
            Self::Rain => "rain",
            Self::Fog => "fog",
        }
    }

    pub fn severity(&self) -> ImminentSeverity {
        match self {
            Self::Storm => ImminentSeverity::Danger,
            Self::Snow | Self::Fog => ImminentSeverity::Warning,
            Self::Rain => ImminentSeverity::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImminentSeverity {
    Info,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImminentAlert {
    pub alert_type: ImminentAlertType,
    /// Stable dedupe key, e.g. `storm-imminent`
    pub key: String,
    pub title_key: String,
    pub message_key: String,
    pub severity: ImminentSeverity,
}

impl ImminentAlert {
    fn new(alert_type: ImminentAlertType) -> Self {
        let name = alert_type.as_str();
        Self {
            alert_type,
            key: format!("{}-imminent", name),
            title_key: format!("alert.imminent.{}.title", name),
            message_key: format!("alert.imminent.{}.message", name),
            severity: alert_type.severity(),
        }
    }
}

/// Highest-priority alert among samples in `[now, now + 1h]`.
pub fn evaluate_imminent(hourly: &[HourlySample], now: DateTime<Utc>) -> Option<ImminentAlert> {
    let horizon = now + Duration::hours(1);

    hourly
        .iter()
        .filter(|h| h.timestamp >= now && h.timestamp <= horizon)
        .filter_map(|h| {
            let from_code = WeatherCondition::from_wmo_code(h.weather_code).alert_type();
            let humid = h.humidity.is_some_and(|v| v > FOG_HUMIDITY);
            match from_code {
                Some(kind) => Some(kind),
                None if humid => Some(ImminentAlertType::Fog),
                None => None,
            }
        })
        .min()
        .map(ImminentAlert::new)
}

#[derive(Debug, thiserror::Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Out-of-app notification channel (system tray, mobile bridge).
pub trait AlertNotifier: Send + Sync {
    fn notify(&self, alert: &ImminentAlert) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CooldownStamp {
    key: String,
    /// Epoch milliseconds
    timestamp: i64,
}

fn dismiss_key(alert_key: &str) -> String {
    format!("imminent-alert-dismiss-{}", alert_key)
}

fn notify_key(alert_key: &str) -> String {
    format!("imminent-alert-notify-{}", alert_key)
}

/// Tracks the current imminent alert, its dismissal cooldown, and
/// notification delivery.
pub struct ImminentAlertTracker {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    notifier: Option<Arc<dyn AlertNotifier>>,
    active: Option<ImminentAlert>,
    is_dismissed: bool,
    previous_key: Option<String>,
}

impl ImminentAlertTracker {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            notifier: None,
            active: None,
            is_dismissed: false,
            previous_key: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn AlertNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn active_alert(&self) -> Option<&ImminentAlert> {
        self.active.as_ref()
    }

    pub fn is_dismissed(&self) -> bool {
        self.is_dismissed
    }

    /// Re-evaluate after new forecast data or a location change.
    pub fn update(
        &mut self,
        hourly: Option<&[HourlySample]>,
        location: Option<&Location>,
    ) -> Option<ImminentAlert> {
        let (Some(hourly), Some(_)) = (hourly, location) else {
            self.active = None;
            self.is_dismissed = false;
            return None;
        };

        let now = self.clock.now();
        let Some(alert) = evaluate_imminent(hourly, now) else {
            self.active = None;
            self.is_dismissed = false;
            self.previous_key = None;
            return None;
        };

        if self.within_cooldown(&dismiss_key(&alert.key), &alert.key, DISMISS_COOLDOWN_MS) {
            self.active = None;
            self.is_dismissed = true;
            return None;
        }

        self.active = Some(alert.clone());
        self.is_dismissed = false;

        let is_new = self.previous_key.as_deref() != Some(alert.key.as_str());
        self.previous_key = Some(alert.key.clone());
        if is_new {
            self.deliver(&alert);
        }

        Some(alert)
    }

    /// Hide the active alert for the dismissal cooldown.
    pub fn dismiss(&mut self) {
        let Some(alert) = self.active.take() else {
            return;
        };
        self.stamp(&dismiss_key(&alert.key), &alert.key);
        self.is_dismissed = true;
    }

    fn deliver(&self, alert: &ImminentAlert) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let key = notify_key(&alert.key);
        if self.within_cooldown(&key, &alert.key, NOTIFY_COOLDOWN_MS) {
            tracing::debug!("Skipping notification for {} (cooldown)", alert.key);
            return;
        }
        match notifier.notify(alert) {
            Ok(()) => self.stamp(&key, &alert.key),
            Err(e) => tracing::error!("Failed to deliver imminent alert {}: {}", alert.key, e),
        }
    }

    fn within_cooldown(&self, storage_key: &str, alert_key: &str, cooldown_ms: i64) -> bool {
        let Some(stamp) = read_json::<CooldownStamp>(self.store.as_ref(), storage_key) else {
            return false;
        };
        // Stamps from the future or out of range are ignored.
        match self.clock.now().timestamp_millis().checked_sub(stamp.timestamp) {
            Some(elapsed) if elapsed >= 0 => stamp.key == alert_key && elapsed < cooldown_ms,
            _ => false,
        }
    }

    fn stamp(&self, storage_key: &str, alert_key: &str) {
        let stamp = CooldownStamp {
            key: alert_key.to_string(),
            timestamp: self.clock.now().timestamp_millis(),
        };
        if let Err(e) = write_json(self.store.as_ref(), storage_key, &stamp) {
            tracing::warn!("Failed to persist alert state {}: {}", storage_key, e);
        }
    }
}
