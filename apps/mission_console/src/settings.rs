//! Console settings: TOML file first, environment overrides second.

use std::{collections::HashMap, fs};

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_url: String,
    pub client_id: String,
    /// Operator input bound for the linear axis, cm/s. Matches the vehicle
    /// firmware limit; the session core itself never clamps.
    pub max_linear_speed_cm_s: f64,
    /// Operator input bound for the angular axis, deg/s.
    pub max_angular_speed_deg_s: f64,
    pub max_fork_height_cm: f64,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            client_id: "operator_console".into(),
            max_linear_speed_cm_s: 20.0,
            max_angular_speed_deg_s: 40.0,
            max_fork_height_cm: 300.0,
            reconnect_initial_ms: 500,
            reconnect_max_ms: 10_000,
        }
    }
}

pub fn load_settings(path: &str) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            if let Some(v) = file_cfg.get("server_url").and_then(toml::Value::as_str) {
                settings.server_url = v.to_string();
            }
            if let Some(v) = file_cfg.get("client_id").and_then(toml::Value::as_str) {
                settings.client_id = v.to_string();
            }
            if let Some(v) = file_cfg.get("max_linear_speed_cm_s").and_then(f64_value) {
                settings.max_linear_speed_cm_s = v;
            }
            if let Some(v) = file_cfg.get("max_angular_speed_deg_s").and_then(f64_value) {
                settings.max_angular_speed_deg_s = v;
            }
            if let Some(v) = file_cfg.get("max_fork_height_cm").and_then(f64_value) {
                settings.max_fork_height_cm = v;
            }
            if let Some(v) = file_cfg.get("reconnect_initial_ms").and_then(u64_value) {
                settings.reconnect_initial_ms = v;
            }
            if let Some(v) = file_cfg.get("reconnect_max_ms").and_then(u64_value) {
                settings.reconnect_max_ms = v;
            }
        }
    }

    if let Ok(v) = std::env::var("BACKEND_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Ok(v) = std::env::var("APP__CLIENT_ID") {
        settings.client_id = v;
    }

    if let Ok(v) = std::env::var("APP__MAX_LINEAR_SPEED_CM_S") {
        if let Ok(parsed) = v.parse::<f64>() {
            settings.max_linear_speed_cm_s = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__MAX_ANGULAR_SPEED_DEG_S") {
        if let Ok(parsed) = v.parse::<f64>() {
            settings.max_angular_speed_deg_s = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__MAX_FORK_HEIGHT_CM") {
        if let Ok(parsed) = v.parse::<f64>() {
            settings.max_fork_height_cm = parsed;
        }
    }

    if let Ok(v) = std::env::var("APP__RECONNECT_INITIAL_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.reconnect_initial_ms = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__RECONNECT_MAX_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.reconnect_max_ms = parsed;
        }
    }

    let defaults = Settings::default();
    settings.max_linear_speed_cm_s =
        checked_bound(settings.max_linear_speed_cm_s, defaults.max_linear_speed_cm_s);
    settings.max_angular_speed_deg_s = checked_bound(
        settings.max_angular_speed_deg_s,
        defaults.max_angular_speed_deg_s,
    );
    settings.max_fork_height_cm =
        checked_bound(settings.max_fork_height_cm, defaults.max_fork_height_cm);

    settings
}

/// Numeric settings may be written as TOML numbers or as quoted strings.
fn f64_value(value: &toml::Value) -> Option<f64> {
    match value {
        toml::Value::Float(v) => Some(*v),
        toml::Value::Integer(v) => Some(*v as f64),
        toml::Value::String(v) => v.parse().ok(),
        _ => None,
    }
}

fn u64_value(value: &toml::Value) -> Option<u64> {
    match value {
        toml::Value::Integer(v) => u64::try_from(*v).ok(),
        toml::Value::String(v) => v.parse().ok(),
        _ => None,
    }
}

/// Input bounds feed `f64::clamp`, which panics on NaN or an inverted range.
/// A nonsense bound is treated like an unparseable one: the default stands.
fn checked_bound(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        fallback
    }
}
