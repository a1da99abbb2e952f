use crate::analysis::trend::DEFAULT_SURGE_THRESHOLD;
use crate::error::ConfigError;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 1;

pub const DEFAULT_SETTINGS_PATH: &str = "settings.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyChannel {
    Log,
    Json,
}

impl NotifyChannel {
    fn parse(value: &str) -> Self {
        match value {
            "json" => Self::Json,
            _ => Self::Log,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub db_path: PathBuf,
    pub retention_days: u32,
    pub surge_threshold: f64,
    pub top_n_details: usize,
    pub notify_channel: NotifyChannel,
    pub report_path: PathBuf,
}

pub fn load_effective_settings(path: &Path) -> Result<EffectiveSettings, ConfigError> {
    let settings = load_settings_from_disk(path)?;
    Ok(effective_from_value(&settings))
}

fn effective_from_value(settings: &Value) -> EffectiveSettings {
    let text = |key: &str, default: &str| {
        settings
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };

    EffectiveSettings {
        db_path: PathBuf::from(text("dbPath", "data/skills.db")),
        retention_days: settings
            .get("retentionDays")
            .and_then(Value::as_u64)
            .unwrap_or(30) as u32,
        surge_threshold: settings
            .get("surgeThreshold")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_SURGE_THRESHOLD),
        top_n_details: settings
            .get("topNDetails")
            .and_then(Value::as_u64)
            .unwrap_or(20) as usize,
        notify_channel: NotifyChannel::parse(&text("notifyChannel", "log")),
        report_path: PathBuf::from(text("reportPath", "data/trends.json")),
    }
}

/// Read settings, filling in defaults. The file is (re)written when it is
/// missing or needed migrating.
pub fn load_settings_from_disk(path: &Path) -> Result<Value, ConfigError> {
    let original = if path.exists() {
        let raw = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        serde_json::from_str::<Value>(&raw).map_err(ConfigError::Parse)?
    } else {
        json!({})
    };

    let migrated = migrate_settings(original.clone());
    if migrated != original || !path.exists() {
        write_settings_file(path, &migrated)?;
    }

    Ok(migrated)
}

pub fn save_settings_to_disk(path: &Path, settings: Value) -> Result<Value, ConfigError> {
    let mut merged = load_settings_from_disk(path).unwrap_or_else(|_| default_settings());
    merge_settings(&mut merged, &settings);

    let migrated = migrate_settings(merged);
    write_settings_file(path, &migrated)?;
    Ok(migrated)
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(ConfigError::WriteFile)?;
    }
    let raw = serde_json::to_string_pretty(settings).map_err(ConfigError::Parse)?;
    fs::write(path, raw).map_err(ConfigError::WriteFile)
}

fn migrate_settings(input: Value) -> Value {
    let defaults = default_settings();
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    let version = out
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(SETTINGS_SCHEMA_VERSION);
    if version > SETTINGS_SCHEMA_VERSION {
        log::warn!("settings schema v{version} is newer than v{SETTINGS_SCHEMA_VERSION}; continuing");
    }

    deep_merge_defaults(&mut out, &defaults);
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "dbPath": "data/skills.db",
        "retentionDays": 30,
        "surgeThreshold": DEFAULT_SURGE_THRESHOLD,
        "topNDetails": 20,
        "notifyChannel": "log",
        "reportPath": "data/trends.json"
    })
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_u64(obj, "retentionDays", 1, 3650, 30);
    clamp_u64(obj, "topNDetails", 1, 200, 20);
    clamp_f64(obj, "surgeThreshold", 0.0, 10.0, DEFAULT_SURGE_THRESHOLD);

    sanitize_enum(obj, "notifyChannel", &["log", "json"], "log");
    ensure_string(obj, "dbPath", "data/skills.db");
    ensure_string(obj, "reportPath", "data/trends.json");
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn clamp_f64(map: &mut Map<String, Value>, key: &str, min: f64, max: f64, default: f64) {
    let raw = map
        .get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn sanitize_enum(map: &mut Map<String, Value>, key: &str, allowed: &[&str], default: &str) {
    let valid = map
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| allowed.contains(value))
        .unwrap_or(default);
    map.insert(key.to_string(), json!(valid));
}

fn ensure_string(map: &mut Map<String, Value>, key: &str, default: &str) {
    let value = map
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
        .to_string();
    map.insert(key.to_string(), json!(value));
}
