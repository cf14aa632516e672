//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.
//!
//! Attendance policy values (late cutoff, face match threshold, sweep cadence) live
//! here as well, but the `services` crate never reads the singleton directly: the
//! binary copies them into plain policy structs at startup.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_duration_minutes: u64,
    pub late_cutoff_minutes: i64,
    pub face_match_threshold: f32,
    pub face_worker_threads: usize,
    pub face_model_url: String,
    pub request_timeout_ms: u64,
    pub sweep_interval_minutes: u64,
    pub sweep_batch_size: u64,
    pub excuse_after_marked: bool,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

/// Reads `key` and parses it, falling back to `default` when unset or malformed.
fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring malformed configuration value");
            default
        }),
        Err(_) => default,
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Every field has a development default so tests and local runs work without
    /// a `.env` file. Production deployments are expected to set `JWT_SECRET`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "roll-call".into()),
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "api=info,services=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "api.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/roll-call.db".into()),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: parsed_or("PORT", 3000),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".into()),
            jwt_duration_minutes: parsed_or("JWT_DURATION_MINUTES", 60),
            late_cutoff_minutes: parsed_or("LATE_CUTOFF_MINUTES", 15),
            face_match_threshold: parsed_or("FACE_MATCH_THRESHOLD", 0.80),
            face_worker_threads: parsed_or("FACE_WORKER_THREADS", default_worker_threads()),
            face_model_url: env::var("FACE_MODEL_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8500/embed".into()),
            request_timeout_ms: parsed_or("REQUEST_TIMEOUT_MS", 15_000),
            sweep_interval_minutes: parsed_or("SWEEP_INTERVAL_MINUTES", 5),
            sweep_batch_size: parsed_or("SWEEP_BATCH_SIZE", 1000),
            excuse_after_marked: parsed_or("EXCUSE_AFTER_MARKED", true),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock
                .write()
                .expect("Failed to acquire AppConfig write lock");
            *guard = AppConfig::from_env();
        }
    }

    /// Generic internal setter for any field in the config.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_jwt_secret(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.jwt_secret = value.into());
    }

    pub fn set_jwt_duration_minutes(value: impl Into<u64>) {
        AppConfig::set_field(|cfg| cfg.jwt_duration_minutes = value.into());
    }

    pub fn set_late_cutoff_minutes(value: i64) {
        AppConfig::set_field(|cfg| cfg.late_cutoff_minutes = value);
    }

    pub fn set_face_match_threshold(value: f32) {
        AppConfig::set_field(|cfg| cfg.face_match_threshold = value);
    }

    pub fn set_sweep_interval_minutes(value: u64) {
        AppConfig::set_field(|cfg| cfg.sweep_interval_minutes = value);
    }

    pub fn set_sweep_batch_size(value: u64) {
        AppConfig::set_field(|cfg| cfg.sweep_batch_size = value);
    }

    pub fn set_excuse_after_marked(value: bool) {
        AppConfig::set_field(|cfg| cfg.excuse_after_marked = value);
    }
}

// --- Free accessors ---

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

pub fn host() -> String {
    AppConfig::global().host.clone()
}

pub fn port() -> u16 {
    AppConfig::global().port
}

pub fn jwt_secret() -> String {
    AppConfig::global().jwt_secret.clone()
}

pub fn jwt_duration_minutes() -> u64 {
    AppConfig::global().jwt_duration_minutes
}

pub fn late_cutoff_minutes() -> i64 {
    AppConfig::global().late_cutoff_minutes
}

pub fn face_match_threshold() -> f32 {
    AppConfig::global().face_match_threshold
}

pub fn face_worker_threads() -> usize {
    AppConfig::global().face_worker_threads.max(1)
}

pub fn face_model_url() -> String {
    AppConfig::global().face_model_url.clone()
}

pub fn request_timeout_ms() -> u64 {
    AppConfig::global().request_timeout_ms
}

pub fn sweep_interval_minutes() -> u64 {
    AppConfig::global().sweep_interval_minutes.max(1)
}

pub fn sweep_batch_size() -> u64 {
    AppConfig::global().sweep_batch_size.max(1)
}

pub fn excuse_after_marked() -> bool {
    AppConfig::global().excuse_after_marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn setters_override_loaded_values() {
        AppConfig::set_late_cutoff_minutes(20);
        AppConfig::set_face_match_threshold(0.9);
        assert_eq!(late_cutoff_minutes(), 20);
        assert!((face_match_threshold() - 0.9).abs() < f32::EPSILON);
        AppConfig::reset();
    }

    #[test]
    #[serial]
    fn sweep_values_never_drop_to_zero() {
        AppConfig::set_sweep_batch_size(0);
        AppConfig::set_sweep_interval_minutes(0);
        assert_eq!(sweep_batch_size(), 1);
        assert_eq!(sweep_interval_minutes(), 1);
        AppConfig::reset();
    }
}
