//! Server configuration parsed from environment variables.
//!
//! Every setting has a default, so an empty environment runs the server the
//! way it always ran: port 3000, `public/`, `strokes.json`, `frame.raw`.
//! Unparseable values are logged and replaced by their default.

use std::env::VarError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::services::catchup::{CatchupConfig, DEFAULT_CHUNK_DELAY_MS, DEFAULT_CHUNK_SIZE};
use crate::services::engine::{DEFAULT_QUEUE_CAPACITY, DEFAULT_SAVE_DEBOUNCE_MS, EngineConfig};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PUBLIC_DIR: &str = "public";
pub const DEFAULT_STATE_FILE: &str = "strokes.json";
pub const DEFAULT_FRAME_FILE: &str = "frame.raw";
/// 500 KiB, the upload limit devices were built against.
pub const DEFAULT_FRAME_MAX_BYTES: usize = 500 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub public_dir: PathBuf,
    pub state_file: PathBuf,
    pub frame_file: PathBuf,
    pub frame_max_bytes: usize,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServerConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `PUBLIC_DIR`: default `public`
    /// - `STATE_FILE`: default `strokes.json`
    /// - `FRAME_FILE`: default `frame.raw`
    /// - `FRAME_MAX_BYTES`: default 512000
    /// - `SAVE_DEBOUNCE_MS`: default 1000
    /// - `CATCHUP_CHUNK_SIZE`: default 200, at least 1
    /// - `CATCHUP_CHUNK_DELAY_MS`: default 10
    /// - `ENGINE_QUEUE_CAPACITY`: default 1024
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(env_var)
    }

    /// Build config from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let chunk_size: usize = env_parse(&lookup, "CATCHUP_CHUNK_SIZE", DEFAULT_CHUNK_SIZE);
        let engine = EngineConfig {
            save_delay: Duration::from_millis(env_parse(&lookup, "SAVE_DEBOUNCE_MS", DEFAULT_SAVE_DEBOUNCE_MS)),
            catchup: CatchupConfig {
                chunk_size: chunk_size.max(1),
                chunk_delay: Duration::from_millis(env_parse(
                    &lookup,
                    "CATCHUP_CHUNK_DELAY_MS",
                    DEFAULT_CHUNK_DELAY_MS,
                )),
            },
            queue_capacity: env_parse(&lookup, "ENGINE_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY).max(1),
        };

        Self {
            port: env_parse(&lookup, "PORT", DEFAULT_PORT),
            public_dir: env_path(&lookup, "PUBLIC_DIR", DEFAULT_PUBLIC_DIR),
            state_file: env_path(&lookup, "STATE_FILE", DEFAULT_STATE_FILE),
            frame_file: env_path(&lookup, "FRAME_FILE", DEFAULT_FRAME_FILE),
            frame_max_bytes: env_parse(&lookup, "FRAME_MAX_BYTES", DEFAULT_FRAME_MAX_BYTES),
            engine,
        }
    }

    /// The page served at `/`.
    #[must_use]
    pub fn index_file(&self) -> PathBuf {
        self.public_dir.join("index.html")
    }
}

/// Read one variable. A value that is not valid unicode is logged and
/// treated as unset.
pub(crate) fn env_var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) => Some(value),
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(raw)) => {
            warn!(key, value = ?raw, "config: non-unicode value; using default");
            None
        }
    }
}

pub(crate) fn env_parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, "config: invalid value; using default");
            default
        }
    }
}

fn env_path(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> PathBuf {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => PathBuf::from(raw),
        _ => PathBuf::from(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
