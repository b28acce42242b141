//! # Supervisor configuration.
//!
//! [`SupervisorConfig`] describes the server installation (path, jar, memory
//! flags), idle shutdown, status polling and RCON retry behavior. It can be
//! built in code or loaded from a TOML file with kebab-case keys:
//!
//! ```toml
//! server-path = "/srv/minecraft"
//! server-jar-file = "paper.jar"
//! server-max-memory = "4G"
//! server-min-memory = "1G"
//! empty-server-shutdown-minutes = 15
//! ```
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use mcvisor::SupervisorConfig;
//!
//! let mut cfg = SupervisorConfig::default();
//! cfg.server_path = "/srv/minecraft".into();
//! cfg.idle_shutdown = Some(Duration::from_secs(15 * 60));
//!
//! assert_eq!(cfg.jar_path(), std::path::Path::new("/srv/minecraft/server.jar"));
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::core::LaunchSpec;
use crate::error::ConfigError;
use crate::policies::RetryPolicy;
use crate::rcon::RconOptions;

/// Configuration of one managed server.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Server directory; the child's working directory and home of `server.properties`.
    pub server_path: PathBuf,
    /// Jar file name, relative to `server_path`.
    pub jar_file: String,
    /// Java executable.
    pub java: String,
    /// `-Xms` value, e.g. `1G`.
    pub min_memory: Option<String>,
    /// `-Xmx` value, e.g. `4G`.
    pub max_memory: Option<String>,
    /// Stop the server after it has been empty this long (`None` = never).
    pub idle_shutdown: Option<Duration>,
    /// Period of the status query.
    pub status_interval: Duration,
    /// Host used for RCON and the status query.
    pub host: String,
    /// RCON retry and timeout tuning.
    pub rcon: RconOptions,
    /// Capacity of each event channel.
    pub channel_capacity: usize,
}

impl Default for SupervisorConfig {
    /// - `server_path = "."`, `jar_file = "server.jar"`, `java = "java"`
    /// - no memory flags, idle shutdown disabled
    /// - `status_interval = 1s`, `host = "localhost"`
    /// - RCON: reconnect every 3s, stop retried every 3s up to 20 times, 10s reply timeout
    /// - `channel_capacity = 256`
    fn default() -> Self {
        Self {
            server_path: PathBuf::from("."),
            jar_file: "server.jar".to_string(),
            java: "java".to_string(),
            min_memory: None,
            max_memory: None,
            idle_shutdown: None,
            status_interval: Duration::from_secs(1),
            host: "localhost".to_string(),
            rcon: RconOptions::default(),
            channel_capacity: 256,
        }
    }
}

impl SupervisorConfig {
    /// Full path of the server jar.
    pub fn jar_path(&self) -> PathBuf {
        self.server_path.join(&self.jar_file)
    }

    /// `[-Xmx<max>]? [-Xms<min>]? -jar <jar> nogui`
    pub fn java_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(5);
        if let Some(max) = &self.max_memory {
            args.push(format!("-Xmx{max}"));
        }
        if let Some(min) = &self.min_memory {
            args.push(format!("-Xms{min}"));
        }
        args.push("-jar".to_string());
        args.push(self.jar_file.clone());
        args.push("nogui".to_string());
        args
    }

    /// Command that starts the server.
    pub fn launch_spec(&self) -> LaunchSpec {
        LaunchSpec {
            program: self.java.clone(),
            args: self.java_args(),
            working_dir: self.server_path.clone(),
        }
    }

    /// Parses the TOML form. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        Ok(file.into())
    }

    /// Reads and parses a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

/// On-disk form of [`SupervisorConfig`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    #[serde(default, deserialize_with = "non_empty")]
    server_path: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    server_jar_file: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    java: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    server_min_memory: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    server_max_memory: Option<String>,
    empty_server_shutdown_minutes: Option<u64>,
    status_interval_ms: Option<u64>,
    #[serde(default, deserialize_with = "non_empty")]
    rcon_host: Option<String>,
    rcon_retry_ms: Option<u64>,
    rcon_timeout_ms: Option<u64>,
    stop_retry_ms: Option<u64>,
    stop_max_attempts: Option<u32>,
    channel_capacity: Option<usize>,
}

impl From<ConfigFile> for SupervisorConfig {
    fn from(f: ConfigFile) -> Self {
        let mut cfg = SupervisorConfig::default();
        if let Some(v) = f.server_path {
            cfg.server_path = PathBuf::from(v);
        }
        if let Some(v) = f.server_jar_file {
            cfg.jar_file = v;
        }
        if let Some(v) = f.java {
            cfg.java = v;
        }
        cfg.min_memory = f.server_min_memory;
        cfg.max_memory = f.server_max_memory;
        cfg.idle_shutdown = f
            .empty_server_shutdown_minutes
            .filter(|m| *m > 0)
            .map(|m| Duration::from_secs(m.saturating_mul(60)));
        if let Some(ms) = f.status_interval_ms {
            cfg.status_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(v) = f.rcon_host {
            cfg.host = v;
        }
        if let Some(ms) = f.rcon_retry_ms {
            cfg.rcon.retry = RetryPolicy::fixed(Duration::from_millis(ms));
        }
        if let Some(ms) = f.rcon_timeout_ms {
            cfg.rcon.response_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = f.stop_retry_ms {
            cfg.rcon.stop_retry.backoff = RetryPolicy::fixed(Duration::from_millis(ms)).backoff;
        }
        if let Some(n) = f.stop_max_attempts {
            cfg.rcon.stop_retry = cfg.rcon.stop_retry.with_max_attempts(n);
        }
        if let Some(n) = f.channel_capacity {
            cfg.channel_capacity = n.max(1);
        }
        cfg
    }
}

/// Empty strings count as unset, like blank keys in a properties file.
fn non_empty<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Option<String> = Option::deserialize(de)?;
    Ok(v.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn java_args_follow_memory_flags() {
        let mut cfg = SupervisorConfig::default();
        assert_eq!(cfg.java_args(), vec!["-jar", "server.jar", "nogui"]);

        cfg.max_memory = Some("4G".into());
        cfg.min_memory = Some("1G".into());
        cfg.jar_file = "paper.jar".into();
        assert_eq!(
            cfg.java_args(),
            vec!["-Xmx4G", "-Xms1G", "-jar", "paper.jar", "nogui"]
        );

        let spec = cfg.launch_spec();
        assert_eq!(spec.program, "java");
        assert_eq!(spec.working_dir, PathBuf::from("."));
    }

    #[test]
    fn toml_overrides_defaults() {
        let cfg = SupervisorConfig::from_toml_str(
            r#"
            server-path = "/srv/mc"
            server-jar-file = ""
            server-max-memory = "2G"
            empty-server-shutdown-minutes = 10
            status-interval-ms = 250
            stop-max-attempts = 5
            stop-retry-ms = 100
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server_path, PathBuf::from("/srv/mc"));
        assert_eq!(cfg.jar_file, "server.jar");
        assert_eq!(cfg.max_memory.as_deref(), Some("2G"));
        assert_eq!(cfg.min_memory, None);
        assert_eq!(cfg.idle_shutdown, Some(Duration::from_secs(600)));
        assert_eq!(cfg.status_interval, Duration::from_millis(250));
        assert_eq!(cfg.rcon.stop_retry.max_attempts, Some(5));
        assert_eq!(cfg.rcon.stop_retry.backoff.next(0), Duration::from_millis(100));
        assert_eq!(cfg.rcon.retry, RetryPolicy::default());
    }

    #[test]
    fn zero_minutes_disables_idle_shutdown() {
        let cfg = SupervisorConfig::from_toml_str("empty-server-shutdown-minutes = 0").unwrap();
        assert_eq!(cfg.idle_shutdown, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SupervisorConfig::from_toml_str("server-pth = \"typo\"").unwrap_err();
        assert_eq!(err.as_label(), "config_parse");
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SupervisorConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert_eq!(err.as_label(), "config_io");
    }
}
