//! Backend configuration.

use std::path::Path;
use std::time::Duration;

use crate::error::{NssError, Result};

/// Default configuration file read by the NSS entry points.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nss-etcd.conf";

const DEFAULT_PROGRAM: &str = "etcdctl";
const DEFAULT_KEY_PREFIX: &str = "/hosts/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How the backend CLI is invoked for a lookup.
///
/// The backend is run as `program args... <key>`, where the key is
/// [`key_prefix`](Self::key_prefix) followed by the hostname.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use nss_etcd::BackendConfig;
///
/// let config = BackendConfig::default()
///     .with_key_prefix("/dns/")
///     .with_timeout(Duration::from_millis(500));
///
/// assert_eq!(config.program, "etcdctl");
/// assert_eq!(config.key_for("db1"), "/dns/db1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Executable looked up on `PATH` (or an absolute path).
    pub program: String,

    /// Arguments placed before the key.
    pub args: Vec<String>,

    /// Namespace prepended to every hostname.
    pub key_prefix: String,

    /// Upper bound on the whole backend call: spawn, read and reap.
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: vec!["get".to_string()],
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl BackendConfig {
    /// Overrides the backend executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Overrides the arguments placed before the key.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the key namespace.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Overrides the backend deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the store key for `name`.
    #[must_use]
    pub fn key_for(&self, name: &str) -> String {
        format!("{}{name}", self.key_prefix)
    }

    /// Loads the configuration file at `path`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`NssError::Io`] if the file exists but cannot be read, or
    /// [`NssError::InvalidConfig`] if a value cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parses the line-oriented config format.
    ///
    /// ```text
    /// # comment
    /// command /usr/bin/etcdctl
    /// args get --print-value-only
    /// prefix /hosts/
    /// timeout_ms 2000
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`NssError::InvalidConfig`] for empty or unparseable values.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line
                .split_once(char::is_whitespace)
                .map_or((line, ""), |(k, v)| (k, v.trim()));

            match key {
                "command" => config.program = required(key, value)?.to_string(),
                "args" => config.args = value.split_whitespace().map(str::to_string).collect(),
                "prefix" => config.key_prefix = required(key, value)?.to_string(),
                "timeout_ms" => {
                    let ms: u64 = required(key, value)?.parse().map_err(|_| {
                        NssError::InvalidConfig(format!("timeout_ms is not a number: {value}"))
                    })?;
                    if ms == 0 {
                        return Err(NssError::InvalidConfig("timeout_ms must be positive".into()));
                    }
                    config.timeout = Duration::from_millis(ms);
                }
                other => tracing::warn!(key = %other, "Ignoring unknown config key"),
            }
        }

        Ok(config)
    }
}

fn required<'a>(key: &str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() {
        return Err(NssError::InvalidConfig(format!("{key} needs a value")));
    }
    Ok(value)
}
