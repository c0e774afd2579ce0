//! Execution settings shared by device contexts and executors.
use std::fs::File;
use std::path::Path;

/// Errors while loading a [Config].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Knobs of the reference device contexts.
///
/// Every field has a default, so a partial JSON document is a valid config:
///
/// ```
/// use reverse_op::Config;
///
/// let config = Config::from_json(r#"{ "memory_limit": 1024 }"#).unwrap();
/// assert_eq!(config.memory_limit, Some(1024));
/// assert_eq!(config.parallel_threshold, Config::default().parallel_threshold);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Element count from which the host driver spreads work over the rayon pool.
    pub parallel_threshold: usize,
    /// Upper bound in bytes for a single output allocation. `None` means unbounded.
    pub memory_limit: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            parallel_threshold: 1 << 16,
            memory_limit: None,
        }
    }
}

impl Config {
    pub fn from_json(s: &str) -> Result<Config, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let f = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(f)?)
    }
}
