use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default budget for a single `get_output` call (in milliseconds).
pub const DEFAULT_OUTPUT_TIMEOUT_MS: u64 = 100;

/// Configuration applied to a process registry and every child it spawns.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into, strip_option))]
pub struct RegistryConfig {
    /// How long a single `get_output` call waits for the first buffered line
    /// before giving up (in milliseconds)
    #[serde(default = "default_output_timeout_ms")]
    #[builder(default = "default_output_timeout_ms()")]
    pub output_timeout_ms: u64,

    /// Working directory for every spawned child (inherited when unset)
    #[serde(default)]
    #[builder(default)]
    pub working_directory: Option<PathBuf>,

    /// Extra environment variables for every spawned child
    #[serde(default)]
    #[builder(default)]
    #[builder(setter(custom))]
    pub env: HashMap<String, String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            output_timeout_ms: default_output_timeout_ms(),
            working_directory: None,
            env: HashMap::new(),
        }
    }
}

impl RegistryConfig {
    pub fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.output_timeout_ms == 0 {
            return Err(anyhow::anyhow!("output_timeout_ms must be non-zero"));
        }

        if self.output_timeout_ms > 60_000 {
            return Err(anyhow::anyhow!(
                "output_timeout_ms should not exceed 60 seconds"
            ));
        }

        Ok(())
    }

    /// Get the output timeout as Duration
    pub fn output_timeout(&self) -> Duration {
        Duration::from_millis(self.output_timeout_ms)
    }
}

impl RegistryConfigBuilder {
    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());

        self
    }

    pub fn env_multi<T: ToString, I: IntoIterator<Item = (T, T)>>(&mut self, iter: I) -> &mut Self {
        let env = self.env.get_or_insert_with(HashMap::new);
        for (key, value) in iter {
            env.insert(key.to_string(), value.to_string());
        }
        self
    }
}

fn default_output_timeout_ms() -> u64 {
    DEFAULT_OUTPUT_TIMEOUT_MS
}
