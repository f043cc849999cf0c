use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    pub dedup: DedupConfig,
}

/// Tunable knobs for the deduplication engine. The defaults reproduce the
/// reference behavior; none of them is derived from an analytical model, so
/// every one is exposed rather than hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Two normalized messages at or above this score are the same event.
    pub similarity_threshold: f64,
    /// Two sources above this score count as the same call site.
    pub source_similarity_threshold: f64,
    /// Inputs at or above this size take the parallel path.
    pub parallel_cutoff: usize,
    /// Level groups below this size are not worth dispatching to a task.
    pub inline_cutoff: usize,
    /// Sequential path: sweep the normalized-message cache every N records.
    pub cache_eviction_interval: usize,
}

impl SiftConfig {
    /// Load configuration from file or environment variables.
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = std::env::var("LOGSIFT_CONFIG_FILE")
            .unwrap_or_else(|_| "/etc/logsift/logsift.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!(
                "Config file not found at {}, using environment variables",
                config_path
            );
            Self::from_env()
        };

        // Environment variables override file config
        if let Some(threshold) = env_parse("LOGSIFT_SIMILARITY_THRESHOLD") {
            config.dedup.similarity_threshold = threshold;
        }
        if let Some(threshold) = env_parse("LOGSIFT_SOURCE_SIMILARITY_THRESHOLD") {
            config.dedup.source_similarity_threshold = threshold;
        }
        if let Some(cutoff) = env_parse("LOGSIFT_PARALLEL_CUTOFF") {
            config.dedup.parallel_cutoff = cutoff;
        }
        if let Some(cutoff) = env_parse("LOGSIFT_INLINE_CUTOFF") {
            config.dedup.inline_cutoff = cutoff;
        }

        Ok(config)
    }

    /// Load configuration from TOML file.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: SiftConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = DedupConfig::default();
        Self {
            dedup: DedupConfig {
                similarity_threshold: env_parse("LOGSIFT_SIMILARITY_THRESHOLD")
                    .unwrap_or(defaults.similarity_threshold),
                source_similarity_threshold: env_parse("LOGSIFT_SOURCE_SIMILARITY_THRESHOLD")
                    .unwrap_or(defaults.source_similarity_threshold),
                parallel_cutoff: env_parse("LOGSIFT_PARALLEL_CUTOFF")
                    .unwrap_or(defaults.parallel_cutoff),
                inline_cutoff: env_parse("LOGSIFT_INLINE_CUTOFF")
                    .unwrap_or(defaults.inline_cutoff),
                cache_eviction_interval: env_parse("LOGSIFT_CACHE_EVICTION_INTERVAL")
                    .unwrap_or(defaults.cache_eviction_interval),
            },
        }
    }

    /// Validate that configuration values are sane.
    pub fn validate(&self) -> Result<(), String> {
        self.dedup.validate()
    }
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            dedup: DedupConfig::default(),
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) || self.similarity_threshold == 0.0 {
            return Err("similarity_threshold must be in (0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.source_similarity_threshold)
            || self.source_similarity_threshold == 0.0
        {
            return Err("source_similarity_threshold must be in (0, 1]".to_string());
        }
        if self.parallel_cutoff == 0 {
            return Err("parallel_cutoff must be > 0".to_string());
        }
        if self.inline_cutoff == 0 {
            return Err("inline_cutoff must be > 0".to_string());
        }
        if self.cache_eviction_interval == 0 {
            return Err("cache_eviction_interval must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            source_similarity_threshold: 0.7,
            parallel_cutoff: 1000,
            inline_cutoff: 10,
            cache_eviction_interval: 100,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}
