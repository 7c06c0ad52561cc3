//! Server configuration from environment.

use std::env;
use std::path::Path;

use airspace_core::PipelineConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    pub database_max_connections: u32,
    /// Lifetime of a cached combined-boundary response
    pub cache_ttl_s: u64,
    pub cache_max_entries: usize,
    /// Optional JSON file overriding merge/align/export tolerances
    pub pipeline_config_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: parse_env("AIRSPACE_PORT", 3000),
            database_path: env::var("AIRSPACE_DB_PATH")
                .unwrap_or_else(|_| "data/airspace.db".to_string()),
            database_max_connections: parse_env("AIRSPACE_DB_MAX_CONNECTIONS", 5),
            cache_ttl_s: parse_env("AIRSPACE_CACHE_TTL_S", 300),
            cache_max_entries: parse_env("AIRSPACE_CACHE_MAX_ENTRIES", 64),
            pipeline_config_path: env::var("AIRSPACE_PIPELINE_CONFIG")
                .ok()
                .filter(|path| !path.trim().is_empty()),
        }
    }

    /// Tolerances for the combine pipeline.
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is
    /// logged and also yields the defaults.
    pub fn pipeline_config(&self) -> PipelineConfig {
        let Some(path) = self.pipeline_config_path.as_deref() else {
            return PipelineConfig::default();
        };
        match load_pipeline_config(Path::new(path)) {
            Ok(config) => {
                tracing::info!("Loaded pipeline tolerances from {}", path);
                config
            }
            Err(err) => {
                tracing::warn!("Using default pipeline tolerances ({}): {}", path, err);
                PipelineConfig::default()
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn load_pipeline_config(path: &Path) -> anyhow::Result<PipelineConfig> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_pipeline_file_falls_back_to_defaults() {
        let mut config = Config::from_env();
        config.pipeline_config_path = Some("/nonexistent/airspace-tolerances.json".to_string());
        assert_eq!(config.pipeline_config(), PipelineConfig::default());
    }

    #[test]
    fn pipeline_file_overrides_tolerances() {
        let path = std::env::temp_dir().join(format!(
            "airspace-tolerances-{}.json",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, r#"{ "merge": { "gap_buffer_m": 25.0 } }"#).unwrap();

        let mut config = Config::from_env();
        config.pipeline_config_path = Some(path.to_string_lossy().to_string());
        let pipeline = config.pipeline_config();
        let _ = std::fs::remove_file(&path);

        assert_eq!(pipeline.merge.gap_buffer_m, 25.0);
        assert_eq!(pipeline.align, PipelineConfig::default().align);
    }
}
