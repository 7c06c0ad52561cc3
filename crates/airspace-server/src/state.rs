//! Shared application state.

use airspace_core::{combine, CombinedBoundaries, PipelineConfig};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{ResponseCache, SingleFlight, TtlCache};
use crate::config::Config;
use crate::error::ApiError;
use crate::persistence::{splits, Database};

/// Pipeline output for one split, as cached between requests.
#[derive(Debug)]
pub struct CombinedSplit {
    pub name: String,
    pub boundaries: CombinedBoundaries,
}

pub struct AppState {
    db: Database,
    config: Config,
    pipeline: PipelineConfig,
    combined_cache: Arc<dyn ResponseCache<String, Arc<CombinedSplit>>>,
    in_flight: SingleFlight<String, Arc<CombinedSplit>>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let pipeline = config.pipeline_config();
        let combined_cache: Arc<TtlCache<String, Arc<CombinedSplit>>> =
            Arc::new(TtlCache::new(config.cache_max_entries));
        Self::with_cache(db, config, pipeline, combined_cache)
    }

    pub fn with_cache(
        db: Database,
        config: Config,
        pipeline: PipelineConfig,
        combined_cache: Arc<dyn ResponseCache<String, Arc<CombinedSplit>>>,
    ) -> Self {
        Self {
            db,
            config,
            pipeline,
            combined_cache,
            in_flight: SingleFlight::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Merged and aligned boundaries for a split.
    ///
    /// Served from cache when fresh; otherwise computed once no matter how
    /// many requests arrive while the computation runs.
    pub async fn combined_split(&self, split_id: &str) -> Result<Arc<CombinedSplit>, ApiError> {
        let key = split_id.to_string();
        if let Some(hit) = self.combined_cache.get(&key) {
            tracing::debug!(split_id, "Combined boundaries served from cache");
            return Ok(hit);
        }

        let pool = self.pool().clone();
        let pipeline = self.pipeline.clone();
        let cache = self.combined_cache.clone();
        let ttl = Duration::from_secs(self.config.cache_ttl_s);
        let split_id = key.clone();

        self.in_flight
            .run(key, move || async move {
                let rows = splits::load_split_rows(&pool, &split_id).await?;
                let detail = splits::assemble_split(rows)
                    .ok_or_else(|| ApiError::NotFound("Split not found".to_string()))?;
                let areas = splits::area_polygons(&detail);
                let name = detail.split.name.clone();

                let boundaries = tokio::task::spawn_blocking(move || combine(areas, &pipeline))
                    .await
                    .map_err(|err| ApiError::Internal(format!("Boundary pipeline failed: {err}")))?;

                tracing::info!(
                    split_id = %split_id,
                    groups = boundaries.groups.len(),
                    tags = ?boundaries.tags(),
                    shared_pairs = boundaries.report.pairs_sharing,
                    "Computed combined boundaries"
                );

                let combined = Arc::new(CombinedSplit { name, boundaries });
                cache.put(split_id, combined.clone(), ttl);
                Ok(combined)
            })
            .await
    }

    /// Forget cached boundaries after a split changes.
    pub fn invalidate_split(&self, split_id: &str) {
        self.combined_cache.invalidate(&split_id.to_string());
    }
}
