use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub http_client: reqwest::Client,
    /// Per-tenant history read model, TTL-bounded and invalidated on
    /// billing/ledger writes.
    pub history_cache: Cache<Uuid, serde_json::Value>,
    s3_client: Arc<OnceCell<aws_sdk_s3::Client>>,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db_pool = match &config.database_url {
            Some(url) => Some(
                PgPoolOptions::new()
                    .max_connections(config.db_pool_max_connections)
                    .min_connections(config.db_pool_min_connections)
                    .acquire_timeout(Duration::from_secs(config.db_pool_acquire_timeout_seconds))
                    .connect_lazy(url)?,
            ),
            None => None,
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        let history_cache = Cache::builder()
            .time_to_live(Duration::from_secs(config.history_cache_ttl_seconds))
            .max_capacity(config.history_cache_max_entries)
            .build();

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            http_client,
            history_cache,
            s3_client: Arc::new(OnceCell::new()),
        })
    }

    pub fn db_pool(&self) -> AppResult<&PgPool> {
        self.db_pool.as_ref().ok_or_else(|| {
            AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
        })
    }

    pub async fn s3_client(&self) -> &aws_sdk_s3::Client {
        self.s3_client
            .get_or_init(|| async {
                let aws_config =
                    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                aws_sdk_s3::Client::new(&aws_config)
            })
            .await
    }
}
