use crate::config::DatabaseConfig;
use log::LevelFilter;
use rocket::fairing::AdHoc;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;

const CREATE_SESSIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS sessions (
        device_id TEXT PRIMARY KEY,
        ip TEXT,
        ua TEXT,
        started_at TIMESTAMPTZ DEFAULT now(),
        finished_at TIMESTAMPTZ,
        score INT,
        reward TEXT,
        quiz JSONB,
        end_time TIMESTAMPTZ,
        checked_in BOOLEAN DEFAULT false,
        checkin_link TEXT
    )
"#;

// Tables created before late check-in existed lack this column.
const ADD_CHECKIN_LINK_COLUMN: &str = "ALTER TABLE sessions ADD COLUMN IF NOT EXISTS checkin_link TEXT";

pub async fn init_pool(db_config: &DatabaseConfig, slow_query_ms: u64) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(&db_config.url)?.log_slow_statements(LevelFilter::Warn, Duration::from_millis(slow_query_ms));

    PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.acquire_timeout))
        .idle_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(options)
        .await
}

pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_SESSIONS_TABLE).execute(pool).await?;
    sqlx::query(ADD_CHECKIN_LINK_COLUMN).execute(pool).await?;
    Ok(())
}

/// Connects the pool and creates the schema; either failure aborts launch.
pub fn stage_db(db_config: DatabaseConfig, slow_query_ms: u64) -> AdHoc {
    AdHoc::try_on_ignite("Postgres (sqlx)", move |rocket| async move {
        let pool = match init_pool(&db_config, slow_query_ms).await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::error!("Failed to initialize database pool: {}", e);
                return Err(rocket);
            }
        };
        tracing::info!("Database pool initialized successfully");

        match init_schema(&pool).await {
            Ok(()) => {
                tracing::info!("Schema initialized");
                Ok(rocket.manage(pool))
            }
            Err(e) => {
                tracing::error!("Failed to init schema: {}", e);
                Err(rocket)
            }
        }
    })
}
