use crate::{db::DbClient, errors::ApiError, Result, CONFIG};
use serde::Serialize;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};

const LAST_RUN_CACHE_KEY: &str = "housekeeping:last_run";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Health of the housekeeping job as reported by `/health`
#[derive(Debug, Clone, Serialize)]
pub struct BackgroundJobHealth {
    pub status: String,
    pub last_run: Option<chrono::NaiveDateTime>,
    pub message: String,
}

/// What one housekeeping pass cleaned up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    pub sessions_purged: usize,
    pub bookings_expired: usize,
}

/// Background job manager for periodic housekeeping
pub struct BackgroundJobManager {
    db_client: DbClient,
}

impl BackgroundJobManager {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    pub async fn get_health_status(&self) -> BackgroundJobHealth {
        match self.get_last_run().await {
            Ok(last_run) => {
                let since = chrono::Utc::now().naive_utc() - last_run;
                let interval = CONFIG.housekeeping_interval_seconds;
                health_from_elapsed(last_run, since.num_seconds(), interval)
            }
            Err(_) => BackgroundJobHealth {
                status: "unknown".to_string(),
                last_run: None,
                message: "Housekeeping has not reported a run yet".to_string(),
            },
        }
    }

    async fn store_last_run(&self, at: chrono::NaiveDateTime) -> Result<()> {
        // Keep the marker long enough to report an overdue job as inactive
        let ttl = CONFIG.housekeeping_interval_seconds.saturating_mul(10).max(60);
        self.db_client
            .set_cache(LAST_RUN_CACHE_KEY, &at.format(TIMESTAMP_FORMAT).to_string(), ttl)
            .await
    }

    async fn get_last_run(&self) -> Result<chrono::NaiveDateTime> {
        let raw = self.db_client.get_cache(LAST_RUN_CACHE_KEY).await?;
        chrono::NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map_err(|e| ApiError::Custom(format!("Failed to parse timestamp: {e}")))
    }

    /// Runs one pass: purges expired sessions and expires stale pending bookings
    pub async fn run_housekeeping(&self) -> Result<HousekeepingReport> {
        let sessions_purged = self.db_client.purge_expired_sessions().await?;
        let bookings_expired = self.db_client.expire_stale_bookings().await?;
        Ok(HousekeepingReport {
            sessions_purged,
            bookings_expired,
        })
    }

    pub async fn start_all_jobs(&self) {
        info!("Starting background job manager");

        let db_client = self.db_client.clone();
        tokio::spawn(async move {
            housekeeping_job(db_client).await;
        });

        info!("All background jobs started successfully");
    }
}

fn health_from_elapsed(
    last_run: chrono::NaiveDateTime,
    elapsed_seconds: i64,
    interval_seconds: u64,
) -> BackgroundJobHealth {
    if elapsed_seconds > (interval_seconds as i64).saturating_mul(2) {
        BackgroundJobHealth {
            status: "inactive".to_string(),
            last_run: Some(last_run),
            message: format!(
                "Last housekeeping run was {elapsed_seconds} seconds ago, expected interval is {interval_seconds} seconds"
            ),
        }
    } else {
        BackgroundJobHealth {
            status: "active".to_string(),
            last_run: Some(last_run),
            message: "Background jobs are running normally".to_string(),
        }
    }
}

async fn housekeeping_job(db_client: DbClient) {
    let mut interval = time::interval(Duration::from_secs(CONFIG.housekeeping_interval_seconds));
    let mut consecutive_errors = 0u32;
    let manager = BackgroundJobManager::new(db_client);

    info!(
        "Housekeeping job started with interval: {} seconds",
        CONFIG.housekeeping_interval_seconds
    );

    loop {
        interval.tick().await;

        let started = std::time::Instant::now();
        match manager.run_housekeeping().await {
            Ok(report) => {
                info!(
                    "Housekeeping completed in {:?}: {} sessions purged, {} bookings expired",
                    started.elapsed(),
                    report.sessions_purged,
                    report.bookings_expired
                );
                consecutive_errors = 0;
                if let Err(e) = manager.store_last_run(chrono::Utc::now().naive_utc()).await {
                    warn!("Failed to store housekeeping run time: {:?}", e);
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                error!(
                    "Housekeeping failed (attempt {}/{}): {:?}",
                    consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                );
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    error!("Too many consecutive housekeeping failures, backing off");
                    time::sleep(Duration::from_secs(300)).await;
                    consecutive_errors = 0;
                }
            }
        }
    }
}
