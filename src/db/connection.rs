use diesel_async::pooled_connection::deadpool::{self, PoolError};
use diesel_async::pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager};
use diesel_async::AsyncPgConnection;
use redis::aio::MultiplexedConnection;
use std::sync::Arc;
use tokio::sync::Mutex;

const DEFAULT_POOL_SIZE: usize = 20;

#[derive(Clone)]
pub struct DbClient {
    pub db_pool: Pool<AsyncPgConnection>,
    pub async_redis_conn: Arc<Mutex<Option<MultiplexedConnection>>>,
    redis_url: String,
}

impl DbClient {
    pub fn new(db_url: &str, redis_url: &str) -> Self {
        Self::with_config(db_url, redis_url, DEFAULT_POOL_SIZE)
    }

    /// Builds the pool lazily: no connection is opened until the first query
    pub fn with_config(db_url: &str, redis_url: &str, pool_size: usize) -> Self {
        let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
        let postgres_pool = Pool::builder(config)
            .max_size(pool_size)
            .build()
            .expect("Failed to create DB Pool");

        Self {
            db_pool: postgres_pool,
            async_redis_conn: Arc::new(Mutex::new(None)),
            redis_url: redis_url.to_string(),
        }
    }

    /// Get a connection from the Postgres pool
    pub async fn get_db_conn(&self) -> Result<deadpool::Object<AsyncPgConnection>, PoolError> {
        self.db_pool.get().await
    }

    /// Get async Redis connection (creates one if it doesn't exist)
    pub async fn get_async_redis_conn(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        let mut conn_guard = self.async_redis_conn.lock().await;

        if let Some(conn) = conn_guard.as_ref() {
            // Multiplexed connections are designed to be cloned
            return Ok(conn.clone());
        }

        let client = redis::Client::open(self.redis_url.as_str())?;
        let multiplexed_conn = client.get_multiplexed_async_connection().await?;
        *conn_guard = Some(multiplexed_conn.clone());
        Ok(multiplexed_conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL and TEST_REDIS_URL"]
    async fn test_db_conn_healthcheck() {
        dotenv::dotenv().ok();
        let db_url = std::env::var("TEST_DATABASE_URL").unwrap();
        let redis_url = std::env::var("TEST_REDIS_URL").unwrap();
        let client = DbClient::new(&db_url, &redis_url);

        let postgres_conn = client.get_db_conn().await;
        let redis_conn = client.get_async_redis_conn().await;

        assert!(postgres_conn.is_ok());
        assert!(redis_conn.is_ok());
    }

    #[tokio::test]
    async fn test_pool_is_lazy() {
        let client = DbClient::new("postgres://nobody@127.0.0.1:1/none", "redis://127.0.0.1:1");
        assert_eq!(client.db_pool.status().size, 0);
    }
}
