//! Redis lock service using a bb8 connection pool.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, Script};

use crate::config::settings::RedisConfig;
use crate::lock::{LockError, LockService};

type RedisPool = Pool<Client>;

const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis-backed lock service.
pub struct RedisLockService {
    pool: RedisPool,
    compare_and_delete: Script,
}

impl RedisLockService {
    pub async fn new(config: &RedisConfig) -> Result<Self, LockError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| LockError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_secs(config.connection_timeout))
            .build(client)
            .await
            .map_err(|e| LockError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
        })
    }

    async fn get_conn(&self) -> Result<PooledConnection<'_, Client>, LockError> {
        self.pool
            .get()
            .await
            .map_err(|e| LockError::Connection(e.to_string()))
    }
}

fn op_err(e: RedisError) -> LockError {
    LockError::Operation(e.to_string())
}

#[async_trait]
impl LockService for RedisLockService {
    async fn set_if_absent(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool, LockError> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;

        // SET key value NX PX ttl replies OK or nil
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(conn_ref)
            .await
            .map_err(op_err)?;

        Ok(reply.is_some())
    }

    async fn increment(&self, key: &str) -> Result<i64, LockError> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref.incr(key, 1i64).await.map_err(op_err)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, LockError> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let deleted: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(conn_ref)
            .await
            .map_err(op_err)?;
        Ok(deleted > 0)
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, LockError> {
        let mut conn = self.get_conn().await?;
        let pattern = format!("{}*", prefix);

        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(conn_ref)
            .await
            .map_err(op_err)?;

        if keys.is_empty() {
            return Ok(0);
        }

        let count = keys.len();
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref.del::<_, ()>(keys).await.map_err(op_err)?;
        Ok(count)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LockError> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref.get(key).await.map_err(op_err)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), LockError> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref.set::<_, _, ()>(key, value).await.map_err(op_err)
    }

    async fn delete(&self, key: &str) -> Result<(), LockError> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref.del::<_, ()>(key).await.map_err(op_err)
    }
}
