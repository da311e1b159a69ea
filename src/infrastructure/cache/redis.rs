//! Redis-backed tariff cache
//!
//! Entries are JSON strings under `tariff-data:{id}`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{debug, info};

use crate::application::ports::{CacheError, TariffCache};
use crate::domain::{CachedTariff, TariffPatch};

const KEY_PREFIX: &str = "tariff-data";

fn key(id: i32) -> String {
    format!("{}:{}", KEY_PREFIX, id)
}

/// `SET key value XX KEEPTTL`: only overwrites an existing entry and keeps
/// its remaining expiry. A key deleted or expired since it was read stays
/// absent.
fn merge_write_cmd(id: i32, encoded: String) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key(id)).arg(encoded).arg("XX").arg("KEEPTTL");
    cmd
}

fn backend_err(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.to_string())
}

pub struct RedisTariffCache {
    conn: ConnectionManager,
}

impl RedisTariffCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(backend_err)?;
        let conn = client.get_connection_manager().await.map_err(backend_err)?;
        info!("Connected to Redis cache");
        Ok(Self { conn })
    }

    fn encode(value: &CachedTariff) -> Result<String, CacheError> {
        serde_json::to_string(value).map_err(|e| CacheError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TariffCache for RedisTariffCache {
    async fn get(&self, id: i32) -> Result<Option<CachedTariff>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(key(id))
            .query_async(&mut conn)
            .await
            .map_err(backend_err)?;

        raw.map(|s| serde_json::from_str(&s).map_err(|e| CacheError::Decode(e.to_string())))
            .transpose()
    }

    async fn set(
        &self,
        id: i32,
        value: &CachedTariff,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key(id)).arg(Self::encode(value)?);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        let _: () = cmd.query_async(&mut conn).await.map_err(backend_err)?;
        Ok(())
    }

    async fn merge_update(&self, id: i32, patch: &TariffPatch) -> Result<(), CacheError> {
        let Some(mut entry) = self.get(id).await? else {
            return Ok(());
        };
        patch.apply_to(&mut entry, Utc::now());

        let mut conn = self.conn.clone();
        let written: Option<String> = merge_write_cmd(id, Self::encode(&entry)?)
            .query_async(&mut conn)
            .await
            .map_err(backend_err)?;
        if written.is_none() {
            debug!(tariff_id = id, "Cache entry vanished before merge, left absent");
        }
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL")
            .arg(key(id))
            .query_async(&mut conn)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(backend_err)?;
        Ok(())
    }
}
