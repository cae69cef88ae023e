//! MySQL score store backed by an `sqlx` connection pool.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use tracing::debug;

use super::{is_valid_table_name, QueryKind, ScoreRow, ScoreStore};
use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// `approved` value of a qualified beatmap.
const APPROVED_QUALIFIED: i64 = 3;

/// Score store issuing queries against the osu! MySQL schema.
#[derive(Debug, Clone)]
pub struct MySqlScoreStore {
    pool: MySqlPool,
    beatmaps_table: String,
    point_query_timeout: Duration,
    scan_timeout: Duration,
}

impl MySqlScoreStore {
    /// Opens a pool to the configured database.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .max_lifetime(Duration::from_secs(300))
            .connect(&config.url)
            .await?;
        Self::from_pool(pool, config)
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: MySqlPool, config: &StoreConfig) -> Result<Self> {
        check_table(&config.beatmaps_table)?;
        Ok(Self {
            pool,
            beatmaps_table: config.beatmaps_table.clone(),
            point_query_timeout: config.point_query_timeout(),
            scan_timeout: config.scan_timeout(),
        })
    }

    /// Runs a query under the deadline of its kind.
    async fn bounded<T, F>(&self, kind: QueryKind, query: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>> + Send,
    {
        let timeout = match kind {
            QueryKind::Scan => self.scan_timeout,
            _ => self.point_query_timeout,
        };
        match tokio::time::timeout(timeout, query).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::StoreTimeout { kind, timeout }),
        }
    }

    async fn count(
        &self,
        kind: QueryKind,
        sql: String,
        beatmap_id: u32,
        above: Option<u32>,
    ) -> Result<u64> {
        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(beatmap_id);
        if let Some(score) = above {
            query = query.bind(score);
        }
        let count = self.bounded(kind, query.fetch_one(&self.pool)).await?;
        u64::try_from(count).map_err(|_| Error::Store(format!("negative count {count}")))
    }
}

fn check_table(table: &str) -> Result<()> {
    if is_valid_table_name(table) {
        Ok(())
    } else {
        Err(Error::Config(format!("'{table}' is not a valid table name")))
    }
}

fn count_sql(projection: &str, table: &str, above: Option<u32>) -> String {
    let filter = if above.is_some() { " AND score > ?" } else { "" };
    format!("SELECT {projection} FROM {table} WHERE beatmap_id = ? AND hidden = 0{filter}")
}

#[async_trait]
impl ScoreStore for MySqlScoreStore {
    async fn count_scores(
        &self,
        table: &str,
        beatmap_id: u32,
        above: Option<u32>,
    ) -> Result<u64> {
        check_table(table)?;
        let sql = count_sql("COUNT(*)", table, above);
        self.count(QueryKind::Count, sql, beatmap_id, above).await
    }

    async fn count_distinct_users(
        &self,
        table: &str,
        beatmap_id: u32,
        above: Option<u32>,
    ) -> Result<u64> {
        check_table(table)?;
        let sql = count_sql("COUNT(DISTINCT user_id)", table, above);
        self.count(QueryKind::DistinctCount, sql, beatmap_id, above).await
    }

    async fn fetch_scores(&self, table: &str, beatmap_id: u32) -> Result<Vec<ScoreRow>> {
        check_table(table)?;
        let sql = format!(
            "SELECT CAST(user_id AS SIGNED), CAST(score AS SIGNED) FROM {table} \
             WHERE beatmap_id = ? AND hidden = 0"
        );
        let rows: Vec<(i64, i64)> = self
            .bounded(
                QueryKind::Scan,
                sqlx::query_as(&sql).bind(beatmap_id).fetch_all(&self.pool),
            )
            .await?;
        debug!(table, beatmap_id, rows = rows.len(), "fetched score rows");

        rows.into_iter()
            .map(|(user_id, score)| {
                Ok(ScoreRow {
                    user_id: u32::try_from(user_id)
                        .map_err(|_| Error::Store(format!("user_id {user_id} out of range")))?,
                    score: u32::try_from(score)
                        .map_err(|_| Error::Store(format!("score {score} out of range")))?,
                })
            })
            .collect()
    }

    async fn is_qualified(&self, beatmap_id: u32) -> Result<bool> {
        let sql = format!(
            "SELECT CAST(approved AS SIGNED) FROM {} WHERE beatmap_id = ?",
            self.beatmaps_table
        );
        let approved: Option<i64> = self
            .bounded(
                QueryKind::Qualification,
                sqlx::query_scalar(&sql)
                    .bind(beatmap_id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(approved == Some(APPROVED_QUALIFIED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_sql_without_filter() {
        assert_eq!(
            count_sql("COUNT(*)", "osu_scores_high", None),
            "SELECT COUNT(*) FROM osu_scores_high WHERE beatmap_id = ? AND hidden = 0"
        );
    }

    #[test]
    fn test_count_sql_with_score_filter() {
        assert_eq!(
            count_sql("COUNT(DISTINCT user_id)", "osu_scores_mania_high", Some(5)),
            "SELECT COUNT(DISTINCT user_id) FROM osu_scores_mania_high \
             WHERE beatmap_id = ? AND hidden = 0 AND score > ?"
        );
    }

    #[test]
    fn test_check_table_rejects_injection() {
        assert!(check_table("osu_scores_high").is_ok());
        assert!(matches!(
            check_table("x; DELETE FROM y"),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_from_pool_rejects_invalid_beatmaps_table() {
        let config = StoreConfig {
            beatmaps_table: "bad name".to_string(),
            ..StoreConfig::default()
        };
        let pool = MySqlPoolOptions::new()
            .connect_lazy(&config.url)
            .expect("lazy pool");

        assert!(MySqlScoreStore::from_pool(pool, &config).is_err());
    }
}
