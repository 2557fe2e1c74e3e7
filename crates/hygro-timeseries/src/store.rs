use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hygro_core::{HygroError, Record, Result};
use sea_orm::{
    ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, QueryResult, Statement,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// 时序数据存储 trait
///
/// `upsert` 以记录时间戳为键：重复写入同一条记录不改变最终存储状态，
/// 因此写入顺序与最终结果无关。
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// 插入或覆盖同一时间戳的记录
    async fn upsert(&self, record: &Record) -> Result<()>;

    /// 存储名称
    fn name(&self) -> &str;
}

/// TimescaleDB 存储实现
///
/// 以 `(measurement, time)` 为主键，通过 `ON CONFLICT DO UPDATE` 实现幂等写入。
/// 同样可以运行在 SQLite 上（用于测试和本地演示）。
pub struct TimescaleStore {
    db: Arc<DatabaseConnection>,
    table: String,
    measurement: String,
}

impl TimescaleStore {
    /// 连接数据库并确保表结构存在
    pub async fn connect(database_url: &str, table: &str, measurement: &str) -> Result<Self> {
        let db = Database::connect(database_url)
            .await
            .map_err(|e| HygroError::store_write(format!("connect failed: {}", e)))?;

        info!(table = %table, measurement = %measurement, "Connected to TimescaleDB");

        let store = Self::from_connection(db, table, measurement)?;
        store.ensure_schema().await?;
        Ok(store)
    }

    /// 使用已有连接创建存储
    pub fn from_connection(
        db: DatabaseConnection,
        table: &str,
        measurement: &str,
    ) -> Result<Self> {
        if table.is_empty()
            || !table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(HygroError::config(format!("invalid table name '{}'", table)));
        }

        Ok(Self {
            db: Arc::new(db),
            table: table.to_string(),
            measurement: measurement.to_string(),
        })
    }

    /// 获取数据库连接
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn backend(&self) -> DatabaseBackend {
        self.db.get_database_backend()
    }

    /// 创建记录表（已存在时跳过）
    pub async fn ensure_schema(&self) -> Result<()> {
        let sql = match self.backend() {
            DatabaseBackend::Postgres => format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    time TIMESTAMPTZ NOT NULL,
                    measurement TEXT NOT NULL,
                    tags JSONB NOT NULL,
                    fields JSONB NOT NULL,
                    PRIMARY KEY (measurement, time)
                )
                "#,
                self.table
            ),
            _ => format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    time TEXT NOT NULL,
                    measurement TEXT NOT NULL,
                    tags TEXT NOT NULL,
                    fields TEXT NOT NULL,
                    PRIMARY KEY (measurement, time)
                )
                "#,
                self.table
            ),
        };

        self.db
            .execute(Statement::from_string(self.backend(), sql))
            .await
            .map_err(|e| HygroError::store_write(format!("schema setup failed: {}", e)))?;

        Ok(())
    }

    /// 已存储的记录数
    pub async fn count(&self) -> Result<u64> {
        let (sql, values) = match self.backend() {
            DatabaseBackend::Postgres => (
                format!("SELECT COUNT(*) AS n FROM {} WHERE measurement = $1", self.table),
                vec![self.measurement.clone().into()],
            ),
            _ => (
                format!("SELECT COUNT(*) AS n FROM {} WHERE measurement = ?", self.table),
                vec![self.measurement.clone().into()],
            ),
        };

        let row = self
            .db
            .query_one(Statement::from_sql_and_values(self.backend(), sql, values))
            .await
            .map_err(|e| HygroError::store_write(format!("count failed: {}", e)))?;

        let n: i64 = match row {
            Some(row) => row
                .try_get("", "n")
                .map_err(|e| HygroError::store_write(format!("count failed: {}", e)))?,
            None => 0,
        };

        Ok(n.max(0) as u64)
    }

    /// 查询最新一条记录
    pub async fn latest(&self) -> Result<Option<Record>> {
        let sql = match self.backend() {
            DatabaseBackend::Postgres => format!(
                "SELECT time, tags::text AS tags, fields::text AS fields FROM {} \
                 WHERE measurement = $1 ORDER BY time DESC LIMIT 1",
                self.table
            ),
            _ => format!(
                "SELECT time, tags, fields FROM {} WHERE measurement = ? ORDER BY time DESC LIMIT 1",
                self.table
            ),
        };

        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                self.backend(),
                sql,
                vec![self.measurement.clone().into()],
            ))
            .await
            .map_err(|e| HygroError::source_unavailable(format!("query failed: {}", e)))?;

        row.map(|row| record_from_row(&row)).transpose()
    }
}

fn record_from_row(row: &QueryResult) -> Result<Record> {
    let timestamp: DateTime<Utc> = row
        .try_get("", "time")
        .map_err(|e| HygroError::parse(format!("bad time column: {}", e)))?;
    let tags: String = row
        .try_get("", "tags")
        .map_err(|e| HygroError::parse(format!("bad tags column: {}", e)))?;
    let fields: String = row
        .try_get("", "fields")
        .map_err(|e| HygroError::parse(format!("bad fields column: {}", e)))?;

    Ok(Record {
        timestamp,
        tags: serde_json::from_str::<BTreeMap<String, String>>(&tags)?,
        fields: serde_json::from_str::<BTreeMap<String, Option<f64>>>(&fields)?,
    })
}

#[async_trait]
impl TimeSeriesStore for TimescaleStore {
    async fn upsert(&self, record: &Record) -> Result<()> {
        let sql = match self.backend() {
            DatabaseBackend::Postgres => format!(
                r#"
                INSERT INTO {} (time, measurement, tags, fields)
                VALUES ($1, $2, $3::jsonb, $4::jsonb)
                ON CONFLICT (measurement, time)
                DO UPDATE SET tags = EXCLUDED.tags, fields = EXCLUDED.fields
                "#,
                self.table
            ),
            _ => format!(
                r#"
                INSERT INTO {} (time, measurement, tags, fields)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (measurement, time)
                DO UPDATE SET tags = excluded.tags, fields = excluded.fields
                "#,
                self.table
            ),
        };

        let stmt = Statement::from_sql_and_values(
            self.backend(),
            sql,
            vec![
                record.timestamp.into(),
                self.measurement.clone().into(),
                serde_json::to_string(&record.tags)?.into(),
                serde_json::to_string(&record.fields)?.into(),
            ],
        );

        self.db
            .execute(stmt)
            .await
            .map_err(|e| HygroError::store_write(e.to_string()))?;

        debug!(
            timestamp = %record.timestamp,
            measurement = %self.measurement,
            "Record upserted to TimescaleDB"
        );

        Ok(())
    }

    fn name(&self) -> &str {
        "timescale"
    }
}
