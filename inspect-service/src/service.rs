//! 数据库巡检服务模块

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use common::errors::AppResult;
use common::models::connection::ConfigItem;
use common::models::query::QueryResult;
use common::models::schema::{DatabaseInfo, DatabaseStats, TableCount, TableDescription};
use common::utils::QueryGate;

use crate::adapter::{LiveConnection, TableRef};
use crate::registry::ConnectionRegistry;

/// 巡检服务 Trait
#[async_trait]
pub trait InspectServiceTrait: Send + Sync {
    /// 列出所有配置项（不含密码）
    async fn list_configs(&self) -> Vec<ConfigItem>;

    /// 列出数据库中的所有表
    async fn list_tables(&self, config: &str) -> AppResult<Vec<String>>;

    /// 获取表结构
    async fn describe_table(&self, table: &str, config: &str) -> AppResult<TableDescription>;

    /// 执行只读 SQL 查询（先经过安全闸门）
    async fn execute_query(&self, query: &str, config: &str, limit: u32) -> AppResult<QueryResult>;

    /// 获取表行数
    async fn get_table_count(&self, table: &str, config: &str) -> AppResult<TableCount>;

    /// 获取数据库基本信息
    async fn get_database_info(&self, config: &str) -> AppResult<DatabaseInfo>;

    /// 按关键字搜索表名（不区分大小写）并返回各表行数
    async fn search_tables(&self, keyword: &str, config: &str) -> AppResult<Vec<TableCount>>;

    /// 获取数据库统计信息
    async fn get_database_stats(&self, config: &str) -> AppResult<DatabaseStats>;

    /// 释放指定配置的连接
    async fn release_connection(&self, config: &str) -> AppResult<bool>;
}

/// 数据库巡检服务
pub struct InspectService {
    registry: Arc<ConnectionRegistry>,
}

impl InspectService {
    /// 创建新的巡检服务实例
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    async fn count_tables(conn: &mut LiveConnection, tables: Vec<String>) -> AppResult<Vec<TableCount>> {
        let mut counts = Vec::with_capacity(tables.len());
        for table_name in tables {
            let table = TableRef::from_catalog(&table_name, conn.kind());
            let row_count = conn.row_count(&table).await?;
            counts.push(TableCount { table_name, row_count });
        }
        Ok(counts)
    }
}

#[async_trait]
impl InspectServiceTrait for InspectService {
    async fn list_configs(&self) -> Vec<ConfigItem> {
        self.registry.store().items()
    }

    async fn list_tables(&self, config: &str) -> AppResult<Vec<String>> {
        let mut conn = self.registry.acquire(config).await?;
        conn.list_tables().await
    }

    async fn describe_table(&self, table: &str, config: &str) -> AppResult<TableDescription> {
        let kind = self.registry.store().kind_of(config)?;
        let table_ref = TableRef::parse(table, kind)?;

        let mut conn = self.registry.acquire(config).await?;
        let columns = conn.describe_table(&table_ref).await?;
        Ok(TableDescription {
            table_name: table.to_string(),
            columns,
        })
    }

    async fn execute_query(&self, query: &str, config: &str, limit: u32) -> AppResult<QueryResult> {
        // 闸门在获取连接之前执行，被拒绝的语句不会触达任何连接
        let statement = QueryGate::evaluate(query, limit)
            .into_result()
            .inspect_err(|e| tracing::warn!(config = %config, reason = %e, "查询被安全闸门拒绝"))?;

        let mut conn = self.registry.acquire(config).await?;
        let started = Instant::now();
        let rows = conn.execute(&statement).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(config = %config, rows = rows.len(), elapsed_ms, "查询执行完成");
        Ok(QueryResult::new(statement.into_string(), rows, elapsed_ms))
    }

    async fn get_table_count(&self, table: &str, config: &str) -> AppResult<TableCount> {
        let kind = self.registry.store().kind_of(config)?;
        let table_ref = TableRef::parse(table, kind)?;

        let mut conn = self.registry.acquire(config).await?;
        let row_count = conn.row_count(&table_ref).await?;
        Ok(TableCount {
            table_name: table.to_string(),
            row_count,
        })
    }

    async fn get_database_info(&self, config: &str) -> AppResult<DatabaseInfo> {
        let mut conn = self.registry.acquire(config).await?;
        let server = conn.server_info().await?;
        let table_count = conn.list_tables().await?.len();

        Ok(DatabaseInfo {
            config_name: config.to_string(),
            database_type: conn.kind().display_name().to_string(),
            kind: conn.kind(),
            database: server.database,
            version: server.version,
            table_count,
            endpoint: conn.endpoint().map(str::to_string),
        })
    }

    async fn search_tables(&self, keyword: &str, config: &str) -> AppResult<Vec<TableCount>> {
        let needle = keyword.to_lowercase();
        let mut conn = self.registry.acquire(config).await?;
        let matches: Vec<String> = conn
            .list_tables()
            .await?
            .into_iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .collect();

        tracing::debug!(config = %config, keyword = %keyword, matches = matches.len(), "表搜索完成");
        Self::count_tables(&mut conn, matches).await
    }

    async fn get_database_stats(&self, config: &str) -> AppResult<DatabaseStats> {
        let mut conn = self.registry.acquire(config).await?;
        let tables = conn.list_tables().await?;
        let counts = Self::count_tables(&mut conn, tables).await?;

        Ok(DatabaseStats::from_counts(
            config.to_string(),
            conn.kind().display_name().to_string(),
            conn.database().to_string(),
            counts,
        ))
    }

    async fn release_connection(&self, config: &str) -> AppResult<bool> {
        self.registry.store().get(config)?;
        let released = self.registry.release(config).await;
        tracing::info!(config = %config, released, "连接已释放");
        Ok(released)
    }
}
