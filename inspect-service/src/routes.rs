//! 巡检服务路由模块

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::{
    describe_table, execute_query, get_database_info, get_database_stats, get_table_count,
    health_check, list_configs, list_tables, release_connection, search_tables,
};
use crate::state::AppState;

/// 创建巡检服务路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/configs", get(list_configs))
        .route("/api/configs/{config}/tables", get(list_tables))
        .route("/api/configs/{config}/tables/search", get(search_tables))
        .route("/api/configs/{config}/tables/{table}", get(describe_table))
        .route("/api/configs/{config}/tables/{table}/count", get(get_table_count))
        .route("/api/configs/{config}/info", get(get_database_info))
        .route("/api/configs/{config}/stats", get(get_database_stats))
        .route("/api/configs/{config}/connection", delete(release_connection))
        .route("/api/query", post(execute_query))
        .route("/api/health", get(health_check))
}
