//! 只读数据库巡检服务
//!
//! 提供以下功能：
//! - 按配置名称管理数据库连接的生命周期（惰性创建、复用前探活、失效重建）
//! - 表结构巡检（表列表、表结构、行数、数据库信息与统计）
//! - 经过安全闸门的只读 SQL 查询

pub mod adapter;
pub mod config_store;
pub mod handlers;
pub mod registry;
pub mod routes;
pub mod service;
pub mod state;

#[cfg(all(test, feature = "sqlite"))]
mod test_support;

use axum::{middleware, routing::get, Json, Router};
use common::middleware::request_id_middleware;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "巡检服务 API",
        version = "0.1.0",
        description = "只读数据库巡检微服务"
    ),
    paths(
        handlers::list_configs,
        handlers::list_tables,
        handlers::search_tables,
        handlers::describe_table,
        handlers::get_table_count,
        handlers::get_database_info,
        handlers::get_database_stats,
        handlers::release_connection,
        handlers::execute_query,
        handlers::health_check,
    ),
    components(schemas(
        common::models::BackendKind,
        common::models::ConfigItem,
        common::models::ColumnInfo,
        common::models::TableDescription,
        common::models::TableCount,
        common::models::DatabaseInfo,
        common::models::DatabaseStats,
        common::models::QueryRequest,
        common::models::QueryResult,
        common::response::ApiError,
        handlers::HealthResponse,
    )),
    tags(
        (name = "configs", description = "配置与连接端点"),
        (name = "schema", description = "表结构巡检端点"),
        (name = "query", description = "只读查询端点"),
        (name = "health", description = "健康检查端点")
    )
)]
pub struct ApiDoc;

/// 构建完整的应用路由（含中间件）
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
