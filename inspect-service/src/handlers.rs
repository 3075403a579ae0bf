//! Handler模块

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use common::errors::AppError;
use common::models::connection::ConfigItem;
use common::models::query::{QueryRequest, QueryResult};
use common::models::schema::{DatabaseInfo, DatabaseStats, TableCount, TableDescription};
use common::response::ApiResponse;

use crate::service::{InspectService, InspectServiceTrait};
use crate::state::AppState;

const SERVICE_NAME: &str = "inspect-service";

/// 列出所有后端配置（不含密码）
#[utoipa::path(
    get,
    path = "/api/configs",
    tag = "configs",
    responses(
        (status = 200, description = "配置列表", body = ApiResponse<Vec<ConfigItem>>)
    )
)]
pub async fn list_configs(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ConfigItem>>>, AppError> {
    let service = InspectService::new(state.registry);
    let data = service.list_configs().await;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// 列出数据库中的所有表
#[utoipa::path(
    get,
    path = "/api/configs/{config}/tables",
    tag = "schema",
    params(
        ("config" = String, Path, description = "配置名称")
    ),
    responses(
        (status = 200, description = "表名列表", body = ApiResponse<Vec<String>>),
        (status = 404, description = "配置不存在"),
        (status = 502, description = "数据库连接失败")
    )
)]
pub async fn list_tables(
    State(state): State<AppState>,
    Path(config): Path<String>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let service = InspectService::new(state.registry);
    let data = service.list_tables(&config).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME).with_config(config)))
}

/// 表名搜索参数
#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    /// 关键字（不区分大小写的子串匹配）
    pub keyword: String,
}

/// 按关键字搜索表
#[utoipa::path(
    get,
    path = "/api/configs/{config}/tables/search",
    tag = "schema",
    params(
        ("config" = String, Path, description = "配置名称"),
        SearchParams
    ),
    responses(
        (status = 200, description = "匹配的表及其行数", body = ApiResponse<Vec<TableCount>>),
        (status = 404, description = "配置不存在")
    )
)]
pub async fn search_tables(
    State(state): State<AppState>,
    Path(config): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<Vec<TableCount>>>, AppError> {
    let service = InspectService::new(state.registry);
    let data = service.search_tables(&params.keyword, &config).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME).with_config(config)))
}

/// 获取表结构
#[utoipa::path(
    get,
    path = "/api/configs/{config}/tables/{table}",
    tag = "schema",
    params(
        ("config" = String, Path, description = "配置名称"),
        ("table" = String, Path, description = "表名，可带一级 schema 前缀")
    ),
    responses(
        (status = 200, description = "表结构", body = ApiResponse<TableDescription>),
        (status = 400, description = "非法表名"),
        (status = 404, description = "配置不存在")
    )
)]
pub async fn describe_table(
    State(state): State<AppState>,
    Path((config, table)): Path<(String, String)>,
) -> Result<Json<ApiResponse<TableDescription>>, AppError> {
    let service = InspectService::new(state.registry);
    let data = service.describe_table(&table, &config).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME).with_config(config)))
}

/// 获取表行数
#[utoipa::path(
    get,
    path = "/api/configs/{config}/tables/{table}/count",
    tag = "schema",
    params(
        ("config" = String, Path, description = "配置名称"),
        ("table" = String, Path, description = "表名")
    ),
    responses(
        (status = 200, description = "表行数", body = ApiResponse<TableCount>),
        (status = 400, description = "非法表名"),
        (status = 404, description = "配置不存在")
    )
)]
pub async fn get_table_count(
    State(state): State<AppState>,
    Path((config, table)): Path<(String, String)>,
) -> Result<Json<ApiResponse<TableCount>>, AppError> {
    let service = InspectService::new(state.registry);
    let data = service.get_table_count(&table, &config).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME).with_config(config)))
}

/// 获取数据库基本信息
#[utoipa::path(
    get,
    path = "/api/configs/{config}/info",
    tag = "schema",
    params(
        ("config" = String, Path, description = "配置名称")
    ),
    responses(
        (status = 200, description = "数据库信息", body = ApiResponse<DatabaseInfo>),
        (status = 404, description = "配置不存在")
    )
)]
pub async fn get_database_info(
    State(state): State<AppState>,
    Path(config): Path<String>,
) -> Result<Json<ApiResponse<DatabaseInfo>>, AppError> {
    let service = InspectService::new(state.registry);
    let data = service.get_database_info(&config).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME).with_config(config)))
}

/// 获取数据库统计信息（各表行数）
#[utoipa::path(
    get,
    path = "/api/configs/{config}/stats",
    tag = "schema",
    params(
        ("config" = String, Path, description = "配置名称")
    ),
    responses(
        (status = 200, description = "数据库统计", body = ApiResponse<DatabaseStats>),
        (status = 404, description = "配置不存在")
    )
)]
pub async fn get_database_stats(
    State(state): State<AppState>,
    Path(config): Path<String>,
) -> Result<Json<ApiResponse<DatabaseStats>>, AppError> {
    let service = InspectService::new(state.registry);
    let data = service.get_database_stats(&config).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME).with_config(config)))
}

/// 释放指定配置的连接
#[utoipa::path(
    delete,
    path = "/api/configs/{config}/connection",
    tag = "configs",
    params(
        ("config" = String, Path, description = "配置名称")
    ),
    responses(
        (status = 200, description = "是否释放了一个活动连接", body = ApiResponse<bool>),
        (status = 404, description = "配置不存在")
    )
)]
pub async fn release_connection(
    State(state): State<AppState>,
    Path(config): Path<String>,
) -> Result<Json<ApiResponse<bool>>, AppError> {
    let service = InspectService::new(state.registry);
    let released = service.release_connection(&config).await?;
    Ok(Json(ApiResponse::ok_with_service(released, SERVICE_NAME).with_config(config)))
}

/// 执行只读 SQL 查询
#[utoipa::path(
    post,
    path = "/api/query",
    tag = "query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "查询结果", body = ApiResponse<QueryResult>),
        (status = 400, description = "语句被安全闸门拒绝"),
        (status = 422, description = "数据库执行失败")
    )
)]
pub async fn execute_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<ApiResponse<QueryResult>>, AppError> {
    req.validate()?;
    let limit = req.limit.unwrap_or(state.config.default_row_limit);

    let service = InspectService::new(state.registry);
    let data = service.execute_query(&req.query, &req.config, limit).await?;
    let elapsed = data.execution_time_ms;
    Ok(Json(
        ApiResponse::ok_with_service(data, SERVICE_NAME)
            .with_config(req.config)
            .with_duration(elapsed),
    ))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        configs: state.registry.store().names().len(),
        connections: state.registry.active_connections().await,
    })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// 已加载的配置数量
    pub configs: usize,
    /// 当前持有的活动连接数量
    pub connections: usize,
}
