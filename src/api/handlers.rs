use crate::config::LookupTuning;
use crate::error::{ErrorEnvelope, LookupError};
use crate::ingest::{import_and_filter, FilterConfig, InvalidRecord, ParseConfig};
use crate::models::{LookupStats, Record, UnmatchedRecord};
use crate::service::{LookupService, LookupSettings};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// 共享状态
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub tuning: LookupTuning,
}

/// 请求体: 价目表 + 用量记录 + 本次调用的匹配/计费/输出配置
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub price_list: Value,
    pub usage: Value,
    /// 价目表在 `price_list` 中的字段路径 (点分)
    #[serde(default)]
    pub price_list_field: Option<String>,
    #[serde(default)]
    pub usage_field: Option<String>,
    #[serde(flatten)]
    pub settings: LookupSettings,
}

/// 响应体
#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub success: bool,
    pub matched: Vec<Record>,
    pub unmatched: Vec<UnmatchedRecord>,
    pub stats: LookupStats,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub csv: String,
    #[serde(default)]
    pub parse: ParseConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub valid: Vec<Record>,
    pub invalid: Vec<InvalidRecord>,
}

/// 失败响应体
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error: ErrorEnvelope,
}

fn error_response(err: LookupError, context: Value) -> Response {
    let status = if err.is_caller_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let response = ErrorResponse {
        success: false,
        message: format!("Error: {}", err),
        error: err.envelope(context),
    };
    (status, Json(response)).into_response()
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/lookup", post(lookup))
        .route("/api/import", post(import))
        .with_state(state)
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 价目匹配 + 计费
pub async fn lookup(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Response {
    let req: LookupRequest = match serde_json::from_value(body) {
        Ok(req) => req,
        Err(e) => return error_response(e.into(), Value::Null),
    };

    let context = req.settings.snapshot();
    let threshold = state.tuning.parallel_threshold;

    // 匹配与计费是纯 CPU 计算，放到阻塞线程池
    let joined = tokio::task::spawn_blocking(move || {
        let service = LookupService::new(req.settings).with_parallel_threshold(threshold);
        service.run_raw(
            &req.price_list,
            req.price_list_field.as_deref(),
            &req.usage,
            req.usage_field.as_deref(),
        )
    })
    .await;

    let result = match joined {
        Ok(result) => result,
        Err(e) => Err(LookupError::Internal(format!("lookup task failed: {}", e))),
    };

    match result {
        Ok(outcome) => {
            let stats = outcome.stats();
            let response = LookupResponse {
                success: true,
                matched: outcome.matched,
                unmatched: outcome.unmatched,
                stats,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(e, context),
    }
}

/// CSV 导入 + 过滤
pub async fn import(Json(body): Json<Value>) -> Response {
    let req: ImportRequest = match serde_json::from_value(body) {
        Ok(req) => req,
        Err(e) => return error_response(e.into(), Value::Null),
    };

    match import_and_filter(&req.csv, &req.parse, &req.filter) {
        Ok((valid, invalid)) => {
            let response = ImportResponse {
                success: true,
                message: format!("Imported {} rows, {} invalid", valid.len(), invalid.len()),
                valid,
                invalid,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let context = serde_json::json!({ "parse": req.parse, "filter": req.filter });
            error_response(e, context)
        }
    }
}
