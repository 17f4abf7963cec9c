// ==========================================
// 表格导入 API
// ==========================================
// 职责: 调用方入口（校验 / 导入），加载配置、在阻塞线程中执行编排器、组装响应
// 策略: 提交模式下整批被拒绝时返回 ApiError::ImportRejected（HTTP 400 等价）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader, ImportSettings};
use crate::db::open_sqlite_connection;
use crate::domain::import::{ImportRequest, ImportResult, RowError, RunOptions};
use crate::domain::types::ImportStrategy;
use crate::importer::ImportOrchestrator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// 导入请求载荷（JSON，文件以路径给出）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPayload {
    pub collection: String,
    pub mappings: HashMap<String, String>,
    /// 表格文件路径
    pub file: String,
    #[serde(default)]
    pub identifier_field: Option<String>,
    /// 未指定时使用配置项 import.default_strategy
    #[serde(default)]
    pub strategy: Option<ImportStrategy>,
}

/// 校验响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub run_id: String,
    /// 可成功落库的行数
    pub valid_count: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub errors: Vec<RowError>,
    pub elapsed_ms: u64,
}

impl From<ImportResult> for ValidateResponse {
    fn from(result: ImportResult) -> Self {
        Self {
            valid_count: result.created_count(),
            error_count: result.error_count(),
            run_id: result.run_id,
            updated_count: result.updated_count,
            skipped_count: result.skipped_count,
            errors: result.errors,
            elapsed_ms: result.elapsed_ms,
        }
    }
}

/// 导入响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub run_id: String,
    pub created_count: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub errors: Vec<RowError>,
    pub elapsed_ms: u64,
}

impl From<ImportResult> for ImportResponse {
    fn from(result: ImportResult) -> Self {
        Self {
            created_count: result.created_count(),
            error_count: result.error_count(),
            run_id: result.run_id,
            updated_count: result.updated_count,
            skipped_count: result.skipped_count,
            errors: result.errors,
            elapsed_ms: result.elapsed_ms,
        }
    }
}

/// 导入API
pub struct ImportApi {
    db_path: String,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// 读取导入配置快照
    pub async fn load_settings(&self) -> ApiResult<ImportSettings> {
        let manager = ConfigManager::new(&self.db_path)
            .map_err(|e| ApiError::ConfigError(format!("创建配置管理器失败: {}", e)))?;
        manager
            .load_import_settings()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    /// 由载荷构造导入请求（读取文件、补全默认策略）
    pub async fn build_request(&self, payload: ImportPayload) -> ApiResult<ImportRequest> {
        if payload.collection.trim().is_empty() {
            return Err(ApiError::InvalidInput("collection 不能为空".to_string()));
        }
        if payload.mappings.is_empty() {
            return Err(ApiError::InvalidInput("mappings 不能为空".to_string()));
        }

        let file_bytes = tokio::fs::read(&payload.file)
            .await
            .map_err(|e| ApiError::ImportError(format!("读取文件 {} 失败: {}", payload.file, e)))?;

        let strategy = match payload.strategy {
            Some(strategy) => strategy,
            None => self.load_settings().await?.default_strategy,
        };

        let file_name = Path::new(&payload.file)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        let mut request = ImportRequest::new(payload.collection, payload.mappings, file_bytes)
            .with_strategy(strategy);
        request.file_name = file_name;
        request.identifier_field = payload.identifier_field;
        Ok(request)
    }

    /// 仅校验（所有写入在结束时回滚）
    ///
    /// # 返回
    /// - Ok(ValidateResponse): 校验报告（行级错误在报告中）
    /// - Err(ApiError): 文件 / 空表 / 未知集合等运行级错误
    pub async fn validate(&self, request: ImportRequest) -> ApiResult<ValidateResponse> {
        let result = self.run(request, RunOptions::validation()).await?;
        Ok(ValidateResponse::from(result))
    }

    /// 导入
    ///
    /// # 参数
    /// - request: 导入请求
    /// - partial: 是否允许部分成功
    ///
    /// # 返回
    /// - Ok(ImportResponse): 导入结果
    /// - Err(ApiError::ImportRejected): 非部分导入、error 策略且存在行级错误（未落库任何数据）
    pub async fn import(&self, request: ImportRequest, partial: bool) -> ApiResult<ImportResponse> {
        let result = self.run(request, RunOptions::commit(partial)).await?;

        if result.rejected {
            warn!(run_id = %result.run_id, errors = result.error_count(), "导入被整批拒绝");
            return Err(ApiError::ImportRejected {
                errors: result.errors,
            });
        }

        Ok(ImportResponse::from(result))
    }

    /// 在阻塞线程中执行编排器（独立连接，单次运行独占）
    async fn run(&self, request: ImportRequest, options: RunOptions) -> ApiResult<ImportResult> {
        let settings = self.load_settings().await?;
        let db_path = self.db_path.clone();

        info!(
            collection = %request.collection,
            strategy = %request.strategy,
            validation_only = options.validation_only,
            "提交导入任务"
        );

        tokio::task::spawn_blocking(move || -> ApiResult<ImportResult> {
            let mut conn = open_sqlite_connection(&db_path)
                .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
            let orchestrator = ImportOrchestrator::new(settings);
            Ok(orchestrator.run(&mut conn, &request, options)?)
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("导入任务异常终止: {}", e)))?
    }
}
