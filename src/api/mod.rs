// ==========================================
// 表格导入引擎 - API 层
// ==========================================
// 职责: 提供调用方接口（校验 / 导入），供命令行或上层服务调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportPayload, ImportResponse, ValidateResponse};
