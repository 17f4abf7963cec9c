// ==========================================
// 表格导入引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 表格数据逐行校验 / 关联解析 / 去重合并导入
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 值模型与结构描述
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 导入流程
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 调用方接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    CellValue, CollectionSchema, FieldSchema, FieldType, FieldValue, ImportRequest, ImportResult,
    ImportStrategy, Record, RowError, RunOptions, SchemaOverview,
};

// 导入
pub use importer::{ImportError, ImportOrchestrator};

// API
pub use api::{ApiError, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "表格导入引擎";
