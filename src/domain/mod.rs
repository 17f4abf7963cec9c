// ==========================================
// 表格导入引擎 - 领域模型层
// ==========================================
// 职责: 定义值模型、结构描述、导入运行实体
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod import;
pub mod schema;
pub mod types;
pub mod value;

// 重导出核心类型
pub use import::{ImportRequest, ImportResult, RowError, RunOptions};
pub use schema::{CollectionSchema, FieldSchema, SchemaOverview};
pub use types::{FieldType, ImportStrategy};
pub use value::{format_instant, format_number, CellValue, FieldValue, Record};
