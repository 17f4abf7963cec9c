// ==========================================
// 表格导入引擎 - 导入层
// ==========================================
// 职责: 表格文件 → 目标集合记录
// 组件: 单元格转换 → 关联解析 → 行预处理 → 重复跟踪 → 编排器
// ==========================================

// 模块声明
pub mod cell_coercer;
pub mod duplicate_tracker;
pub mod error;
pub mod file_parser;
pub mod import_trait;
pub mod orchestrator;
pub mod relation_resolver;
pub mod row_preparer;

// 重导出核心类型
pub use cell_coercer::CellCoercer;
pub use duplicate_tracker::DuplicateTracker;
pub use error::{CoercionError, FieldError, ImportError, ImporterResult};
pub use file_parser::{CsvParser, ExcelParser, SheetFormat, UniversalFileParser};
pub use orchestrator::ImportOrchestrator;
pub use relation_resolver::RelationResolver;
pub use row_preparer::{PreparedRow, RowPreparer};

// 重导出 Trait 接口
pub use import_trait::{FileParser, Grid, ValueCoercer};
