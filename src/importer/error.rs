// ==========================================
// 表格导入引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分层:
// - ImportError: 运行级（文件/空表/未知集合/循环外的仓储失败）
// - FieldError / CoercionError: 字段级（收集后按行上报，不中断同行其他字段）
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型（运行级）
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.ods/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("表格为空或缺少表头（至少需要表头行和一行数据）")]
    EmptySheet,

    #[error("数据行数 {rows} 超过上限 {max}")]
    TooManyRows { rows: usize, max: usize },

    // ===== 结构错误 =====
    #[error("集合 \"{0}\" 不存在")]
    UnknownCollection(String),

    // ===== 数据库错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImporterResult<T> = Result<T, ImportError>;

// ==========================================
// 字段级错误
// ==========================================

/// 单元格类型转换失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CoercionError {
    pub message: String,
}

impl CoercionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 字段级错误（按字段收集）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("字段 \"{field}\": {source}")]
    Coercion {
        field: String,
        #[source]
        source: CoercionError,
    },

    #[error("字段 \"{field}\": 值 \"{value}\" 在集合 \"{collection}\" 中未找到")]
    RelationNotFound {
        field: String,
        value: String,
        collection: String,
    },

    #[error("字段 \"{field}\": 关联查询失败: {message}")]
    RelationLookup { field: String, message: String },

    #[error("重复记录: 字段 \"{field}\" 的值 \"{value}\" 已存在")]
    Duplicate { field: String, value: String },
}

impl FieldError {
    pub fn field(&self) -> &str {
        match self {
            FieldError::Coercion { field, .. }
            | FieldError::RelationNotFound { field, .. }
            | FieldError::RelationLookup { field, .. }
            | FieldError::Duplicate { field, .. } => field,
        }
    }
}
