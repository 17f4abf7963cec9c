// ==========================================
// 表格导入引擎 - 领域类型定义
// ==========================================
// 职责: 字段声明类型 / 重复处理策略
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 字段声明类型 (Field Type)
// ==========================================
// 序列化格式: camelCase（integer / bigInteger / dateTime ...）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Integer,    // 整数
    BigInteger, // 长整数
    Float,      // 浮点
    Decimal,    // 定点小数
    Boolean,    // 布尔
    Json,       // 结构化数据
    Date,       // 日期
    DateTime,   // 日期时间
    Timestamp,  // 时间戳
    Untyped,    // 其他类型（不做转换）
}

impl FieldType {
    /// 是否为日期/时间类型
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            FieldType::Date | FieldType::DateTime | FieldType::Timestamp
        )
    }

    /// 从 SQLite 声明类型推断字段类型
    ///
    /// # 规则
    /// - 忽略大小写与类型参数（如 `DECIMAL(10,2)`）
    /// - 无法识别的声明类型 → Untyped
    pub fn from_declared_type(declared: &str) -> Self {
        let upper = declared.trim().to_uppercase();
        let base = upper.split('(').next().unwrap_or("").trim();

        match base {
            "INTEGER" | "INT" | "SMALLINT" | "TINYINT" | "MEDIUMINT" => FieldType::Integer,
            "BIGINT" | "INT8" | "UNSIGNED BIG INT" => FieldType::BigInteger,
            "REAL" | "FLOAT" | "DOUBLE" | "DOUBLE PRECISION" => FieldType::Float,
            "DECIMAL" | "NUMERIC" => FieldType::Decimal,
            "BOOLEAN" | "BOOL" => FieldType::Boolean,
            "JSON" | "JSONB" => FieldType::Json,
            "DATE" => FieldType::Date,
            "DATETIME" => FieldType::DateTime,
            "TIMESTAMP" => FieldType::Timestamp,
            _ => FieldType::Untyped,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Integer => write!(f, "integer"),
            FieldType::BigInteger => write!(f, "bigInteger"),
            FieldType::Float => write!(f, "float"),
            FieldType::Decimal => write!(f, "decimal"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Json => write!(f, "json"),
            FieldType::Date => write!(f, "date"),
            FieldType::DateTime => write!(f, "dateTime"),
            FieldType::Timestamp => write!(f, "timestamp"),
            FieldType::Untyped => write!(f, "untyped"),
        }
    }
}

// ==========================================
// 重复处理策略 (Import Strategy)
// ==========================================
// 命中已存在记录时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStrategy {
    #[default]
    Error,  // 报错（该行失败）
    Skip,   // 跳过
    Update, // 覆盖更新
}

impl fmt::Display for ImportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStrategy::Error => write!(f, "error"),
            ImportStrategy::Skip => write!(f, "skip"),
            ImportStrategy::Update => write!(f, "update"),
        }
    }
}

impl FromStr for ImportStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(ImportStrategy::Error),
            "skip" => Ok(ImportStrategy::Skip),
            "update" => Ok(ImportStrategy::Update),
            other => Err(format!("无效的导入策略: {}（应为 error/skip/update）", other)),
        }
    }
}
