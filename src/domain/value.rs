// ==========================================
// 表格导入引擎 - 值模型
// ==========================================
// 职责: 原始单元格值 (CellValue) / 类型化字段值 (FieldValue)
// 约定: 字符串化规则与电子表格一致（整数值浮点不带小数位）
// ==========================================

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// 候选记录: 目标字段名 → 字段值
pub type Record = BTreeMap<String, FieldValue>;

// ==========================================
// CellValue - 原始单元格值
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    /// 是否为"空"值（空单元格 / 空白文本）
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 数值视图（数值单元格或可解析为有限数值的文本）
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) if f.is_finite() => Some(*f),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// 原样转换为字段值（不做类型转换）
    pub fn to_field_value(&self) -> FieldValue {
        match self {
            CellValue::Empty => FieldValue::Null,
            CellValue::Text(s) => FieldValue::Text(s.clone()),
            CellValue::Int(i) => FieldValue::Integer(*i),
            CellValue::Float(f) => FieldValue::Float(*f),
            CellValue::Bool(b) => FieldValue::Boolean(*b),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(n) => write!(f, "{}", format_number(*n)),
            CellValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

// ==========================================
// FieldValue - 类型化字段值
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    Json(serde_json::Value),
    Instant(DateTime<Utc>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(n) => write!(f, "{}", format_number(*n)),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Json(v) => write!(f, "{}", v),
            FieldValue::Instant(dt) => write!(f, "{}", format_instant(dt)),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
            FieldValue::Float(n) => serializer.serialize_f64(*n),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Json(v) => v.serialize(serializer),
            FieldValue::Instant(dt) => serializer.serialize_str(&format_instant(dt)),
        }
    }
}

/// 数值字符串化（整数值不带小数位）
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// 时间点字符串化（ISO-8601，毫秒精度，UTC `Z` 结尾）
pub fn format_instant(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
