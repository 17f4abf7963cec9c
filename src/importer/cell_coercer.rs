// ==========================================
// 表格导入引擎 - 单元格转换器实现
// ==========================================
// 职责: 原始单元格值 → 字段声明类型的值
// 规则:
// - 空值（空单元格/空白文本）对任何类型恒为 Null
// - 数值 > 10000 的日期字段按 Excel 序列号解释（保留的启发式规则）
// - 未声明类型原样透传
// ==========================================

use crate::domain::types::FieldType;
use crate::domain::value::{CellValue, FieldValue};
use crate::importer::error::CoercionError;
use crate::importer::import_trait::ValueCoercer;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// 大于该值的数值按 Excel 日期序列号处理
pub const EXCEL_SERIAL_THRESHOLD: f64 = 10_000.0;

/// Excel 纪元（1899-12-30）到 Unix 纪元的天数
pub const EXCEL_EPOCH_OFFSET_DAYS: f64 = 25_569.0;

const MILLIS_PER_DAY: f64 = 86_400.0 * 1000.0;

/// 布尔真值集合（小写、去空白后匹配）
const TRUE_WORDS: [&str; 4] = ["true", "1", "si", "sí"];
const FALSE_WORDS: [&str; 3] = ["false", "0", "no"];

const DATETIME_FORMATS: [&str; 9] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%a %b %d %Y %H:%M:%S",
];

// 月/日/年 与英文月份写法（表格软件常见的文本日期）
const DATE_FORMATS: [&str; 9] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%a %b %d %Y",
];

pub struct CellCoercer;

impl ValueCoercer for CellCoercer {
    fn coerce(&self, value: &CellValue, field_type: FieldType) -> Result<FieldValue, CoercionError> {
        if value.is_blank() {
            return Ok(FieldValue::Null);
        }

        match field_type {
            FieldType::Integer | FieldType::BigInteger => Self::coerce_integer(value),
            FieldType::Float | FieldType::Decimal => Self::coerce_float(value),
            FieldType::Boolean => Self::coerce_boolean(value),
            FieldType::Json => Self::coerce_json(value),
            FieldType::Date | FieldType::DateTime | FieldType::Timestamp => {
                Self::coerce_instant(value)
            }
            FieldType::Untyped => Ok(value.to_field_value()),
        }
    }
}

impl CellCoercer {
    /// 数值视图（布尔按 1/0 计）
    fn numeric(value: &CellValue) -> Option<f64> {
        match value {
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            other => other.as_number(),
        }
    }

    fn coerce_integer(value: &CellValue) -> Result<FieldValue, CoercionError> {
        if let CellValue::Int(i) = value {
            return Ok(FieldValue::Integer(*i));
        }

        match Self::numeric(value) {
            Some(n) if n.fract() == 0.0 && n.abs() <= i64::MAX as f64 => {
                Ok(FieldValue::Integer(n as i64))
            }
            _ => Err(CoercionError::new(format!(
                "必须是整数（例: 123）。值: \"{}\"。",
                value
            ))),
        }
    }

    fn coerce_float(value: &CellValue) -> Result<FieldValue, CoercionError> {
        Self::numeric(value)
            .map(FieldValue::Float)
            .ok_or_else(|| {
                CoercionError::new(format!("必须是数字（例: 123.45）。值: \"{}\"。", value))
            })
    }

    fn coerce_boolean(value: &CellValue) -> Result<FieldValue, CoercionError> {
        let lower = value.to_string().trim().to_lowercase();

        if TRUE_WORDS.contains(&lower.as_str()) {
            Ok(FieldValue::Boolean(true))
        } else if FALSE_WORDS.contains(&lower.as_str()) {
            Ok(FieldValue::Boolean(false))
        } else {
            Err(CoercionError::new(format!(
                "必须是布尔值（例: true, false, 1, 0, si, no）。值: \"{}\"。",
                value
            )))
        }
    }

    fn coerce_json(value: &CellValue) -> Result<FieldValue, CoercionError> {
        match value {
            CellValue::Text(s) => serde_json::from_str::<serde_json::Value>(s)
                .map(FieldValue::Json)
                .map_err(|e| {
                    CoercionError::new(format!("不是合法的 JSON（{}）。值: \"{}\"。", e, s))
                }),
            other => Ok(other.to_field_value()),
        }
    }

    fn coerce_instant(value: &CellValue) -> Result<FieldValue, CoercionError> {
        if let Some(serial) = value.as_number().filter(|n| *n > EXCEL_SERIAL_THRESHOLD) {
            return excel_serial_to_instant(serial)
                .map(FieldValue::Instant)
                .ok_or_else(|| {
                    CoercionError::new(format!(
                        "Excel 日期序列号不是有效日期。值: \"{}\"。",
                        value
                    ))
                });
        }

        parse_datetime_text(&value.to_string())
            .map(FieldValue::Instant)
            .ok_or_else(|| CoercionError::new(format!("不是有效日期。值: \"{}\"。", value)))
    }
}

/// Excel 序列号 → 时间点（按毫秒四舍五入）
pub fn excel_serial_to_instant(serial: f64) -> Option<DateTime<Utc>> {
    let millis = ((serial - EXCEL_EPOCH_OFFSET_DAYS) * MILLIS_PER_DAY).round();
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// 通用日期/时间文本解析（无时区信息时按 UTC 处理）
pub fn parse_datetime_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    // 仅年份（如 "2024"）
    if text.len() == 4 && text.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = text.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc());
    }

    None
}
