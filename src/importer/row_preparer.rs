// ==========================================
// 表格导入引擎 - 行预处理器
// ==========================================
// 职责: 原始行 → 候选记录（列映射 + 类型转换 + 关联解析）
// 约束:
// - 字段之间相互独立，单字段失败不阻断其他字段
// - 未映射的列、结构中不存在的目标字段一律忽略
// - 同名表头取第一次出现的列
// ==========================================

use crate::domain::schema::{CollectionSchema, SchemaOverview};
use crate::domain::value::{CellValue, FieldValue, Record};
use crate::importer::error::FieldError;
use crate::importer::import_trait::ValueCoercer;
use crate::importer::relation_resolver::RelationResolver;
use crate::repository::item_repo::ItemRepository;
use std::collections::{HashMap, HashSet};

static EMPTY_CELL: CellValue = CellValue::Empty;

/// 单行预处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRow {
    pub record: Record,
    pub errors: Vec<FieldError>,
}

impl PreparedRow {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct RowPreparer {
    coercer: Box<dyn ValueCoercer>,
    resolver: RelationResolver,
}

impl RowPreparer {
    pub fn new(coercer: Box<dyn ValueCoercer>) -> Self {
        Self {
            coercer,
            resolver: RelationResolver,
        }
    }

    /// 预处理一行
    ///
    /// # 参数
    /// - repo: 当前事务作用域内的记录仓储（关联解析用）
    /// - overview: 结构快照
    /// - schema: 目标集合结构
    /// - headers: 表头（已去空白）
    /// - mapping: 源列名 → 目标字段名
    /// - row: 原始行
    ///
    /// # 返回
    /// 候选记录 + 字段级错误列表（由调用方决定是否拒绝整行）
    pub fn prepare(
        &self,
        repo: &dyn ItemRepository,
        overview: &SchemaOverview,
        schema: &CollectionSchema,
        headers: &[String],
        mapping: &HashMap<String, String>,
        row: &[CellValue],
    ) -> PreparedRow {
        let mut record = Record::new();
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (idx, header) in headers.iter().enumerate() {
            if !seen.insert(header.as_str()) {
                continue;
            }
            let Some(target) = mapping.get(header) else {
                continue;
            };
            let Some(field) = schema.field(target) else {
                continue;
            };

            let cell = row.get(idx).unwrap_or(&EMPTY_CELL);
            if cell.is_blank() {
                record.insert(target.clone(), FieldValue::Null);
                continue;
            }

            let coerced = match self.coercer.coerce(cell, field.field_type) {
                Ok(value) => value,
                Err(source) => {
                    errors.push(FieldError::Coercion {
                        field: target.clone(),
                        source,
                    });
                    record.insert(target.clone(), cell.to_field_value());
                    continue;
                }
            };

            let value = match &field.related_collection {
                Some(_) if !coerced.is_null() => {
                    match self.resolver.resolve(repo, overview, field, &coerced) {
                        Ok(key) => key,
                        Err(e) => {
                            errors.push(e);
                            coerced
                        }
                    }
                }
                _ => coerced,
            };

            record.insert(target.clone(), value);
        }

        PreparedRow { record, errors }
    }
}
