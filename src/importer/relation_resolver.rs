// ==========================================
// 表格导入引擎 - 关联解析器
// ==========================================
// 职责: 多对一字段的原始值 → 关联集合中已有记录的关联键（外键目标列，默认主键）
// 查找顺序（固定，首个命中即返回）:
//   1. 按关联键直接读取
//   2. 按字段 name 等值查询
//   3. 按字段 sku 等值查询
// 约束: 查询走当前事务视图（可见同一批次中先前行的写入）
// ==========================================

use crate::domain::schema::{CollectionSchema, FieldSchema, SchemaOverview};
use crate::domain::value::{FieldValue, Record};
use crate::importer::error::FieldError;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::item_repo::{ItemRepository, ReadQuery};
use tracing::debug;

/// 按字段回退查找时依次尝试的字段名
pub const FALLBACK_LOOKUP_FIELDS: [&str; 2] = ["name", "sku"];

pub struct RelationResolver;

impl RelationResolver {
    /// 解析关联字段
    ///
    /// # 参数
    /// - repo: 当前事务作用域内的记录仓储
    /// - overview: 结构快照（取关联集合主键名与字段集）
    /// - field: 多对一字段的结构描述（关联集合 / 目标列）
    /// - value: 已完成类型转换的值
    ///
    /// # 返回
    /// - Ok(FieldValue): 命中记录的关联键
    /// - Err(FieldError): 三种查找均未命中，或任一步读取失败
    pub fn resolve(
        &self,
        repo: &dyn ItemRepository,
        overview: &SchemaOverview,
        field: &FieldSchema,
        value: &FieldValue,
    ) -> Result<FieldValue, FieldError> {
        let name = field.name.as_str();
        let lookup_error = |e: RepositoryError| FieldError::RelationLookup {
            field: name.to_string(),
            message: e.to_string(),
        };

        let related = field
            .related_collection
            .as_deref()
            .ok_or_else(|| FieldError::RelationLookup {
                field: name.to_string(),
                message: "不是多对一关联字段".to_string(),
            })?;
        let schema = overview
            .collection(related)
            .ok_or_else(|| FieldError::RelationLookup {
                field: name.to_string(),
                message: format!("关联集合 \"{}\" 不存在", related),
            })?;
        let key_field = field
            .related_field
            .as_deref()
            .unwrap_or(schema.primary_key.as_str());

        // 1. 关联键直查
        let direct = if key_field == schema.primary_key {
            repo.read_one(related, value)
                .map(|found| found.map(|record| Self::key_of(record, key_field, value)))
        } else {
            Self::find_by_field(repo, schema, key_field, key_field, value)
        };
        if let Some(key) = direct.map_err(lookup_error)? {
            debug!(field = %name, related = %related, via = key_field, "关联命中: 关联键");
            return Ok(key);
        }

        // 2/3. name / sku 回退
        for lookup_field in FALLBACK_LOOKUP_FIELDS {
            if lookup_field == key_field || !schema.fields.contains_key(lookup_field) {
                continue;
            }
            if let Some(key) = Self::find_by_field(repo, schema, lookup_field, key_field, value)
                .map_err(lookup_error)?
            {
                debug!(field = %name, related = %related, via = lookup_field, "关联命中");
                return Ok(key);
            }
        }

        Err(FieldError::RelationNotFound {
            field: name.to_string(),
            value: value.to_string(),
            collection: related.to_string(),
        })
    }

    fn find_by_field(
        repo: &dyn ItemRepository,
        schema: &CollectionSchema,
        lookup_field: &str,
        key_field: &str,
        value: &FieldValue,
    ) -> RepositoryResult<Option<FieldValue>> {
        let query = ReadQuery::eq(lookup_field, value.clone())
            .limit(1)
            .fields(vec![key_field.to_string()]);

        let records = repo.read_by_query(&schema.name, &query)?;
        Ok(records
            .into_iter()
            .next()
            .and_then(|mut record| record.remove(key_field)))
    }

    /// 取记录关联键（记录未带该列时退回查询值本身）
    fn key_of(mut record: Record, key_field: &str, value: &FieldValue) -> FieldValue {
        record.remove(key_field).unwrap_or_else(|| value.clone())
    }
}
