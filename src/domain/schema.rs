// ==========================================
// 表格导入引擎 - 集合结构描述
// ==========================================
// 职责: 字段类型 / 多对一关联 / 主键名（只读，由结构目录提供）
// ==========================================

use crate::domain::types::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 单个字段的结构描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    /// 多对一关联的目标集合（None 表示非关联字段）
    pub related_collection: Option<String>,
    /// 关联目标列（None 表示目标集合主键）
    #[serde(default)]
    pub related_field: Option<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            related_collection: None,
            related_field: None,
        }
    }

    /// 标记为多对一关联字段
    pub fn many_to_one(mut self, related_collection: impl Into<String>) -> Self {
        self.related_collection = Some(related_collection.into());
        self
    }

    /// 指定关联目标列（外键指向非主键的唯一列）
    pub fn references(mut self, related_field: impl Into<String>) -> Self {
        self.related_field = Some(related_field.into());
        self
    }

    pub fn is_many_to_one(&self) -> bool {
        self.related_collection.is_some()
    }
}

/// 集合（表）的结构描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub primary_key: String,
    pub fields: BTreeMap<String, FieldSchema>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    /// 字段是否可用于读写（含 rowid 形式的隐式主键）
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name) || name == self.primary_key
    }
}

/// 全部集合的结构快照（单次导入内只读）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaOverview {
    pub collections: HashMap<String, CollectionSchema>,
}

impl SchemaOverview {
    pub fn collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }

    pub fn insert(&mut self, schema: CollectionSchema) {
        self.collections.insert(schema.name.clone(), schema);
    }
}
