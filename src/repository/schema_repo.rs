// ==========================================
// 表格导入引擎 - 结构目录 Repository
// ==========================================
// 职责: 提供集合的字段类型 / 多对一关联 / 主键名
// 实现: SqliteSchemaCatalog（读取 sqlite_master + PRAGMA）
// ==========================================

use crate::domain::schema::{CollectionSchema, FieldSchema, SchemaOverview};
use crate::domain::types::FieldType;
use crate::repository::error::RepositoryResult;
use crate::repository::item_repo_impl::quote_ident;
use rusqlite::Connection;
use std::collections::HashMap;

// ==========================================
// SchemaCatalog Trait
// ==========================================
pub trait SchemaCatalog {
    /// 读取全部集合的结构快照
    fn load_overview(&self) -> RepositoryResult<SchemaOverview>;

    /// 读取单个集合结构（未知集合返回 None）
    fn collection_schema(&self, collection: &str) -> RepositoryResult<Option<CollectionSchema>> {
        Ok(self.load_overview()?.collections.remove(collection))
    }
}

// ==========================================
// SqliteSchemaCatalog
// ==========================================
pub struct SqliteSchemaCatalog<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteSchemaCatalog<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn list_tables(&self) -> RepositoryResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut tables = Vec::new();
        for row in rows {
            tables.push(row?);
        }
        Ok(tables)
    }

    /// 读取外键: 本表列名 → (目标表, 目标列)
    ///
    /// 未写目标列（`REFERENCES t`）时目标列为 None，即目标表主键
    fn foreign_keys(&self, table: &str) -> RepositoryResult<HashMap<String, (String, Option<String>)>> {
        let sql = format!("PRAGMA foreign_key_list({})", quote_ident(table));
        let mut stmt = self.conn.prepare(&sql)?;
        // 列: id, seq, table, from, to, ...
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(3)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut relations = HashMap::new();
        for row in rows {
            let (from, target, to) = row?;
            relations.insert(from, (target, to));
        }
        Ok(relations)
    }

    fn describe_table(&self, table: &str) -> RepositoryResult<CollectionSchema> {
        let relations = self.foreign_keys(table)?;

        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let mut stmt = self.conn.prepare(&sql)?;
        // 列: cid, name, type, notnull, dflt_value, pk
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }

        // 复合主键取第一列；无主键表使用 rowid
        let primary_key = columns
            .iter()
            .filter(|(_, _, pk)| *pk > 0)
            .min_by_key(|(_, _, pk)| *pk)
            .map(|(name, _, _)| name.clone())
            .unwrap_or_else(|| "rowid".to_string());

        let mut schema = CollectionSchema::new(table, primary_key);
        for (name, declared, _) in columns {
            let mut field = FieldSchema::new(name.clone(), FieldType::from_declared_type(&declared));
            if let Some((target, to)) = relations.get(&name) {
                field = field.many_to_one(target.clone());
                if let Some(to) = to {
                    field = field.references(to.clone());
                }
            }
            schema = schema.with_field(field);
        }

        Ok(schema)
    }
}

impl SchemaCatalog for SqliteSchemaCatalog<'_> {
    fn load_overview(&self) -> RepositoryResult<SchemaOverview> {
        let mut overview = SchemaOverview::default();
        for table in self.list_tables()? {
            overview.insert(self.describe_table(&table)?);
        }
        Ok(overview)
    }

    fn collection_schema(&self, collection: &str) -> RepositoryResult<Option<CollectionSchema>> {
        if !self.list_tables()?.iter().any(|t| t == collection) {
            return Ok(None);
        }
        self.describe_table(collection).map(Some)
    }
}
