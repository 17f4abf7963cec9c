// ==========================================
// 表格导入引擎 - 通用记录 Repository 实现
// ==========================================
// 职责: 实现按集合读写记录（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 约束: 集合/字段名必须存在于结构快照中，标识符统一加引号；值全部参数化
// ==========================================

use crate::domain::schema::{CollectionSchema, SchemaOverview};
use crate::domain::types::FieldType;
use crate::domain::value::{format_instant, FieldValue, Record};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::item_repo::{ItemRepository, ReadQuery};
use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::Connection;

// ==========================================
// FieldValue ↔ SQLite 值转换
// ==========================================
impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
            FieldValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            FieldValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            FieldValue::Boolean(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            FieldValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            FieldValue::Json(v) => ToSqlOutput::Owned(Value::Text(v.to_string())),
            FieldValue::Instant(dt) => ToSqlOutput::Owned(Value::Text(format_instant(dt))),
        })
    }
}

/// 按字段声明类型还原 SQLite 值
pub(crate) fn value_from_sql(value: ValueRef<'_>, field_type: FieldType) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(i) if field_type == FieldType::Boolean => FieldValue::Boolean(i != 0),
        ValueRef::Integer(i) => FieldValue::Integer(i),
        ValueRef::Real(f) => FieldValue::Float(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            match field_type {
                FieldType::Json => serde_json::from_str::<serde_json::Value>(&text)
                    .map(FieldValue::Json)
                    .unwrap_or(FieldValue::Text(text)),
                t if t.is_temporal() => match DateTime::parse_from_rfc3339(&text) {
                    Ok(dt) => FieldValue::Instant(dt.with_timezone(&Utc)),
                    Err(_) => FieldValue::Text(text),
                },
                _ => FieldValue::Text(text),
            }
        }
        ValueRef::Blob(bytes) => FieldValue::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// SQL 标识符加引号
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ==========================================
// SqliteItemRepository
// ==========================================
// 绑定到单个连接（外层事务或行级 savepoint 均可）
pub struct SqliteItemRepository<'c> {
    conn: &'c Connection,
    schema: &'c SchemaOverview,
}

impl<'c> SqliteItemRepository<'c> {
    pub fn new(conn: &'c Connection, schema: &'c SchemaOverview) -> Self {
        Self { conn, schema }
    }

    fn collection_schema(&self, collection: &str) -> RepositoryResult<&'c CollectionSchema> {
        self.schema
            .collection(collection)
            .ok_or_else(|| RepositoryError::UnknownCollection(collection.to_string()))
    }

    fn check_field(schema: &CollectionSchema, field: &str) -> RepositoryResult<()> {
        if schema.has_field(field) {
            Ok(())
        } else {
            Err(RepositoryError::UnknownField {
                collection: schema.name.clone(),
                field: field.to_string(),
            })
        }
    }

    fn field_type(schema: &CollectionSchema, field: &str) -> FieldType {
        schema
            .field(field)
            .map(|f| f.field_type)
            .unwrap_or(if field == schema.primary_key {
                FieldType::Integer
            } else {
                FieldType::Untyped
            })
    }

    /// 执行查询并按列名组装记录
    fn query_records(
        &self,
        schema: &CollectionSchema,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> RepositoryResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let types: Vec<FieldType> = names
            .iter()
            .map(|name| Self::field_type(schema, name))
            .collect();

        let rows = stmt.query_map(params, |row| {
            let mut record = Record::new();
            for (idx, name) in names.iter().enumerate() {
                record.insert(name.clone(), value_from_sql(row.get_ref(idx)?, types[idx]));
            }
            Ok(record)
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// 投影列表（未指定时返回全部字段 + 主键）
    fn projection(schema: &CollectionSchema, fields: Option<&Vec<String>>) -> RepositoryResult<String> {
        let columns: Vec<String> = match fields {
            Some(fields) => {
                for field in fields {
                    Self::check_field(schema, field)?;
                }
                fields.clone()
            }
            None => {
                let mut columns: Vec<String> = schema.fields.keys().cloned().collect();
                if !schema.fields.contains_key(&schema.primary_key) {
                    columns.insert(0, schema.primary_key.clone());
                }
                columns
            }
        };

        Ok(columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", "))
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn create_one(&self, collection: &str, record: &Record) -> RepositoryResult<FieldValue> {
        let schema = self.collection_schema(collection)?;
        for field in record.keys() {
            Self::check_field(schema, field)?;
        }

        let pk = &schema.primary_key;
        let sql = if record.is_empty() {
            format!(
                "INSERT INTO {} DEFAULT VALUES RETURNING {}",
                quote_ident(collection),
                quote_ident(pk)
            )
        } else {
            let columns = record
                .keys()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=record.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
                quote_ident(collection),
                columns,
                placeholders,
                quote_ident(pk)
            )
        };

        let params: Vec<&dyn ToSql> = record.values().map(|v| v as &dyn ToSql).collect();
        let pk_type = Self::field_type(schema, pk);
        let key = self.conn.query_row(&sql, params.as_slice(), |row| {
            Ok(value_from_sql(row.get_ref(0)?, pk_type))
        })?;

        Ok(key)
    }

    fn update_one(
        &self,
        collection: &str,
        key: &FieldValue,
        record: &Record,
    ) -> RepositoryResult<()> {
        let schema = self.collection_schema(collection)?;
        let pk = &schema.primary_key;

        let mut assignments = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();
        for (field, value) in record {
            Self::check_field(schema, field)?;
            if field == pk {
                continue;
            }
            params.push(value);
            assignments.push(format!("{} = ?{}", quote_ident(field), params.len()));
        }

        if assignments.is_empty() {
            return Ok(());
        }

        params.push(key);
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(collection),
            assignments.join(", "),
            quote_ident(pk),
            params.len()
        );

        let affected = self.conn.execute(&sql, params.as_slice())?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: collection.to_string(),
                id: key.to_string(),
            });
        }
        Ok(())
    }

    fn read_one(&self, collection: &str, key: &FieldValue) -> RepositoryResult<Option<Record>> {
        let schema = self.collection_schema(collection)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 LIMIT 1",
            Self::projection(schema, None)?,
            quote_ident(collection),
            quote_ident(&schema.primary_key)
        );

        let mut records = self.query_records(schema, &sql, &[key as &dyn ToSql])?;
        Ok(records.pop())
    }

    fn read_by_query(&self, collection: &str, query: &ReadQuery) -> RepositoryResult<Vec<Record>> {
        let schema = self.collection_schema(collection)?;

        let mut conditions = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();
        for (field, value) in &query.filter {
            Self::check_field(schema, field)?;
            if value.is_null() {
                conditions.push(format!("{} IS NULL", quote_ident(field)));
            } else {
                params.push(value);
                conditions.push(format!("{} = ?{}", quote_ident(field), params.len()));
            }
        }

        let mut sql = format!(
            "SELECT {} FROM {}",
            Self::projection(schema, query.fields.as_ref())?,
            quote_ident(collection)
        );
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        self.query_records(schema, &sql, params.as_slice())
    }
}
