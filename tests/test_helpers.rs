// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================
#![allow(dead_code)]

use rusqlite::Connection;
use std::collections::HashMap;
use std::error::Error;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let (temp_file, db_path) = create_empty_db()?;

    let conn = Connection::open(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 创建临时测试数据库并执行自定义 schema
pub fn create_test_db_with(schema_sql: &str) -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let (temp_file, db_path) = create_empty_db()?;

    let conn = Connection::open(&db_path)?;
    conn.execute_batch(schema_sql)?;

    Ok((temp_file, db_path))
}

fn create_empty_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是合法 UTF-8")?
        .to_string();
    Ok((temp_file, db_path))
}

/// 初始化数据库 schema
///
/// - category: 关联目标（name / sku 可用于回退查找）
/// - product: 导入目标（覆盖各种声明类型 + 多对一关联）
fn init_schema(conn: &Connection) -> Result<(), Box<dyn Error>> {
    conn.execute_batch(
        r#"
        CREATE TABLE category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            sku TEXT
        );

        CREATE TABLE product (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            quantity INTEGER,
            price DECIMAL(10, 2),
            active BOOLEAN,
            released DATE,
            attrs JSON,
            national_id TEXT,
            category REFERENCES category(id)
        );

        INSERT INTO category (id, name, sku) VALUES (1, 'Tools', 'CAT-T');
        INSERT INTO category (id, name, sku) VALUES (2, 'Garden', 'CAT-G');
        "#,
    )?;
    Ok(())
}

/// 生成 CSV 文件内容（第一行为表头）
pub fn csv_bytes(rows: &[&[&str]]) -> Vec<u8> {
    rows.iter()
        .map(|row| row.join(","))
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

/// 列映射
pub fn mappings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(header, field)| (header.to_string(), field.to_string()))
        .collect()
}

/// 统计集合行数
pub fn count_rows(db_path: &str, table: &str) -> Result<i64, Box<dyn Error>> {
    let conn = Connection::open(db_path)?;
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

/// 读取单个文本列
pub fn query_text(db_path: &str, sql: &str) -> Result<Option<String>, Box<dyn Error>> {
    let conn = Connection::open(db_path)?;
    let value = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(value)
}
