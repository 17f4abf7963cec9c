// ==========================================
// 表格导入引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键约束每个连接单独开启）
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// ==========================================

use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "SHEET_IMPORTER_DB_PATH";

/// 默认数据库文件名
pub const DEFAULT_DB_FILE: &str = "sheet_importer.db";

/// 配置 SQLite 连接的统一 PRAGMA
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 创建 config_kv 表（幂等）
pub fn ensure_config_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (scope_id, key)
        );",
    )
}

/// 默认数据库路径
///
/// # 优先级
/// 1. 环境变量 SHEET_IMPORTER_DB_PATH
/// 2. 用户数据目录/sheet-importer/sheet_importer.db
/// 3. 当前目录/sheet_importer.db
pub fn default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        if !path.trim().is_empty() {
            return path;
        }
    }

    if let Some(data_dir) = dirs::data_dir() {
        let app_dir = data_dir.join("sheet-importer");
        if std::fs::create_dir_all(&app_dir).is_ok() {
            return app_dir.join(DEFAULT_DB_FILE).to_string_lossy().into_owned();
        }
    }

    PathBuf::from(".")
        .join(DEFAULT_DB_FILE)
        .to_string_lossy()
        .into_owned()
}
