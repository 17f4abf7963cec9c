// ==========================================
// 表格导入引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)，与业务数据同库
// 约定: 表或键不存在时回落到默认值
// ==========================================

use crate::config::import_config_trait::{
    ConfigResult, ImportConfigReader, DEFAULT_PERSISTENCE_ERROR_PREFIX,
};
use crate::db::{ensure_config_table, open_sqlite_connection};
use crate::domain::types::ImportStrategy;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在（含 config_kv 表不存在）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let has_table = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name='config_kv' LIMIT 1",
                [],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !has_table {
            return Ok(None);
        }

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入/覆写 global scope 的配置值（config_kv 表不存在时自动创建）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        ensure_config_table(&conn)?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }
}

// ==========================================
// ImportConfigReader 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_default_strategy(&self) -> ConfigResult<ImportStrategy> {
        let value = self.get_config_or_default(config_keys::DEFAULT_STRATEGY, "error")?;
        match value.parse::<ImportStrategy>() {
            Ok(strategy) => Ok(strategy),
            Err(e) => {
                warn!(key = config_keys::DEFAULT_STRATEGY, value = %value, error = %e, "配置值无效，使用默认值");
                Ok(ImportStrategy::Error)
            }
        }
    }

    async fn get_persistence_error_prefix(&self) -> ConfigResult<String> {
        self.get_config_or_default(
            config_keys::PERSISTENCE_ERROR_PREFIX,
            DEFAULT_PERSISTENCE_ERROR_PREFIX,
        )
    }

    async fn get_max_data_rows(&self) -> ConfigResult<usize> {
        let value = self.get_config_or_default(config_keys::MAX_DATA_ROWS, "0")?;
        Ok(value.trim().parse::<usize>().unwrap_or(0))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 重复处理
    pub const DEFAULT_STRATEGY: &str = "import.default_strategy";

    // 行级错误
    pub const PERSISTENCE_ERROR_PREFIX: &str = "import.persistence_error_prefix";

    // 运行限制
    pub const MAX_DATA_ROWS: &str = "import.max_data_rows";
}
