// ==========================================
// 表格导入引擎 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::ImportStrategy;
use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果（错误可跨线程传递）
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// 持久层错误前缀默认值（与仓储层 ValidationFailed 的显示文本一致）
pub const DEFAULT_PERSISTENCE_ERROR_PREFIX: &str = "数据校验失败: ";

// ==========================================
// ImportSettings - 单次导入的配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    /// 请求未指定策略时使用
    pub default_strategy: ImportStrategy,
    /// 行级持久层错误需去掉的前缀
    pub persistence_error_prefix: String,
    /// 数据行上限（0 = 不限）
    pub max_data_rows: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            default_strategy: ImportStrategy::Error,
            persistence_error_prefix: DEFAULT_PERSISTENCE_ERROR_PREFIX.to_string(),
            max_data_rows: 0,
        }
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取默认重复处理策略
    ///
    /// # 默认值
    /// - error
    async fn get_default_strategy(&self) -> ConfigResult<ImportStrategy>;

    /// 获取持久层错误前缀
    ///
    /// # 默认值
    /// - "数据校验失败: "
    async fn get_persistence_error_prefix(&self) -> ConfigResult<String>;

    /// 获取数据行上限
    ///
    /// # 默认值
    /// - 0（不限）
    async fn get_max_data_rows(&self) -> ConfigResult<usize>;

    /// 读取全部导入配置（每次运行开始时调用一次）
    async fn load_import_settings(&self) -> ConfigResult<ImportSettings> {
        Ok(ImportSettings {
            default_strategy: self.get_default_strategy().await?,
            persistence_error_prefix: self.get_persistence_error_prefix().await?,
            max_data_rows: self.get_max_data_rows().await?,
        })
    }
}
