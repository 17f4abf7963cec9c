// ==========================================
// 表格导入引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有值使用参数化,标识符须经结构快照校验,防止 SQL 注入
// ==========================================

pub mod error;
pub mod item_repo;
pub mod item_repo_impl;
pub mod schema_repo;
pub mod transaction;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use item_repo::{ItemRepository, ReadQuery};
pub use item_repo_impl::SqliteItemRepository;
pub use schema_repo::{SchemaCatalog, SqliteSchemaCatalog};
pub use transaction::{ImportTransaction, RowTransaction};
