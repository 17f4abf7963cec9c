// ==========================================
// 表格导入引擎 - 通用记录 Repository Trait
// ==========================================
// 职责: 定义按集合读写记录的数据访问接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 约束: 实现绑定到当前事务作用域（读取可见同一事务内未提交的写入）
// ==========================================

use crate::domain::value::{FieldValue, Record};
use crate::repository::error::RepositoryResult;

// ==========================================
// ReadQuery - 条件查询
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadQuery {
    /// 等值过滤条件（AND 组合）
    pub filter: Vec<(String, FieldValue)>,
    /// 返回条数上限
    pub limit: Option<usize>,
    /// 投影字段（None 表示全部字段）
    pub fields: Option<Vec<String>>,
}

impl ReadQuery {
    /// 单字段等值查询
    pub fn eq(field: impl Into<String>, value: FieldValue) -> Self {
        Self {
            filter: vec![(field.into(), value)],
            limit: None,
            fields: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }
}

// ==========================================
// ItemRepository Trait
// ==========================================
// 实现者: SqliteItemRepository（使用 rusqlite）
pub trait ItemRepository {
    /// 新建记录
    ///
    /// # 返回
    /// - Ok(FieldValue): 新记录主键
    /// - Err: 存储拒绝（约束违反等）
    fn create_one(&self, collection: &str, record: &Record) -> RepositoryResult<FieldValue>;

    /// 按主键更新记录（仅更新 record 中出现的字段）
    fn update_one(&self, collection: &str, key: &FieldValue, record: &Record)
        -> RepositoryResult<()>;

    /// 按主键读取记录
    ///
    /// # 返回
    /// - Ok(Some(record)): 找到
    /// - Ok(None): 未找到
    fn read_one(&self, collection: &str, key: &FieldValue) -> RepositoryResult<Option<Record>>;

    /// 条件查询
    fn read_by_query(&self, collection: &str, query: &ReadQuery) -> RepositoryResult<Vec<Record>>;
}
