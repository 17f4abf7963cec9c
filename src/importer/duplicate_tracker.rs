// ==========================================
// 表格导入引擎 - 重复记录跟踪器
// ==========================================
// 职责: 标识字段值 → 已有记录主键（单次导入内缓存）
// 约束:
// - 缓存只在一次导入内有效，由编排器创建并持有，导入结束即丢弃
// - 缓存命中即为权威结果，不再访问数据库
// - 数据库未命中不写缓存；新建记录后由编排器显式登记
// ==========================================

use crate::domain::value::{FieldValue, Record};
use crate::repository::error::RepositoryResult;
use crate::repository::item_repo::{ItemRepository, ReadQuery};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DuplicateTracker {
    identifier_field: Option<String>,
    cache: HashMap<String, FieldValue>,
    cache_hits: usize,
}

impl DuplicateTracker {
    pub fn new(identifier_field: Option<String>) -> Self {
        Self {
            identifier_field: identifier_field.filter(|f| !f.trim().is_empty()),
            cache: HashMap::new(),
            cache_hits: 0,
        }
    }

    pub fn identifier_field(&self) -> Option<&str> {
        self.identifier_field.as_deref()
    }

    /// 候选记录的标识值（未配置标识字段、字段缺失或为空时返回 None）
    pub fn identity_of<'r>(&self, candidate: &'r Record) -> Option<&'r FieldValue> {
        let field = self.identifier_field.as_deref()?;
        candidate.get(field).filter(|v| !v.is_null())
    }

    /// 查找已有记录主键
    ///
    /// # 返回
    /// - Ok(Some(key)): 已存在（缓存或数据库命中）
    /// - Ok(None): 无标识概念或未找到
    /// - Err: 查询失败（由调用方按行错误上报）
    pub fn lookup(
        &mut self,
        repo: &dyn ItemRepository,
        collection: &str,
        primary_key: &str,
        candidate: &Record,
    ) -> RepositoryResult<Option<FieldValue>> {
        let (Some(field), Some(value)) = (self.identifier_field.as_deref(), self.identity_of(candidate))
        else {
            return Ok(None);
        };

        let cache_key = value.to_string();
        if let Some(key) = self.cache.get(&cache_key) {
            self.cache_hits += 1;
            debug!(identifier = %cache_key, "重复检测: 缓存命中");
            return Ok(Some(key.clone()));
        }

        let query = ReadQuery::eq(field, value.clone())
            .limit(1)
            .fields(vec![primary_key.to_string()]);
        let found = repo
            .read_by_query(collection, &query)?
            .into_iter()
            .next()
            .and_then(|mut record| record.remove(primary_key));

        if let Some(key) = &found {
            debug!(identifier = %cache_key, "重复检测: 数据库命中");
            self.cache.insert(cache_key, key.clone());
        }
        Ok(found)
    }

    /// 登记新建记录（同一批次后续行可直接命中）
    pub fn register(&mut self, candidate: &Record, key: FieldValue) {
        if let Some(value) = self.identity_of(candidate) {
            self.cache.insert(value.to_string(), key);
        }
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::relation_resolver::tests::MemoryRepo;

    fn candidate(national_id: FieldValue) -> Record {
        let mut record = Record::new();
        record.insert("national_id".to_string(), national_id);
        record
    }

    #[test]
    fn test_no_identifier_field_means_no_identity() {
        let repo = MemoryRepo::default();
        let mut tracker = DuplicateTracker::new(None);

        let found = tracker
            .lookup(&repo, "person", "id", &candidate(FieldValue::Text("A1".to_string())))
            .unwrap();
        assert!(found.is_none());
        assert_eq!(repo.reads.get(), 0);
    }

    #[test]
    fn test_missing_or_null_identifier_value() {
        let repo = MemoryRepo::default();
        let mut tracker = DuplicateTracker::new(Some("national_id".to_string()));

        assert!(tracker.lookup(&repo, "person", "id", &Record::new()).unwrap().is_none());
        assert!(tracker
            .lookup(&repo, "person", "id", &candidate(FieldValue::Null))
            .unwrap()
            .is_none());
        assert_eq!(repo.reads.get(), 0);
    }

    #[test]
    fn test_database_hit_populates_cache() {
        let repo = MemoryRepo::default();
        let mut existing = candidate(FieldValue::Text("A1".to_string()));
        existing.insert("id".to_string(), FieldValue::Integer(9));
        repo.insert("person", existing);

        let mut tracker = DuplicateTracker::new(Some("national_id".to_string()));
        let row = candidate(FieldValue::Text("A1".to_string()));

        assert_eq!(tracker.lookup(&repo, "person", "id", &row).unwrap(), Some(FieldValue::Integer(9)));
        assert_eq!(tracker.lookup(&repo, "person", "id", &row).unwrap(), Some(FieldValue::Integer(9)));
        assert_eq!(repo.reads.get(), 1);
        assert_eq!(tracker.cache_hits(), 1);
    }

    #[test]
    fn test_miss_is_not_cached_until_registered() {
        let repo = MemoryRepo::default();
        let mut tracker = DuplicateTracker::new(Some("national_id".to_string()));
        let row = candidate(FieldValue::Integer(42));

        assert!(tracker.lookup(&repo, "person", "id", &row).unwrap().is_none());
        assert_eq!(tracker.cached_len(), 0);

        tracker.register(&row, FieldValue::Integer(1));
        assert_eq!(tracker.lookup(&repo, "person", "id", &row).unwrap(), Some(FieldValue::Integer(1)));
        // 登记后命中缓存，不再访问数据库
        assert_eq!(repo.reads.get(), 1);
    }

    #[test]
    fn test_lookup_failure_is_surfaced() {
        let repo = MemoryRepo::default();
        repo.fail_reads.set(true);
        let mut tracker = DuplicateTracker::new(Some("national_id".to_string()));

        assert!(tracker
            .lookup(&repo, "person", "id", &candidate(FieldValue::Text("A1".to_string())))
            .is_err());
    }
}
