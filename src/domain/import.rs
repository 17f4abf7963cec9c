// ==========================================
// 表格导入引擎 - 导入运行实体
// ==========================================
// 职责: 导入请求 / 运行模式 / 行级错误 / 导入结果
// 生命周期: 请求在运行开始时固定，结果在运行结束时生成一次
// ==========================================

use crate::domain::types::ImportStrategy;
use crate::domain::value::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// ImportRequest - 导入请求（运行输入）
// ==========================================
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// 目标集合
    pub collection: String,
    /// 列映射: 表头文本 → 目标字段名
    pub mappings: HashMap<String, String>,
    /// 原始文件内容
    pub file_bytes: Vec<u8>,
    /// 文件名（可选，用于按扩展名选择解析器）
    pub file_name: Option<String>,
    /// 去重标识字段（None 表示不做去重）
    pub identifier_field: Option<String>,
    /// 重复处理策略
    pub strategy: ImportStrategy,
}

impl ImportRequest {
    pub fn new(
        collection: impl Into<String>,
        mappings: HashMap<String, String>,
        file_bytes: Vec<u8>,
    ) -> Self {
        Self {
            collection: collection.into(),
            mappings,
            file_bytes,
            file_name: None,
            identifier_field: None,
            strategy: ImportStrategy::default(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_identifier(mut self, field: impl Into<String>) -> Self {
        self.identifier_field = Some(field.into());
        self
    }

    pub fn with_strategy(mut self, strategy: ImportStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

// ==========================================
// RunOptions - 运行模式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    /// 仅校验（外层事务始终回滚）
    pub validation_only: bool,
    /// 允许部分成功（提交模式下有效）
    pub allow_partial: bool,
}

impl RunOptions {
    pub fn validation() -> Self {
        Self {
            validation_only: true,
            allow_partial: false,
        }
    }

    pub fn commit(allow_partial: bool) -> Self {
        Self {
            validation_only: false,
            allow_partial,
        }
    }
}

// ==========================================
// RowError - 行级错误
// ==========================================
// row: 表格行号（1 起，表头占第 1 行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    #[serde(rename = "row")]
    pub row_number: usize,
    pub message: String,
}

impl RowError {
    pub fn new(row_number: usize, message: impl Into<String>) -> Self {
        Self {
            row_number,
            message: message.into(),
        }
    }
}

// ==========================================
// ImportResult - 导入结果
// ==========================================
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    /// 运行 ID（日志追溯）
    pub run_id: String,
    /// 数据行总数（不含表头/空行）
    pub total_rows: usize,
    /// 新建记录
    pub created_records: Vec<Record>,
    /// 更新条数
    pub updated_count: usize,
    /// 跳过条数
    pub skipped_count: usize,
    /// 行级错误（按行号顺序）
    pub errors: Vec<RowError>,
    /// 外层事务是否已提交
    pub committed: bool,
    /// 是否整批拒绝（提交模式、非部分导入、error 策略且存在错误）
    pub rejected: bool,
    /// 耗时（毫秒）
    pub elapsed_ms: u64,
}

impl ImportResult {
    pub fn created_count(&self) -> usize {
        self.created_records.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
