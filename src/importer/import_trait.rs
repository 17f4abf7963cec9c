// ==========================================
// 表格导入引擎 - 导入组件 Trait
// ==========================================
// 职责: 定义文件解析 / 单元格转换接口（不包含实现）
// ==========================================

use crate::domain::types::FieldType;
use crate::domain::value::{CellValue, FieldValue};
use crate::importer::error::{CoercionError, ImporterResult};

/// 单元格网格（已剔除空行，第一行为表头）
pub type Grid = Vec<Vec<CellValue>>;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 读取文件第一个工作表为单元格网格
// 实现者: ExcelParser, CsvParser
pub trait FileParser: Send + Sync {
    /// 解析文件内容为网格
    ///
    /// # 返回
    /// - Ok(Grid): 行列表（已剔除空行/全空白行）
    /// - Err: 文件格式错误
    fn parse_grid(&self, bytes: &[u8]) -> ImporterResult<Grid>;
}

// ==========================================
// ValueCoercer Trait
// ==========================================
// 用途: 按字段声明类型转换单个单元格值（纯函数，无副作用）
// 实现者: CellCoercer
pub trait ValueCoercer: Send + Sync {
    /// 转换单元格值
    ///
    /// # 返回
    /// - Ok(FieldValue): 转换结果（空值恒为 Null）
    /// - Err(CoercionError): 含原始值的错误说明
    fn coerce(&self, value: &CellValue, field_type: FieldType) -> Result<FieldValue, CoercionError>;
}
