// ==========================================
// 表格导入引擎 - 文件解析器实现
// ==========================================
// 阶段 0: 文件读取与解析（只读第一个工作表）
// 支持: Excel (.xlsx/.xls/.ods) / CSV (.csv)
// ==========================================

use crate::domain::value::CellValue;
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::import_trait::{FileParser, Grid};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use std::io::Cursor;
use std::path::Path;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// 文本单元格（去首尾空白，空串视为空单元格）
fn text_cell(value: &str) -> CellValue {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(trimmed.to_string())
    }
}

/// 追加一行（跳过完全空白的行）
fn push_row(grid: &mut Grid, row: Vec<CellValue>) {
    if row.iter().all(CellValue::is_blank) {
        return;
    }
    grid.push(row);
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_grid(&self, bytes: &[u8]) -> ImporterResult<Grid> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = ReaderBuilder::new()
            .has_headers(false) // 表头由调用方处理
            .flexible(true) // 允许行长度不一致
            .from_reader(bytes);

        let mut grid = Vec::new();
        for result in reader.records() {
            let record = result?;
            push_row(&mut grid, record.iter().map(text_cell).collect());
        }

        Ok(grid)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl ExcelParser {
    fn convert_cell(cell: &Data) -> CellValue {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::String(s) => text_cell(s),
            // Excel 数值统一以浮点存储，整数值还原为整数
            Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => CellValue::Int(*f as i64),
            Data::Float(f) => CellValue::Float(*f),
            Data::Int(i) => CellValue::Int(*i),
            Data::Bool(b) => CellValue::Bool(*b),
            // 日期单元格保留序列号，由单元格转换器按序列号规则处理
            Data::DateTime(dt) => CellValue::Float(dt.as_f64()),
            Data::DateTimeIso(s) => text_cell(s),
            Data::DurationIso(s) => text_cell(s),
            Data::Error(e) => CellValue::Text(e.to_string()),
        }
    }
}

impl FileParser for ExcelParser {
    fn parse_grid(&self, bytes: &[u8]) -> ImporterResult<Grid> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        // 读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut grid = Vec::new();
        for data_row in range.rows() {
            push_row(&mut grid, data_row.iter().map(Self::convert_cell).collect());
        }

        Ok(grid)
    }
}

// ==========================================
// 通用文件解析器（按扩展名或文件头自动选择）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Excel,
    Csv,
}

pub struct UniversalFileParser;

impl UniversalFileParser {
    /// 判断文件格式
    ///
    /// # 规则
    /// 1. 有扩展名时按扩展名判断，未知扩展名报错
    /// 2. 无扩展名时按文件头判断（ZIP/OLE2 → Excel，其余 → CSV）
    pub fn detect_format(&self, bytes: &[u8], file_name: Option<&str>) -> ImporterResult<SheetFormat> {
        let ext = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("xlsx") | Some("xlsm") | Some("xlsb") | Some("xls") | Some("ods") => {
                Ok(SheetFormat::Excel)
            }
            Some("csv") | Some("txt") => Ok(SheetFormat::Csv),
            Some(other) => Err(ImportError::UnsupportedFormat(other.to_string())),
            None if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) => {
                Ok(SheetFormat::Excel)
            }
            None => Ok(SheetFormat::Csv),
        }
    }

    pub fn parse(&self, bytes: &[u8], file_name: Option<&str>) -> ImporterResult<Grid> {
        match self.detect_format(bytes, file_name)? {
            SheetFormat::Excel => ExcelParser.parse_grid(bytes),
            SheetFormat::Csv => CsvParser.parse_grid(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_parser_valid_content() {
        let content = "Name,Qty\nHammer, 3 \nSaw,5\n";
        let grid = CsvParser.parse_grid(content.as_bytes()).unwrap();

        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0][0], CellValue::Text("Name".to_string()));
        assert_eq!(grid[1][1], CellValue::Text("3".to_string()));
    }

    #[test]
    fn test_csv_parser_skip_blank_rows() {
        let content = "Name,Qty\nHammer,3\n,\n  ,  \nSaw,5\n";
        let grid = CsvParser.parse_grid(content.as_bytes()).unwrap();

        // 应跳过空行
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[2][0], CellValue::Text("Saw".to_string()));
    }

    #[test]
    fn test_csv_parser_strips_bom_and_keeps_short_rows() {
        let mut content = UTF8_BOM.to_vec();
        content.extend_from_slice("Name,Qty\nHammer\n".as_bytes());
        let grid = CsvParser.parse_grid(&content).unwrap();

        assert_eq!(grid[0][0], CellValue::Text("Name".to_string()));
        assert_eq!(grid[1].len(), 1);
    }

    #[test]
    fn test_detect_format() {
        let parser = UniversalFileParser;
        assert_eq!(parser.detect_format(b"", Some("data.XLSX")).unwrap(), SheetFormat::Excel);
        assert_eq!(parser.detect_format(b"", Some("data.csv")).unwrap(), SheetFormat::Csv);
        assert_eq!(parser.detect_format(b"PK\x03\x04rest", None).unwrap(), SheetFormat::Excel);
        assert_eq!(parser.detect_format(b"a,b\n1,2", None).unwrap(), SheetFormat::Csv);
        assert!(matches!(
            parser.detect_format(b"", Some("report.pdf")),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_excel_parser_rejects_corrupt_file() {
        let result = UniversalFileParser.parse(b"PK\x03\x04not a workbook", Some("broken.xlsx"));
        assert!(matches!(result, Err(ImportError::ExcelParseError(_))));
    }

    #[test]
    fn test_excel_cell_conversion() {
        assert_eq!(ExcelParser::convert_cell(&Data::Float(12.0)), CellValue::Int(12));
        assert_eq!(ExcelParser::convert_cell(&Data::Float(12.5)), CellValue::Float(12.5));
        assert_eq!(ExcelParser::convert_cell(&Data::String("  ".to_string())), CellValue::Empty);
        assert_eq!(ExcelParser::convert_cell(&Data::Bool(true)), CellValue::Bool(true));
    }

    fn two_sheet_workbook() -> Vec<u8> {
        use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

        let mut workbook = Workbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let released = ExcelDateTime::from_ymd(2021, 1, 1).unwrap();

        let first = workbook.add_worksheet().set_name("Products").unwrap();
        first.write_string(0, 0, "Name").unwrap();
        first.write_string(0, 1, "Released").unwrap();
        first.write_string(0, 2, "Price").unwrap();
        first.write_string(1, 0, " Hammer ").unwrap();
        first
            .write_datetime_with_format(1, 1, &released, &date_format)
            .unwrap();
        first.write_number(1, 2, 12.5).unwrap();
        first.write_boolean(2, 0, true).unwrap();
        first.write_number(2, 2, 7).unwrap();

        let second = workbook.add_worksheet().set_name("Archive").unwrap();
        second.write_string(0, 0, "Ignored").unwrap();

        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_excel_parser_reads_first_sheet() {
        let grid = UniversalFileParser
            .parse(&two_sheet_workbook(), Some("products.xlsx"))
            .unwrap();

        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0][0], CellValue::Text("Name".to_string()));
        assert_eq!(grid[1][0], CellValue::Text("Hammer".to_string()));
        // 日期单元格 → 序列号
        assert_eq!(grid[1][1], CellValue::Float(44197.0));
        assert_eq!(grid[1][2], CellValue::Float(12.5));
        assert_eq!(grid[2][0], CellValue::Bool(true));
        assert_eq!(grid[2][2], CellValue::Int(7));
    }

    #[test]
    fn test_excel_detected_by_magic_without_file_name() {
        let grid = UniversalFileParser.parse(&two_sheet_workbook(), None).unwrap();
        assert_eq!(grid[0][1], CellValue::Text("Released".to_string()));
    }
}
