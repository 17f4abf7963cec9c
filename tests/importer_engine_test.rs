// ==========================================
// 导入编排器集成测试
// ==========================================
// 范围: 文件解析 → 行预处理 → 去重 → 行级事务 → 提交/回滚（真实 SQLite 文件库）
// ==========================================

use sheet_importer::config::ImportSettings;
use sheet_importer::db::open_sqlite_connection;
use sheet_importer::domain::{FieldValue, ImportRequest, ImportStrategy, RunOptions};
use sheet_importer::importer::{ImportError, ImportOrchestrator};
use sheet_importer::repository::error::RepositoryError;

mod test_helpers;
use test_helpers::{
    count_rows, create_test_db, create_test_db_with, csv_bytes, mappings, query_text,
};

fn product_request(file: Vec<u8>) -> ImportRequest {
    ImportRequest::new(
        "product",
        mappings(&[
            ("Name", "title"),
            ("Qty", "quantity"),
            ("Price", "price"),
            ("Active", "active"),
            ("Released", "released"),
            ("Attrs", "attrs"),
            ("NationalId", "national_id"),
            ("Category", "category"),
        ]),
        file,
    )
    .with_file_name("products.csv")
}

#[test]
fn test_three_row_sheet_reports_bad_row_with_header_offset() {
    sheet_importer::logging::init_test();
    let (_temp_file, db_path) = create_test_db().unwrap();
    let mut conn = open_sqlite_connection(&db_path).unwrap();

    let file = csv_bytes(&[&["Name", "Qty"], &["Hammer", "3"], &["Saw", "abc"], &["Drill", "7"]]);
    let request = ImportRequest::new("product", mappings(&[("Name", "title"), ("Qty", "quantity")]), file)
        .with_strategy(ImportStrategy::Skip);

    let result = ImportOrchestrator::new(ImportSettings::default())
        .run(&mut conn, &request, RunOptions::commit(false))
        .unwrap();

    assert_eq!(result.total_rows, 3);
    assert_eq!(result.created_count(), 2);
    assert_eq!(result.error_count(), 1);
    assert_eq!(result.errors[0].row_number, 3);
    assert!(result.errors[0].message.contains("quantity"));
    assert!(result.errors[0].message.contains("abc"));
    assert!(result.committed);
    drop(conn);

    assert_eq!(count_rows(&db_path, "product").unwrap(), 2);
}

#[test]
fn test_every_field_type_through_pipeline() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let mut conn = open_sqlite_connection(&db_path).unwrap();

    let file = csv_bytes(&[
        &["Name", "Qty", "Price", "Active", "Released", "Attrs", "Category"],
        &["Hammer", "3", "12.5", "sí", "44197", r#""{""color"":""red""}""#, "CAT-G"],
    ]);
    let result = ImportOrchestrator::new(ImportSettings::default())
        .run(&mut conn, &product_request(file), RunOptions::commit(false))
        .unwrap();

    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    let record = &result.created_records[0];
    assert_eq!(record["quantity"], FieldValue::Integer(3));
    assert_eq!(record["price"], FieldValue::Float(12.5));
    assert_eq!(record["active"], FieldValue::Boolean(true));
    assert_eq!(record["released"].to_string(), "2021-01-01T00:00:00.000Z");
    assert_eq!(record["attrs"], FieldValue::Json(serde_json::json!({"color": "red"})));
    // sku 回退查找命中 Garden
    assert_eq!(record["category"], FieldValue::Integer(2));
    drop(conn);

    assert_eq!(
        query_text(&db_path, "SELECT released FROM product").unwrap(),
        Some("2021-01-01T00:00:00.000Z".to_string())
    );
}

#[test]
fn test_duplicate_rows_update_same_record_via_cache() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let mut conn = open_sqlite_connection(&db_path).unwrap();

    let file = csv_bytes(&[
        &["Name", "NationalId"],
        &["First", "ID-1"],
        &["Second", "ID-1"],
    ]);
    let request = product_request(file)
        .with_identifier("national_id")
        .with_strategy(ImportStrategy::Update);

    let result = ImportOrchestrator::new(ImportSettings::default())
        .run(&mut conn, &request, RunOptions::commit(false))
        .unwrap();

    assert_eq!(result.created_count(), 1);
    assert_eq!(result.updated_count, 1);
    assert!(result.errors.is_empty());
    drop(conn);

    assert_eq!(count_rows(&db_path, "product").unwrap(), 1);
    assert_eq!(
        query_text(&db_path, "SELECT title FROM product WHERE national_id = 'ID-1'").unwrap(),
        Some("Second".to_string())
    );
}

#[test]
fn test_validation_run_rolls_back_everything() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let mut conn = open_sqlite_connection(&db_path).unwrap();

    let file = csv_bytes(&[
        &["Name", "Qty"],
        &["A", "1"],
        &["B", "2"],
        &["C", "x"],
        &["D", "4"],
        &["E", "5"],
        &["F", "6.5"],
        &["G", "7"],
    ]);
    let result = ImportOrchestrator::new(ImportSettings::default())
        .run(&mut conn, &product_request(file), RunOptions::validation())
        .unwrap();

    assert_eq!(result.created_count(), 5);
    assert_eq!(result.error_count(), 2);
    assert_eq!(result.errors[0].row_number, 4);
    assert_eq!(result.errors[1].row_number, 7);
    assert!(!result.committed);
    drop(conn);

    assert_eq!(count_rows(&db_path, "product").unwrap(), 0);
}

#[test]
fn test_error_strategy_without_partial_persists_nothing() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let mut conn = open_sqlite_connection(&db_path).unwrap();

    let file = csv_bytes(&[
        &["Name", "NationalId"],
        &["First", "ID-1"],
        &["Again", "ID-1"],
        &["Other", "ID-2"],
    ]);
    let request = product_request(file).with_identifier("national_id");

    let result = ImportOrchestrator::new(ImportSettings::default())
        .run(&mut conn, &request, RunOptions::commit(false))
        .unwrap();

    assert_eq!(result.error_count(), 1);
    assert_eq!(result.errors[0].row_number, 3);
    assert!(result.errors[0].message.contains("national_id"));
    assert!(result.rejected);
    assert!(!result.committed);
    drop(conn);

    assert_eq!(count_rows(&db_path, "product").unwrap(), 0);
}

#[test]
fn test_unknown_relation_and_unmapped_columns() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let mut conn = open_sqlite_connection(&db_path).unwrap();

    let file = csv_bytes(&[
        &["Name", "Category", "Comment"],
        &["Hammer", "Tools", "ignored"],
        &["Rake", "Kitchen", "ignored"],
    ]);
    let request = product_request(file).with_strategy(ImportStrategy::Skip);

    let result = ImportOrchestrator::new(ImportSettings::default())
        .run(&mut conn, &request, RunOptions::commit(true))
        .unwrap();

    assert_eq!(result.created_count(), 1);
    assert_eq!(result.created_records[0]["category"], FieldValue::Integer(1));
    assert_eq!(result.error_count(), 1);
    assert!(result.errors[0].message.contains("Kitchen"));
    assert!(result.errors[0].message.contains("category"));
}

#[test]
fn test_run_fatal_errors() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let mut conn = open_sqlite_connection(&db_path).unwrap();
    let orchestrator = ImportOrchestrator::new(ImportSettings::default());

    let header_only = product_request(csv_bytes(&[&["Name", "Qty"], &[",", ""]]));
    assert!(matches!(
        orchestrator.run(&mut conn, &header_only, RunOptions::validation()),
        Err(ImportError::EmptySheet)
    ));

    let mut unknown = product_request(csv_bytes(&[&["Name"], &["Hammer"]]));
    unknown.collection = "supplier".to_string();
    assert!(matches!(
        orchestrator.run(&mut conn, &unknown, RunOptions::validation()),
        Err(ImportError::UnknownCollection(_))
    ));

    let pdf = product_request(b"%PDF-1.4".to_vec()).with_file_name("products.pdf");
    assert!(matches!(
        orchestrator.run(&mut conn, &pdf, RunOptions::validation()),
        Err(ImportError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_later_rows_see_earlier_uncommitted_rows() {
    let (_temp_file, db_path) = create_test_db_with(
        "CREATE TABLE emp (
             id INTEGER PRIMARY KEY,
             name TEXT NOT NULL,
             boss REFERENCES emp(id)
         );",
    )
    .unwrap();
    let mut conn = open_sqlite_connection(&db_path).unwrap();

    let file = csv_bytes(&[&["Name", "Boss"], &["Ann", ""], &["Bob", "Ann"]]);
    let request = ImportRequest::new("emp", mappings(&[("Name", "name"), ("Boss", "boss")]), file);
    let orchestrator = ImportOrchestrator::new(ImportSettings::default());

    // 第 3 行按 name 找到第 2 行刚写入（尚未提交）的记录
    let result = orchestrator
        .run(&mut conn, &request, RunOptions::validation())
        .unwrap();
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    assert_eq!(result.created_count(), 2);
    assert_eq!(result.created_records[1]["boss"], FieldValue::Integer(1));
    assert_eq!(count_rows(&db_path, "emp").unwrap(), 0);

    let result = orchestrator
        .run(&mut conn, &request, RunOptions::commit(false))
        .unwrap();
    assert!(result.committed);
    drop(conn);

    assert_eq!(
        query_text(&db_path, "SELECT CAST(boss AS TEXT) FROM emp WHERE name = 'Bob'").unwrap(),
        Some("1".to_string())
    );
}

#[test]
fn test_outer_commit_failure_rolls_back_and_surfaces() {
    let (_temp_file, db_path) = create_test_db_with(
        "CREATE TABLE owner (id INTEGER PRIMARY KEY, name TEXT);
         CREATE TABLE note (
             id INTEGER PRIMARY KEY,
             body TEXT NOT NULL,
             owner INTEGER DEFAULT 99 REFERENCES owner(id) DEFERRABLE INITIALLY DEFERRED
         );",
    )
    .unwrap();
    let mut conn = open_sqlite_connection(&db_path).unwrap();

    // owner 未映射，默认值 99 违反延迟外键，直到外层提交才报错
    let file = csv_bytes(&[&["Body"], &["first"], &["second"]]);
    let request = ImportRequest::new("note", mappings(&[("Body", "body")]), file);
    let orchestrator = ImportOrchestrator::new(ImportSettings::default());

    let validated = orchestrator
        .run(&mut conn, &request, RunOptions::validation())
        .unwrap();
    assert_eq!(validated.created_count(), 2);
    assert!(validated.errors.is_empty());
    assert!(!validated.committed);

    let committed = orchestrator.run(&mut conn, &request, RunOptions::commit(false));
    assert!(matches!(
        committed,
        Err(ImportError::Repository(RepositoryError::DatabaseTransactionError(_)))
    ));
    drop(conn);

    assert_eq!(count_rows(&db_path, "note").unwrap(), 0);
}

#[test]
fn test_unexpected_error_mid_run_by_mode() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let mut conn = open_sqlite_connection(&db_path).unwrap();
    // 触发器回滚整个外层事务，本行的 savepoint 随之失效
    conn.execute_batch(
        "CREATE TRIGGER product_guard BEFORE INSERT ON product
         WHEN NEW.title = 'boom'
         BEGIN
             SELECT RAISE(ROLLBACK, 'guard tripped');
         END;",
    )
    .unwrap();

    let file = csv_bytes(&[&["Name"], &["Hammer"], &["boom"], &["Drill"]]);
    let request = ImportRequest::new("product", mappings(&[("Name", "title")]), file)
        .with_strategy(ImportStrategy::Skip);
    let orchestrator = ImportOrchestrator::new(ImportSettings::default());

    // 仅校验: 不返回 Err，意外错误按当前行记入报告
    let validated = orchestrator
        .run(&mut conn, &request, RunOptions::validation())
        .unwrap();
    assert_eq!(validated.error_count(), 1);
    assert_eq!(validated.errors[0].row_number, 3);
    assert!(validated.errors[0].message.contains("数据库事务失败"));
    assert!(!validated.committed);

    // 提交模式: 直接返回 Err，已写入的行一并撤销
    let committed = orchestrator.run(&mut conn, &request, RunOptions::commit(true));
    assert!(matches!(committed, Err(ImportError::Repository(_))));
    drop(conn);

    assert_eq!(count_rows(&db_path, "product").unwrap(), 0);
}

#[test]
fn test_excel_workbook_import_reads_first_sheet() {
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    let (_temp_file, db_path) = create_test_db().unwrap();
    let mut conn = open_sqlite_connection(&db_path).unwrap();

    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let released = ExcelDateTime::from_ymd(2021, 1, 1).unwrap();
    let sheet = workbook.add_worksheet().set_name("Products").unwrap();
    sheet.write_string(0, 0, "Name").unwrap();
    sheet.write_string(0, 1, "Qty").unwrap();
    sheet.write_string(0, 2, "Released").unwrap();
    sheet.write_string(1, 0, "Hammer").unwrap();
    sheet.write_number(1, 1, 3).unwrap();
    sheet
        .write_datetime_with_format(1, 2, &released, &date_format)
        .unwrap();
    sheet.write_string(2, 0, "Saw").unwrap();
    sheet.write_number(2, 1, 4).unwrap();
    let archive = workbook.add_worksheet().set_name("Archive").unwrap();
    archive.write_string(0, 0, "Name").unwrap();
    archive.write_string(1, 0, "Old").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let request = ImportRequest::new(
        "product",
        mappings(&[("Name", "title"), ("Qty", "quantity"), ("Released", "released")]),
        bytes,
    )
    .with_file_name("products.xlsx");

    let result = ImportOrchestrator::new(ImportSettings::default())
        .run(&mut conn, &request, RunOptions::commit(false))
        .unwrap();

    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    assert_eq!(result.total_rows, 2);
    assert_eq!(result.created_records[0]["quantity"], FieldValue::Integer(3));
    assert_eq!(
        result.created_records[0]["released"].to_string(),
        "2021-01-01T00:00:00.000Z"
    );
    drop(conn);

    assert_eq!(
        query_text(&db_path, "SELECT group_concat(title) FROM product").unwrap(),
        Some("Hammer,Saw".to_string())
    );
}

#[test]
fn test_relation_to_unique_column_stores_that_column() {
    let (_temp_file, db_path) = create_test_db_with(
        "CREATE TABLE region (id INTEGER PRIMARY KEY, code TEXT NOT NULL UNIQUE, name TEXT);
         INSERT INTO region (id, code, name) VALUES (1, 'N-1', 'North');
         INSERT INTO region (id, code, name) VALUES (2, 'S-1', 'South');
         CREATE TABLE store (
             id INTEGER PRIMARY KEY,
             title TEXT NOT NULL,
             region_code TEXT REFERENCES region(code)
         );",
    )
    .unwrap();
    let mut conn = open_sqlite_connection(&db_path).unwrap();

    let file = csv_bytes(&[&["Store", "Region"], &["Depot", "North"], &["Outlet", "S-1"]]);
    let request = ImportRequest::new(
        "store",
        mappings(&[("Store", "title"), ("Region", "region_code")]),
        file,
    );

    let result = ImportOrchestrator::new(ImportSettings::default())
        .run(&mut conn, &request, RunOptions::commit(false))
        .unwrap();

    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    assert_eq!(result.created_records[0]["region_code"], FieldValue::Text("N-1".to_string()));
    assert_eq!(result.created_records[1]["region_code"], FieldValue::Text("S-1".to_string()));
    drop(conn);

    assert_eq!(
        query_text(&db_path, "SELECT group_concat(region_code) FROM store").unwrap(),
        Some("N-1,S-1".to_string())
    );
}
