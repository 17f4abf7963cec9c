// ==========================================
// 表格导入引擎 - 命令行入口
// ==========================================
// 用法:
//   sheet-importer <request.json> [--validate] [--partial]
//
// request.json:
//   { "collection": "product",
//     "mappings": { "Name": "title", "Qty": "quantity" },
//     "file": "products.xlsx",
//     "identifierField": "sku",     (可选)
//     "strategy": "update" }        (可选: error / skip / update)
//
// 数据库路径: 环境变量 SHEET_IMPORTER_DB_PATH，否则使用用户数据目录
// ==========================================

use anyhow::{bail, Context, Result};
use sheet_importer::api::{ApiError, ImportApi, ImportPayload};
use sheet_importer::{db, logging};

struct CliArgs {
    request_path: String,
    validate: bool,
    partial: bool,
}

fn parse_args() -> Result<CliArgs> {
    let mut request_path = None;
    let mut validate = false;
    let mut partial = false;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--validate" => validate = true,
            "--partial" => partial = true,
            flag if flag.starts_with("--") => bail!("未知参数: {}", flag),
            path => {
                if request_path.replace(path.to_string()).is_some() {
                    bail!("只能指定一个请求文件");
                }
            }
        }
    }

    let Some(request_path) = request_path else {
        bail!("用法: sheet-importer <request.json> [--validate] [--partial]");
    };

    Ok(CliArgs {
        request_path,
        validate,
        partial,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args = parse_args()?;

    tracing::info!("==================================================");
    tracing::info!("{} v{}", sheet_importer::APP_NAME, sheet_importer::VERSION);
    tracing::info!("==================================================");

    let db_path = db::default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let raw = tokio::fs::read_to_string(&args.request_path)
        .await
        .with_context(|| format!("读取请求文件失败: {}", args.request_path))?;
    let payload: ImportPayload =
        serde_json::from_str(&raw).with_context(|| format!("请求文件格式错误: {}", args.request_path))?;

    let api = ImportApi::new(db_path);
    let request = api.build_request(payload).await?;

    let output = if args.validate {
        serde_json::to_string_pretty(&api.validate(request).await?)?
    } else {
        match api.import(request, args.partial).await {
            Ok(response) => serde_json::to_string_pretty(&response)?,
            Err(ApiError::ImportRejected { errors }) => {
                println!("{}", serde_json::to_string_pretty(&errors)?);
                bail!("导入被拒绝: {} 条行级错误，未写入任何数据", errors.len());
            }
            Err(e) => return Err(e.into()),
        }
    };

    println!("{}", output);
    Ok(())
}
