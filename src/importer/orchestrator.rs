// ==========================================
// 表格导入引擎 - 导入编排器
// ==========================================
// 流程: 解析 → 结构校验 → 外层事务 → 逐行(预处理 → 去重 → 行级事务落库) → 提交/回滚
// 行状态机:
//   PREPARED → REJECTED | DUPLICATE_CHECK
//   DUPLICATE_CHECK → CREATE | RESOLVE(已有主键)
//   RESOLVE → ERRORED | SKIPPED | UPDATED
//   CREATE → CREATED
// 红线:
// - 行严格顺序处理（后续行依赖前序行写入的缓存与事务视图）
// - 外层事务只在循环结束后提交一次
// - 仅校验模式无论结果如何都回滚
// ==========================================

use crate::config::ImportSettings;
use crate::domain::import::{ImportRequest, ImportResult, RowError, RunOptions};
use crate::domain::schema::{CollectionSchema, SchemaOverview};
use crate::domain::types::ImportStrategy;
use crate::domain::value::{CellValue, FieldValue, Record};
use crate::importer::cell_coercer::CellCoercer;
use crate::importer::duplicate_tracker::DuplicateTracker;
use crate::importer::error::{FieldError, ImportError, ImporterResult};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::import_trait::{Grid, ValueCoercer};
use crate::importer::row_preparer::RowPreparer;
use crate::repository::error::RepositoryError;
use crate::repository::item_repo::ItemRepository;
use crate::repository::item_repo_impl::SqliteItemRepository;
use crate::repository::schema_repo::{SchemaCatalog, SqliteSchemaCatalog};
use crate::repository::transaction::ImportTransaction;
use rusqlite::Connection;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 数据行号偏移（表头占第 1 行，数据从第 2 行开始）
const ROW_NUMBER_OFFSET: usize = 2;

/// 行级终态（落库成功的三种情况）
#[derive(Debug, Clone, PartialEq)]
enum RowOutcome {
    Created(FieldValue),
    Updated,
    Skipped,
}

/// 单次运行的可变状态（运行开始时创建，结束即丢弃）
struct RunState {
    result: ImportResult,
    tracker: DuplicateTracker,
    current_row: usize,
}

/// 单次运行的只读上下文
struct RunContext<'a> {
    overview: &'a SchemaOverview,
    schema: &'a CollectionSchema,
    headers: &'a [String],
    request: &'a ImportRequest,
}

// ==========================================
// ImportOrchestrator - 导入编排器
// ==========================================
pub struct ImportOrchestrator {
    settings: ImportSettings,
    parser: UniversalFileParser,
    preparer: RowPreparer,
}

impl ImportOrchestrator {
    pub fn new(settings: ImportSettings) -> Self {
        Self::with_coercer(settings, Box::new(CellCoercer))
    }

    /// 使用自定义单元格转换器
    pub fn with_coercer(settings: ImportSettings, coercer: Box<dyn ValueCoercer>) -> Self {
        Self {
            settings,
            parser: UniversalFileParser,
            preparer: RowPreparer::new(coercer),
        }
    }

    /// 执行一次导入（解析文件后进入逐行流程）
    ///
    /// # 参数
    /// - conn: 数据库连接（运行期间独占）
    /// - request: 导入请求
    /// - options: 运行模式（仅校验 / 提交，是否允许部分成功）
    ///
    /// # 返回
    /// - Ok(ImportResult): 运行报告（行级错误在报告中）
    /// - Err(ImportError): 运行级错误（文件/空表/未知集合），或提交模式下的意外错误
    pub fn run(
        &self,
        conn: &mut Connection,
        request: &ImportRequest,
        options: RunOptions,
    ) -> ImporterResult<ImportResult> {
        let grid = self
            .parser
            .parse(&request.file_bytes, request.file_name.as_deref())?;
        self.run_grid(conn, request, grid, options)
    }

    /// 对已解析的网格执行导入
    #[instrument(
        skip(self, conn, request, grid),
        fields(collection = %request.collection, strategy = %request.strategy, run_id)
    )]
    pub fn run_grid(
        &self,
        conn: &mut Connection,
        request: &ImportRequest,
        grid: Grid,
        options: RunOptions,
    ) -> ImporterResult<ImportResult> {
        let start_time = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        info!(
            validation_only = options.validation_only,
            allow_partial = options.allow_partial,
            "开始导入"
        );

        // === 步骤 1: 表头与数据行 ===
        let mut rows = grid
            .into_iter()
            .filter(|row| !row.iter().all(CellValue::is_blank));
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect(),
            None => return Err(ImportError::EmptySheet),
        };
        let data_rows: Vec<Vec<CellValue>> = rows.collect();
        if data_rows.is_empty() {
            return Err(ImportError::EmptySheet);
        }
        let max_rows = self.settings.max_data_rows;
        if max_rows > 0 && data_rows.len() > max_rows {
            return Err(ImportError::TooManyRows {
                rows: data_rows.len(),
                max: max_rows,
            });
        }

        // === 步骤 2: 目标集合结构 ===
        let overview = SqliteSchemaCatalog::new(conn).load_overview()?;
        let schema = overview
            .collection(&request.collection)
            .ok_or_else(|| ImportError::UnknownCollection(request.collection.clone()))?;
        debug!(rows = data_rows.len(), fields = schema.fields.len(), "结构加载完成");

        // === 步骤 3: 外层事务（仅校验模式同样开启，结束时回滚）===
        let mut tx = ImportTransaction::begin(conn)?;

        let ctx = RunContext {
            overview: &overview,
            schema,
            headers: &headers,
            request,
        };
        let mut state = RunState {
            result: ImportResult {
                run_id,
                total_rows: data_rows.len(),
                ..ImportResult::default()
            },
            tracker: DuplicateTracker::new(request.identifier_field.clone()),
            current_row: 0,
        };

        // === 步骤 4/5: 逐行处理 + 结束 ===
        let outcome = self
            .process_rows(&mut tx, &ctx, &data_rows, &mut state)
            .and_then(|()| self.finalize(&mut tx, &ctx, options, &mut state.result));

        if let Err(e) = outcome {
            if !tx.is_finalized() {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "外层事务回滚失败");
                }
            }
            if !options.validation_only {
                warn!(error = %e, "导入意外中止，已回滚");
                return Err(e);
            }
            warn!(row = state.current_row, error = %e, "校验过程中出现意外错误");
            state
                .result
                .errors
                .push(RowError::new(state.current_row, e.to_string()));
            state.result.committed = false;
        }

        let mut result = state.result;
        result.elapsed_ms = start_time.elapsed().as_millis() as u64;

        info!(
            total_rows = result.total_rows,
            created = result.created_count(),
            updated = result.updated_count,
            skipped = result.skipped_count,
            errors = result.error_count(),
            cache_hits = state.tracker.cache_hits(),
            committed = result.committed,
            rejected = result.rejected,
            elapsed_ms = result.elapsed_ms,
            "导入结束"
        );

        Ok(result)
    }

    /// 逐行处理（行级业务错误记入报告，意外错误向上返回）
    fn process_rows(
        &self,
        tx: &mut ImportTransaction<'_>,
        ctx: &RunContext<'_>,
        data_rows: &[Vec<CellValue>],
        state: &mut RunState,
    ) -> ImporterResult<()> {
        for (idx, row) in data_rows.iter().enumerate() {
            let row_number = idx + ROW_NUMBER_OFFSET;
            state.current_row = row_number;

            // a. 预处理
            let (prepared, lookup) = {
                let repo = SqliteItemRepository::new(tx.connection()?, ctx.overview);
                let prepared = self.preparer.prepare(
                    &repo,
                    ctx.overview,
                    ctx.schema,
                    ctx.headers,
                    &ctx.request.mappings,
                    row,
                );
                if !prepared.is_valid() {
                    for error in &prepared.errors {
                        warn!(row = row_number, error = %error, "行预处理失败");
                        state
                            .result
                            .errors
                            .push(RowError::new(row_number, error.to_string()));
                    }
                    continue;
                }

                // b. 重复检测
                let lookup = state.tracker.lookup(
                    &repo,
                    &ctx.schema.name,
                    &ctx.schema.primary_key,
                    &prepared.record,
                );
                (prepared, lookup)
            };

            let existing = match lookup {
                Ok(existing) => existing,
                Err(e) => {
                    let message = self.normalize_persistence_error(&e);
                    warn!(row = row_number, error = %message, "重复检测失败");
                    state.result.errors.push(RowError::new(row_number, message));
                    continue;
                }
            };

            // c. 行级事务
            let record = prepared.record;
            let row_tx = tx.begin_row()?;
            let applied = {
                let repo = SqliteItemRepository::new(row_tx.connection(), ctx.overview);
                self.apply_row(&repo, ctx, &state.tracker, existing, &record)
            };

            match applied {
                Ok(outcome) => {
                    row_tx.commit()?;
                    debug!(row = row_number, outcome = ?outcome, "行处理完成");
                    match outcome {
                        RowOutcome::Created(key) => {
                            state.tracker.register(&record, key);
                            state.result.created_records.push(record);
                        }
                        RowOutcome::Updated => state.result.updated_count += 1,
                        RowOutcome::Skipped => state.result.skipped_count += 1,
                    }
                }
                // d. 行级失败只回滚本行
                Err(message) => {
                    row_tx.rollback()?;
                    warn!(row = row_number, error = %message, "行落库失败，已回滚本行");
                    state.result.errors.push(RowError::new(row_number, message));
                }
            }
        }

        Ok(())
    }

    /// 在行级事务内按策略落库
    ///
    /// # 返回
    /// - Ok(RowOutcome): 新建 / 更新 / 跳过
    /// - Err(String): 已归一化的行级错误信息
    fn apply_row(
        &self,
        repo: &dyn ItemRepository,
        ctx: &RunContext<'_>,
        tracker: &DuplicateTracker,
        existing: Option<FieldValue>,
        record: &Record,
    ) -> Result<RowOutcome, String> {
        let collection = ctx.schema.name.as_str();

        let Some(key) = existing else {
            return repo
                .create_one(collection, record)
                .map(RowOutcome::Created)
                .map_err(|e| self.normalize_persistence_error(&e));
        };

        match ctx.request.strategy {
            ImportStrategy::Error => {
                let field = tracker.identifier_field().unwrap_or_default().to_string();
                let value = tracker
                    .identity_of(record)
                    .map(FieldValue::to_string)
                    .unwrap_or_default();
                Err(FieldError::Duplicate { field, value }.to_string())
            }
            ImportStrategy::Skip => Ok(RowOutcome::Skipped),
            ImportStrategy::Update => repo
                .update_one(collection, &key, record)
                .map(|()| RowOutcome::Updated)
                .map_err(|e| self.normalize_persistence_error(&e)),
        }
    }

    /// 结束外层事务
    ///
    /// # 规则
    /// 1. 仅校验: 无条件回滚
    /// 2. 提交模式 + 非部分导入 + error 策略 + 存在行级错误: 回滚并标记整批拒绝
    /// 3. 其他: 提交
    fn finalize(
        &self,
        tx: &mut ImportTransaction<'_>,
        ctx: &RunContext<'_>,
        options: RunOptions,
        result: &mut ImportResult,
    ) -> ImporterResult<()> {
        if options.validation_only {
            tx.rollback()?;
            debug!("仅校验模式，外层事务已回滚");
            return Ok(());
        }

        let reject = !options.allow_partial
            && ctx.request.strategy == ImportStrategy::Error
            && result.has_errors();
        if reject {
            tx.rollback()?;
            result.rejected = true;
            warn!(errors = result.error_count(), "存在行级错误，整批拒绝并回滚");
            return Ok(());
        }

        tx.commit()?;
        result.committed = true;
        Ok(())
    }

    /// 去掉持久层错误的固定前缀
    fn normalize_persistence_error(&self, err: &RepositoryError) -> String {
        let message = err.to_string();
        let prefix = self.settings.persistence_error_prefix.as_str();
        match message.strip_prefix(prefix) {
            Some(stripped) if !prefix.is_empty() => stripped.to_string(),
            _ => message,
        }
    }
}
