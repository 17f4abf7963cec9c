// ==========================================
// 表格导入引擎 - 事务作用域
// ==========================================
// 职责: 外层事务（整批）+ 行级嵌套事务（savepoint）
// 约束:
// - 外层作用域必须存活到所有行级作用域结束（借用关系保证）
// - 行级回滚只撤销本行，不影响已提交到外层的其他行
// - 未显式结束的作用域在 drop 时回滚
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{Connection, Savepoint, Transaction};
use tracing::debug;

// ==========================================
// ImportTransaction - 外层事务
// ==========================================
pub struct ImportTransaction<'c> {
    tx: Option<Transaction<'c>>,
}

impl<'c> ImportTransaction<'c> {
    /// 开启外层事务
    pub fn begin(conn: &'c mut Connection) -> RepositoryResult<Self> {
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        debug!("外层事务已开启");
        Ok(Self { tx: Some(tx) })
    }

    /// 当前事务内的连接视图
    pub fn connection(&self) -> RepositoryResult<&Connection> {
        self.tx
            .as_ref()
            .map(|tx| &**tx)
            .ok_or_else(Self::finalized_error)
    }

    /// 开启行级嵌套事务
    pub fn begin_row(&mut self) -> RepositoryResult<RowTransaction<'_>> {
        let tx = self.tx.as_mut().ok_or_else(Self::finalized_error)?;
        let sp = tx
            .savepoint()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(RowTransaction { sp })
    }

    /// 是否已提交/回滚
    pub fn is_finalized(&self) -> bool {
        self.tx.is_none()
    }

    pub fn commit(&mut self) -> RepositoryResult<()> {
        let tx = self.tx.take().ok_or_else(Self::finalized_error)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        debug!("外层事务已提交");
        Ok(())
    }

    pub fn rollback(&mut self) -> RepositoryResult<()> {
        let tx = self.tx.take().ok_or_else(Self::finalized_error)?;
        tx.rollback()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        debug!("外层事务已回滚");
        Ok(())
    }

    fn finalized_error() -> RepositoryError {
        RepositoryError::DatabaseTransactionError("事务已结束".to_string())
    }
}

// ==========================================
// RowTransaction - 行级嵌套事务
// ==========================================
pub struct RowTransaction<'t> {
    sp: Savepoint<'t>,
}

impl RowTransaction<'_> {
    pub fn connection(&self) -> &Connection {
        &self.sp
    }

    /// 提交到外层事务（外层提交前仍不可见于其他连接）
    pub fn commit(self) -> RepositoryResult<()> {
        self.sp
            .commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    pub fn rollback(mut self) -> RepositoryResult<()> {
        self.sp
            .rollback()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }
}
