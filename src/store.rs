//! Sled-backed persistence for the approval ledger
//!
//! Three trees: `timesheets` (id -> CBOR), `approvals`
//! ("timesheet_id/project_id" -> CBOR) and `history` (content hash -> CBOR).
//! One logical operation collects its writes into a [`WriteSet`] and commits
//! them through the configured [`TransactionPolicy`].

use std::sync::Arc;

use sled::transaction::{ConflictableTransactionResult, Transactional};
use sled::{Batch, Tree};

use crate::error::ApprovalError;
use crate::history::ApprovalHistory;
use crate::model::{Day, ProjectApproval, Timesheet};

/// How a call's writes reach the trees.
///
/// `Atomic` wraps all three trees in one sled transaction; on failure the
/// call rolls back and no partial mutation is observable. `BestEffort`
/// applies per-tree batches sequentially for deployments without
/// transactional guarantees — this weakens the at-most-one-writer
/// guarantee and is an explicit configuration choice, never a hidden flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionPolicy {
    #[default]
    Atomic,
    BestEffort,
}

/// The pending writes of one logical operation, one batch per tree.
#[derive(Default)]
pub struct WriteSet {
    timesheets: Batch,
    approvals: Batch,
    history: Batch,
}

impl WriteSet {
    pub fn put_timesheet(&mut self, timesheet: &Timesheet) -> Result<(), ApprovalError> {
        self.timesheets
            .insert(timesheet.id.as_bytes(), encode(timesheet)?);
        Ok(())
    }

    pub fn put_approval(&mut self, record: &ProjectApproval) -> Result<(), ApprovalError> {
        self.approvals
            .insert(record.key().as_bytes(), encode(record)?);
        Ok(())
    }

    pub fn put_history(&mut self, row: &ApprovalHistory) -> Result<(), ApprovalError> {
        let (hash, cbor) = row.build()?;
        self.history.insert(hash.as_bytes(), cbor);
        Ok(())
    }
}

pub struct LedgerStore {
    db: Arc<sled::Db>,
    timesheets: Tree,
    approvals: Tree,
    history: Tree,
}

impl LedgerStore {
    pub fn open(db: Arc<sled::Db>) -> Result<Self, ApprovalError> {
        Ok(Self {
            timesheets: db.open_tree("timesheets")?,
            approvals: db.open_tree("approvals")?,
            history: db.open_tree("history")?,
            db,
        })
    }

    /// Load a timesheet, treating soft-deleted records as absent.
    pub fn timesheet(&self, timesheet_id: &str) -> Result<Timesheet, ApprovalError> {
        let bytes = self
            .timesheets
            .get(timesheet_id.as_bytes())?
            .ok_or_else(|| ApprovalError::not_found("timesheet", timesheet_id))?;
        let timesheet: Timesheet = decode(&bytes)?;

        if timesheet.deleted_at.is_some() {
            return Err(ApprovalError::not_found("timesheet", timesheet_id));
        }
        Ok(timesheet)
    }

    /// Direct single-record write, for the external timesheet lifecycle
    /// (soft-delete markers land through here).
    pub fn put_timesheet(&self, timesheet: &Timesheet) -> Result<(), ApprovalError> {
        self.timesheets
            .insert(timesheet.id.as_bytes(), encode(timesheet)?)?;
        Ok(())
    }

    pub fn approval(
        &self,
        timesheet_id: &str,
        project_id: &str,
    ) -> Result<Option<ProjectApproval>, ApprovalError> {
        let key = ProjectApproval::ledger_key(timesheet_id, project_id);
        match self.approvals.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The full ledger of a timesheet, ordered by project id.
    pub fn approvals_for(&self, timesheet_id: &str) -> Result<Vec<ProjectApproval>, ApprovalError> {
        let prefix = format!("{timesheet_id}/");
        let mut records = Vec::new();
        for kv in self.approvals.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = kv?;
            records.push(decode(&bytes)?);
        }
        Ok(records)
    }

    /// Every live timesheet whose week lies inside the given range.
    pub fn timesheets_in_week(
        &self,
        week_start: Day,
        week_end: Day,
    ) -> Result<Vec<Timesheet>, ApprovalError> {
        let mut sheets = Vec::new();
        for kv in self.timesheets.iter() {
            let (_, bytes) = kv?;
            let timesheet: Timesheet = decode(&bytes)?;
            if timesheet.deleted_at.is_none()
                && timesheet.week_start >= week_start
                && timesheet.week_end <= week_end
            {
                sheets.push(timesheet);
            }
        }
        sheets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(sheets)
    }

    /// Audit rows for one timesheet, oldest first.
    pub fn history_for(&self, timesheet_id: &str) -> Result<Vec<ApprovalHistory>, ApprovalError> {
        let mut rows = Vec::new();
        for kv in self.history.iter() {
            let (_, bytes) = kv?;
            let row: ApprovalHistory = decode(&bytes)?;
            if row.timesheet_id == timesheet_id {
                rows.push(row);
            }
        }
        rows.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
        Ok(rows)
    }

    pub fn commit(
        &self,
        policy: TransactionPolicy,
        writes: WriteSet,
    ) -> Result<(), ApprovalError> {
        match policy {
            TransactionPolicy::Atomic => (&self.timesheets, &self.approvals, &self.history)
                .transaction(
                    |(timesheets, approvals, history)| -> ConflictableTransactionResult<(), ()> {
                        timesheets.apply_batch(&writes.timesheets)?;
                        approvals.apply_batch(&writes.approvals)?;
                        history.apply_batch(&writes.history)?;
                        Ok(())
                    },
                )
                .map_err(ApprovalError::from),
            TransactionPolicy::BestEffort => {
                self.timesheets.apply_batch(writes.timesheets)?;
                self.approvals.apply_batch(writes.approvals)?;
                self.history.apply_batch(writes.history)?;
                Ok(())
            }
        }
    }

    pub fn flush(&self) -> Result<(), ApprovalError> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode<T>(value: &T) -> Result<Vec<u8>, ApprovalError>
where
    T: minicbor::Encode<()>,
{
    minicbor::to_vec(value).map_err(|e| ApprovalError::Storage(e.to_string()))
}

fn decode<T>(bytes: &[u8]) -> Result<T, ApprovalError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    minicbor::decode(bytes).map_err(|e| ApprovalError::Storage(e.to_string()))
}
