//! Append-only approval audit trail
//!
//! One row per approval action. Rows are content-addressed: the sha256
//! digest of the CBOR encoding is the storage key. Created only, never
//! mutated or deleted.

use chrono::Utc;

use crate::error::ApprovalError;
use crate::model::{Role, TimeStamp, TimesheetStatus};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub enum HistoryAction {
    #[n(0)]
    Approved,
    #[n(1)]
    Rejected,
    #[n(2)]
    Billed,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct ApprovalHistory {
    #[n(0)]
    pub timesheet_id: String,
    #[n(1)]
    pub project_id: Option<String>, // None for timesheet-level finalizer actions
    #[n(2)]
    pub actor_id: String,
    #[n(3)]
    pub actor_role: Role,
    #[n(4)]
    pub action: HistoryAction,
    #[n(5)]
    pub status_before: TimesheetStatus,
    #[n(6)]
    pub status_after: TimesheetStatus,
    #[n(7)]
    pub reason: Option<String>,
    #[n(8)]
    pub note: Option<String>, // e.g. "bulk project-week approval"
    #[n(9)]
    pub recorded_at: TimeStamp<Utc>,
}

impl ApprovalHistory {
    /// Encode the row and derive its storage key from the content hash.
    pub fn build(&self) -> Result<(String, Vec<u8>), ApprovalError> {
        let cbor =
            minicbor::to_vec(self).map_err(|e| ApprovalError::Storage(e.to_string()))?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_is_stable_for_identical_rows() {
        let row = ApprovalHistory {
            timesheet_id: "ts_a".into(),
            project_id: Some("proj_a".into()),
            actor_id: "user_a".into(),
            actor_role: Role::Manager,
            action: HistoryAction::Approved,
            status_before: TimesheetStatus::Submitted,
            status_after: TimesheetStatus::ManagerApproved,
            reason: None,
            note: None,
            recorded_at: TimeStamp::new(),
        };

        let (key_a, cbor_a) = row.build().unwrap();
        let (key_b, cbor_b) = row.build().unwrap();

        assert_eq!(key_a, key_b);
        assert_eq!(cbor_a, cbor_b);

        let decoded: ApprovalHistory = minicbor::decode(&cbor_a).unwrap();
        assert_eq!(decoded, row);
    }
}
