//! Service layer API for timesheet approval workflow operations
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::builder::TimesheetBuilder;
use crate::directory::Directory;
use crate::error::ApprovalError;
use crate::history::{ApprovalHistory, HistoryAction};
use crate::model::{Role, Tier, TierStatus, TimeStamp, Timesheet, TimesheetStatus};
use crate::status;
use crate::store::{LedgerStore, TransactionPolicy, WriteSet};

/// Reasons shorter than this are rejected outright; the full length
/// policy belongs to the outer boundary.
pub const MIN_REASON_LEN: usize = 4;

/// Result of one single-record approve or reject call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalOutcome {
    pub success: bool,
    pub message: String,
    /// Both derivation predicates hold: every required lead and every
    /// manager tier on the ledger is approved.
    pub all_approved: bool,
    pub new_status: TimesheetStatus,
}

/// Tally of a best-effort finalizer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FinalizeTally {
    pub processed_count: u32,
    pub failed_count: u32,
}

pub struct ApprovalService {
    pub(crate) store: LedgerStore,
    pub(crate) directory: Arc<dyn Directory>,
    pub(crate) policy: TransactionPolicy,
}

impl ApprovalService {
    pub fn new(
        store: LedgerStore,
        directory: Arc<dyn Directory>,
        policy: TransactionPolicy,
    ) -> Self {
        Self {
            store,
            directory,
            policy,
        }
    }

    /// Read access for controllers and tests.
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Submit a new weekly timesheet for review
    pub fn submit(&self, builder: TimesheetBuilder) -> Result<Timesheet, ApprovalError> {
        let (timesheet, ledger) = builder.finalise(self.directory.as_ref())?;

        let mut writes = WriteSet::default();
        writes.put_timesheet(&timesheet)?;
        for record in &ledger {
            writes.put_approval(record)?;
        }
        self.store.commit(self.policy, writes)?;

        info!(
            timesheet = %timesheet.id,
            owner = %timesheet.owner_id,
            projects = ledger.len(),
            "timesheet submitted"
        );
        Ok(timesheet)
    }

    /// Approve one (timesheet, project) ledger record as the given role
    pub fn approve(
        &self,
        timesheet_id: &str,
        project_id: &str,
        approver_id: &str,
        approver_role: Role,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        self.approve_with_note(timesheet_id, project_id, approver_id, approver_role, None)
    }

    pub(crate) fn approve_with_note(
        &self,
        timesheet_id: &str,
        project_id: &str,
        approver_id: &str,
        approver_role: Role,
        note: Option<&str>,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        let mut timesheet = self.store.timesheet(timesheet_id)?;
        let mut records = self.store.approvals_for(timesheet_id)?;
        let idx = records
            .iter()
            .position(|r| r.project_id == project_id)
            .ok_or_else(|| {
                ApprovalError::not_found(
                    "project approval",
                    format!("{timesheet_id}/{project_id}"),
                )
            })?;
        let project = self.directory.project(project_id)?;
        let owner = self.directory.user(&timesheet.owner_id)?;

        if timesheet.status == TimesheetStatus::Billed {
            return Err(ApprovalError::invalid("timesheet has already been billed"));
        }
        if timesheet.is_frozen {
            return Err(ApprovalError::invalid("timesheet is frozen"));
        }

        let status_before = timesheet.status;
        let now = TimeStamp::new();
        let mut bypass_note = None;

        match approver_role {
            Role::Employee => {
                return Err(ApprovalError::invalid(
                    "an employee cannot approve timesheets",
                ));
            }
            Role::Lead => {
                if owner.role != Role::Employee {
                    return Err(ApprovalError::invalid(format!(
                        "a lead may only review employee timesheets, owner role is {}",
                        owner.role
                    )));
                }
                let record = &mut records[idx];
                record.approve_tier(Tier::Lead, now.clone());
                if project.approval_settings.lead_approval_auto_escalates {
                    // lead approval doubles as manager approval for this project
                    record.approve_tier(Tier::Manager, now.clone());
                }
                if let Some(next) = status::status_after_lead_approval(
                    &records,
                    project.approval_settings.lead_approval_auto_escalates,
                ) {
                    timesheet.status = next;
                    match next {
                        TimesheetStatus::LeadApproved => {
                            timesheet.stamp_lead_approval(approver_id, now.clone());
                        }
                        TimesheetStatus::ManagerApproved => {
                            timesheet.stamp_lead_approval(approver_id, now.clone());
                            timesheet.stamp_manager_approval(approver_id, now.clone());
                        }
                        _ => {}
                    }
                }
            }
            Role::Manager | Role::SuperAdmin => {
                let allowed = matches!(
                    timesheet.status,
                    TimesheetStatus::LeadApproved | TimesheetStatus::ManagementRejected
                ) || (timesheet.status == TimesheetStatus::Submitted
                    && matches!(owner.role, Role::Employee | Role::Lead | Role::Manager));
                if !allowed {
                    return Err(ApprovalError::invalid(format!(
                        "manager approval requires lead_approved, submitted or management_rejected, current status is {}",
                        timesheet.status
                    )));
                }
                let record = &mut records[idx];
                if timesheet.status == TimesheetStatus::Submitted
                    && owner.role == Role::Employee
                    && record.lead_status == TierStatus::Pending
                {
                    // lead step skipped; the tier is retro-marked as waived
                    record.reset_tier(Tier::Lead, TierStatus::NotRequired);
                    bypass_note = Some("lead review bypassed by direct manager approval");
                }
                record.approve_tier(Tier::Manager, now.clone());
                if let Some(next) = status::status_after_manager_approval(&records, owner.role) {
                    timesheet.status = next;
                    timesheet.stamp_manager_approval(approver_id, now.clone());
                }
            }
            Role::Management => {
                if !matches!(
                    timesheet.status,
                    TimesheetStatus::ManagerApproved | TimesheetStatus::ManagementPending
                ) {
                    return Err(ApprovalError::invalid(format!(
                        "management approval requires manager_approved or management_pending, current status is {}",
                        timesheet.status
                    )));
                }
                records[idx].approve_tier(Tier::Management, now.clone());
                timesheet.freeze(approver_id, now.clone());
            }
        }

        let note = match (note, bypass_note) {
            (Some(n), Some(b)) => Some(format!("{n}; {b}")),
            (Some(n), None) => Some(n.to_string()),
            (None, Some(b)) => Some(b.to_string()),
            (None, None) => None,
        };
        let row = ApprovalHistory {
            timesheet_id: timesheet.id.clone(),
            project_id: Some(project_id.to_string()),
            actor_id: approver_id.to_string(),
            actor_role: approver_role,
            action: HistoryAction::Approved,
            status_before,
            status_after: timesheet.status,
            reason: None,
            note,
            recorded_at: now,
        };

        let mut writes = WriteSet::default();
        writes.put_timesheet(&timesheet)?;
        writes.put_approval(&records[idx])?;
        writes.put_history(&row)?;
        self.store.commit(self.policy, writes)?;

        let all_approved =
            status::all_leads_approved(&records) && status::all_managers_approved(&records);
        info!(
            timesheet = %timesheet.id,
            project = %project_id,
            role = %approver_role,
            status = %timesheet.status,
            "approval recorded"
        );
        Ok(ApprovalOutcome {
            success: true,
            message: format!(
                "{} approval recorded, timesheet is {}",
                approver_role, timesheet.status
            ),
            all_approved,
            new_status: timesheet.status,
        })
    }

    /// Reject one (timesheet, project) ledger record, resetting every other
    /// record's progress on the same timesheet
    pub fn reject(
        &self,
        timesheet_id: &str,
        project_id: &str,
        approver_id: &str,
        approver_role: Role,
        reason: &str,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        self.reject_with_note(
            timesheet_id,
            project_id,
            approver_id,
            approver_role,
            reason,
            None,
        )
    }

    pub(crate) fn reject_with_note(
        &self,
        timesheet_id: &str,
        project_id: &str,
        approver_id: &str,
        approver_role: Role,
        reason: &str,
        note: Option<&str>,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        let reason = validate_reason(reason)?;
        let tier = match approver_role {
            Role::Employee => {
                return Err(ApprovalError::invalid(
                    "an employee cannot reject timesheets",
                ));
            }
            Role::Lead => Tier::Lead,
            Role::Manager | Role::SuperAdmin => Tier::Manager,
            Role::Management => Tier::Management,
        };

        let mut timesheet = self.store.timesheet(timesheet_id)?;
        let mut records = self.store.approvals_for(timesheet_id)?;
        let idx = records
            .iter()
            .position(|r| r.project_id == project_id)
            .ok_or_else(|| {
                ApprovalError::not_found(
                    "project approval",
                    format!("{timesheet_id}/{project_id}"),
                )
            })?;
        self.directory.project(project_id)?;

        if timesheet.status == TimesheetStatus::Billed {
            return Err(ApprovalError::invalid("timesheet has already been billed"));
        }
        if timesheet.is_frozen {
            return Err(ApprovalError::invalid("timesheet is frozen"));
        }

        // resolve membership for the reset before anything mutates
        let mut lead_required = BTreeMap::new();
        for record in records.iter().filter(|r| r.project_id != project_id) {
            let project = self.directory.project(&record.project_id)?;
            lead_required.insert(record.project_id.clone(), project.lead_id.is_some());
        }

        let status_before = timesheet.status;
        let now = TimeStamp::new();

        records[idx].reject_tier(tier, reason);
        status::reset_for_rejection(&mut records, project_id, &lead_required);

        timesheet.status = match tier {
            Tier::Lead => TimesheetStatus::LeadRejected,
            Tier::Manager => TimesheetStatus::ManagerRejected,
            Tier::Management => TimesheetStatus::ManagementRejected,
        };
        timesheet.stamp_rejection(tier, reason, now.clone());
        timesheet.clear_approval_stamps();

        let row = ApprovalHistory {
            timesheet_id: timesheet.id.clone(),
            project_id: Some(project_id.to_string()),
            actor_id: approver_id.to_string(),
            actor_role: approver_role,
            action: HistoryAction::Rejected,
            status_before,
            status_after: timesheet.status,
            reason: Some(reason.to_string()),
            note: note.map(str::to_string),
            recorded_at: now,
        };

        let mut writes = WriteSet::default();
        writes.put_timesheet(&timesheet)?;
        for record in &records {
            writes.put_approval(record)?;
        }
        writes.put_history(&row)?;
        self.store.commit(self.policy, writes)?;

        info!(
            timesheet = %timesheet.id,
            project = %project_id,
            role = %approver_role,
            status = %timesheet.status,
            "rejection recorded"
        );
        Ok(ApprovalOutcome {
            success: true,
            message: format!("{tier} rejection recorded, review restarts"),
            all_approved: false,
            new_status: timesheet.status,
        })
    }

    /// Billing finalizer. Only a frozen timesheet can be billed; re-billing
    /// a billed one is rejected rather than silently accepted.
    pub fn mark_timesheet_billed(
        &self,
        timesheet_id: &str,
        snapshot_id: Option<&str>,
        actor_id: &str,
        actor_role: Role,
    ) -> Result<Timesheet, ApprovalError> {
        let mut timesheet = self.store.timesheet(timesheet_id)?;
        if timesheet.status != TimesheetStatus::Frozen {
            return Err(ApprovalError::invalid(format!(
                "billing requires frozen, current status is {}",
                timesheet.status
            )));
        }

        let status_before = timesheet.status;
        let now = TimeStamp::new();
        timesheet.mark_billed(snapshot_id, now.clone());

        let row = ApprovalHistory {
            timesheet_id: timesheet.id.clone(),
            project_id: None,
            actor_id: actor_id.to_string(),
            actor_role,
            action: HistoryAction::Billed,
            status_before,
            status_after: timesheet.status,
            reason: None,
            note: None,
            recorded_at: now,
        };

        let mut writes = WriteSet::default();
        writes.put_timesheet(&timesheet)?;
        writes.put_history(&row)?;
        self.store.commit(self.policy, writes)?;

        info!(timesheet = %timesheet.id, "timesheet billed");
        Ok(timesheet)
    }

    /// Best-effort management verification over a list of timesheet ids.
    /// Per-id failures are logged and counted; the loop never stops early.
    pub fn bulk_verify(
        &self,
        timesheet_ids: &[String],
        approver_id: &str,
    ) -> Result<FinalizeTally, ApprovalError> {
        let mut tally = FinalizeTally::default();
        for timesheet_id in timesheet_ids {
            match self.verify_timesheet(timesheet_id, approver_id) {
                Ok(_) => tally.processed_count += 1,
                Err(err) => {
                    warn!(timesheet = %timesheet_id, error = %err, "bulk verify item failed");
                    tally.failed_count += 1;
                }
            }
        }
        Ok(tally)
    }

    /// Best-effort billing over a list of timesheet ids, same contract as
    /// [`Self::bulk_verify`]. Snapshot links are left to the billing system.
    pub fn bulk_bill(
        &self,
        timesheet_ids: &[String],
        actor_id: &str,
        actor_role: Role,
    ) -> Result<FinalizeTally, ApprovalError> {
        let mut tally = FinalizeTally::default();
        for timesheet_id in timesheet_ids {
            match self.mark_timesheet_billed(timesheet_id, None, actor_id, actor_role) {
                Ok(_) => tally.processed_count += 1,
                Err(err) => {
                    warn!(timesheet = %timesheet_id, error = %err, "bulk bill item failed");
                    tally.failed_count += 1;
                }
            }
        }
        Ok(tally)
    }

    // Timesheet-level management verification: approves the management tier
    // on every ledger record and freezes, in one commit with one audit row.
    fn verify_timesheet(
        &self,
        timesheet_id: &str,
        approver_id: &str,
    ) -> Result<Timesheet, ApprovalError> {
        let mut timesheet = self.store.timesheet(timesheet_id)?;
        if !matches!(
            timesheet.status,
            TimesheetStatus::ManagerApproved | TimesheetStatus::ManagementPending
        ) {
            return Err(ApprovalError::invalid(format!(
                "management verification requires manager_approved or management_pending, current status is {}",
                timesheet.status
            )));
        }
        let mut records = self.store.approvals_for(timesheet_id)?;

        let status_before = timesheet.status;
        let now = TimeStamp::new();
        for record in &mut records {
            record.approve_tier(Tier::Management, now.clone());
        }
        timesheet.freeze(approver_id, now.clone());

        let row = ApprovalHistory {
            timesheet_id: timesheet.id.clone(),
            project_id: None,
            actor_id: approver_id.to_string(),
            actor_role: Role::Management,
            action: HistoryAction::Approved,
            status_before,
            status_after: timesheet.status,
            reason: None,
            note: Some("bulk verification".to_string()),
            recorded_at: now,
        };

        let mut writes = WriteSet::default();
        writes.put_timesheet(&timesheet)?;
        for record in &records {
            writes.put_approval(record)?;
        }
        writes.put_history(&row)?;
        self.store.commit(self.policy, writes)?;

        info!(timesheet = %timesheet.id, "timesheet verified and frozen");
        Ok(timesheet)
    }
}

pub(crate) fn validate_reason(reason: &str) -> Result<&str, ApprovalError> {
    let reason = reason.trim();
    if reason.len() < MIN_REASON_LEN {
        return Err(ApprovalError::Validation(format!(
            "a rejection reason of at least {MIN_REASON_LEN} characters is required"
        )));
    }
    Ok(reason)
}
