//! Bulk project-week operations
//!
//! Each operation fans the single-record routine out across every
//! timesheet that falls in a project + week range. Per-item business-rule
//! failures are skipped or reported, never abort the batch; a storage
//! failure aborts it. Every per-item mutation commits on its own, so a
//! partially completed batch is an accepted outcome — except for the
//! freeze eligibility check, which runs before any side effect.

use std::collections::BTreeSet;

use tracing::warn;

use crate::directory::Project;
use crate::error::ApprovalError;
use crate::model::{Day, Role, Timesheet, TimesheetStatus};
use crate::service::{ApprovalService, validate_reason};
use crate::utils;

pub const BULK_APPROVAL_NOTE: &str = "bulk project-week approval";
pub const BULK_REJECTION_NOTE: &str = "bulk project-week rejection";
pub const BULK_FREEZE_NOTE: &str = "bulk project-week freeze";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectWeek {
    pub project_name: String,
    pub week_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectWeekOutcome {
    pub success: bool,
    pub message: String,
    pub affected_users: u32,
    pub affected_timesheets: u32,
    pub project_week: ProjectWeek,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreezeFailure {
    pub user_id: String,
    pub user_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreezeOutcome {
    pub success: bool,
    pub message: String,
    pub frozen_count: u32,
    pub skipped_count: u32,
    pub failed: Vec<FreezeFailure>,
}

impl ApprovalService {
    /// Approve every timesheet in the project week as the given role
    pub fn approve_project_week(
        &self,
        project_id: &str,
        week_start: Day,
        week_end: Day,
        approver_id: &str,
        approver_role: Role,
    ) -> Result<ProjectWeekOutcome, ApprovalError> {
        let (project, sheets) = self.project_week_scope(project_id, week_start, week_end)?;
        let week_label = utils::week_label(week_start, week_end);

        let mut affected_timesheets = 0u32;
        let mut affected_users = BTreeSet::new();
        for sheet in &sheets {
            match self.approve_with_note(
                &sheet.id,
                project_id,
                approver_id,
                approver_role,
                Some(BULK_APPROVAL_NOTE),
            ) {
                Ok(_) => {
                    affected_timesheets += 1;
                    affected_users.insert(sheet.owner_id.clone());
                }
                Err(err) if err.is_batch_fatal() => return Err(err),
                Err(err) => {
                    warn!(timesheet = %sheet.id, error = %err, "bulk approval item skipped");
                }
            }
        }

        Ok(ProjectWeekOutcome {
            success: true,
            message: format!(
                "Approved {affected_timesheets} timesheet(s) for {} ({week_label})",
                project.name
            ),
            affected_users: affected_users.len() as u32,
            affected_timesheets,
            project_week: ProjectWeek {
                project_name: project.name,
                week_label,
            },
        })
    }

    /// Reject every timesheet in the project week with one shared reason
    pub fn reject_project_week(
        &self,
        project_id: &str,
        week_start: Day,
        week_end: Day,
        approver_id: &str,
        approver_role: Role,
        reason: &str,
    ) -> Result<ProjectWeekOutcome, ApprovalError> {
        // the reason gates the whole batch, before any side effect
        validate_reason(reason)?;
        let (project, sheets) = self.project_week_scope(project_id, week_start, week_end)?;
        let week_label = utils::week_label(week_start, week_end);

        let mut affected_timesheets = 0u32;
        let mut affected_users = BTreeSet::new();
        for sheet in &sheets {
            match self.reject_with_note(
                &sheet.id,
                project_id,
                approver_id,
                approver_role,
                reason,
                Some(BULK_REJECTION_NOTE),
            ) {
                Ok(_) => {
                    affected_timesheets += 1;
                    affected_users.insert(sheet.owner_id.clone());
                }
                Err(err) if err.is_batch_fatal() => return Err(err),
                Err(err) => {
                    warn!(timesheet = %sheet.id, error = %err, "bulk rejection item skipped");
                }
            }
        }

        Ok(ProjectWeekOutcome {
            success: true,
            message: format!(
                "Rejected {affected_timesheets} timesheet(s) for {} ({week_label})",
                project.name
            ),
            affected_users: affected_users.len() as u32,
            affected_timesheets,
            project_week: ProjectWeek {
                project_name: project.name,
                week_label,
            },
        })
    }

    /// Freeze every timesheet in the project week. Refused outright, with
    /// zero side effects, while any worker's week is still contested.
    pub fn freeze_project_week(
        &self,
        project_id: &str,
        week_start: Day,
        week_end: Day,
        approver_id: &str,
        approver_role: Role,
    ) -> Result<FreezeOutcome, ApprovalError> {
        if approver_role != Role::Management {
            return Err(ApprovalError::invalid(format!(
                "freezing a project week requires the management role, got {approver_role}"
            )));
        }
        let (project, sheets) = self.project_week_scope(project_id, week_start, week_end)?;
        let week_label = utils::week_label(week_start, week_end);

        // eligibility runs before any per-item side effect
        let mut offending = Vec::new();
        for sheet in &sheets {
            if matches!(
                sheet.status,
                TimesheetStatus::Submitted
                    | TimesheetStatus::ManagerRejected
                    | TimesheetStatus::ManagementRejected
            ) {
                let owner = self.directory.user(&sheet.owner_id)?;
                offending.push(FreezeFailure {
                    user_id: sheet.owner_id.clone(),
                    user_name: owner.name,
                    reason: format!("timesheet is {}", sheet.status),
                });
            }
        }
        if !offending.is_empty() {
            return Ok(FreezeOutcome {
                success: false,
                message: format!(
                    "Cannot freeze {} ({week_label}): {} timesheet(s) still contested",
                    project.name,
                    offending.len()
                ),
                frozen_count: 0,
                skipped_count: 0,
                failed: offending,
            });
        }

        let mut frozen_count = 0u32;
        let mut skipped_count = 0u32;
        let mut failed = Vec::new();
        for sheet in &sheets {
            if matches!(
                sheet.status,
                TimesheetStatus::Frozen | TimesheetStatus::Billed
            ) {
                skipped_count += 1;
                continue;
            }
            match self.approve_with_note(
                &sheet.id,
                project_id,
                approver_id,
                approver_role,
                Some(BULK_FREEZE_NOTE),
            ) {
                Ok(_) => frozen_count += 1,
                Err(err) if err.is_batch_fatal() => return Err(err),
                Err(err) => {
                    warn!(timesheet = %sheet.id, error = %err, "bulk freeze item failed");
                    let owner = self.directory.user(&sheet.owner_id)?;
                    failed.push(FreezeFailure {
                        user_id: sheet.owner_id.clone(),
                        user_name: owner.name,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Ok(FreezeOutcome {
            success: failed.is_empty(),
            message: format!(
                "Froze {frozen_count} timesheet(s) for {} ({week_label})",
                project.name
            ),
            frozen_count,
            skipped_count,
            failed,
        })
    }

    // Collects the timesheet set, then narrows to those carrying a ledger
    // record for the project. Either set being empty is a NotFound.
    fn project_week_scope(
        &self,
        project_id: &str,
        week_start: Day,
        week_end: Day,
    ) -> Result<(Project, Vec<Timesheet>), ApprovalError> {
        let project = self.directory.project(project_id)?;
        let sheets = self.store.timesheets_in_week(week_start, week_end)?;
        if sheets.is_empty() {
            return Err(ApprovalError::not_found(
                "timesheets in week",
                format!("{week_start}..{week_end}"),
            ));
        }

        let mut scoped = Vec::new();
        for sheet in sheets {
            if self.store.approval(&sheet.id, project_id)?.is_some() {
                scoped.push(sheet);
            }
        }
        if scoped.is_empty() {
            return Err(ApprovalError::not_found(
                "project approvals in week",
                project_id,
            ));
        }
        Ok((project, scoped))
    }
}
