//! Draft construction for weekly timesheets
//!
//! A submission arrives as per-project entry groups (the external time
//! entry query's output). Finalising validates the draft and derives each
//! project's tier requirements, yielding the `Submitted` timesheet and its
//! approval ledger.

use std::collections::BTreeSet;

use crate::directory::Directory;
use crate::error::ApprovalError;
use crate::model::{Day, ProjectApproval, TierStatus, Timesheet};
use crate::utils;

#[derive(Debug, Clone)]
struct ProjectSlice {
    project_id: String,
    entry_count: u32,
    minutes: u64,
}

// used for constructing drafts
#[derive(Default)]
pub struct TimesheetBuilder {
    owner_id: Option<String>,
    week_start: Option<Day>,
    week_end: Option<Day>,
    slices: Vec<ProjectSlice>,
}

impl TimesheetBuilder {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(mut self, user_id: &str) -> Self {
        self.owner_id = Some(user_id.to_string());
        self
    }

    pub fn week(mut self, start: Day, end: Day) -> Self {
        self.week_start = Some(start);
        self.week_end = Some(end);
        self
    }

    /// One project's share of the week: entry count and worked minutes.
    pub fn project_slice(mut self, project_id: &str, entry_count: u32, minutes: u64) -> Self {
        self.slices.push(ProjectSlice {
            project_id: project_id.to_string(),
            entry_count,
            minutes,
        });
        self
    }

    // Checks fields, performs validation, then derives each slice's tier
    // requirements from project membership.
    pub fn finalise(
        self,
        directory: &dyn Directory,
    ) -> Result<(Timesheet, Vec<ProjectApproval>), ApprovalError> {
        let owner_id = self
            .owner_id
            .ok_or_else(|| ApprovalError::Validation("owner is not set".into()))?;
        let (week_start, week_end) = match (self.week_start, self.week_end) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(ApprovalError::Validation("week range is not set".into())),
        };
        if week_end.days_since(week_start) != 6 {
            return Err(ApprovalError::Validation(format!(
                "a timesheet covers exactly one week, got {week_start}..{week_end}"
            )));
        }
        if self.slices.is_empty() {
            return Err(ApprovalError::Validation(
                "a timesheet needs at least one project slice".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for slice in &self.slices {
            if !seen.insert(slice.project_id.clone()) {
                return Err(ApprovalError::Validation(format!(
                    "duplicate project slice: {}",
                    slice.project_id
                )));
            }
            if slice.entry_count == 0 {
                return Err(ApprovalError::Validation(format!(
                    "project slice {} has no entries",
                    slice.project_id
                )));
            }
        }

        // the owner must resolve before anything is minted
        directory.user(&owner_id)?;

        let id = utils::new_uuid_to_bech32("ts_")?;
        let mut records = Vec::with_capacity(self.slices.len());
        let mut total_minutes = 0u64;
        for slice in &self.slices {
            let project = directory.project(&slice.project_id)?;
            let lead_status = if project.lead_id.is_some() {
                TierStatus::Pending
            } else {
                TierStatus::NotRequired
            };
            records.push(ProjectApproval::new(
                id.clone(),
                slice.project_id.clone(),
                lead_status,
                slice.entry_count,
                slice.minutes,
            ));
            total_minutes += slice.minutes;
        }

        let timesheet = Timesheet::submitted(id, owner_id, week_start, week_end, total_minutes);
        Ok((timesheet, records))
    }
}
