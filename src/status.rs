//! Status derivation engine
//!
//! Pure functions over a timesheet's ledger records. The overall status is
//! recomputed from the ledger on every mutation, never cached, so the
//! single-record and bulk paths cannot diverge. Both call sites consume the
//! same functions below.

use std::collections::BTreeMap;

use crate::model::{ProjectApproval, Role, Tier, TierStatus, TimesheetStatus};

/// True iff every record with a required lead tier has it approved.
/// Records whose project has no lead are skipped, not counted against.
pub fn all_leads_approved(records: &[ProjectApproval]) -> bool {
    records
        .iter()
        .filter(|r| r.lead_status != TierStatus::NotRequired)
        .all(|r| r.lead_status == TierStatus::Approved)
}

/// True iff every record has its manager tier approved. The manager tier
/// is always required; every project has a primary manager.
pub fn all_managers_approved(records: &[ProjectApproval]) -> bool {
    records.iter().all(|r| r.manager_status == TierStatus::Approved)
}

/// Timesheet status after a lead approval landed on the ledger, or `None`
/// when the conjunction is still open and the status stays as it was.
/// `auto_escalates` is the acting project's escalation setting.
pub fn status_after_lead_approval(
    records: &[ProjectApproval],
    auto_escalates: bool,
) -> Option<TimesheetStatus> {
    if !all_leads_approved(records) {
        return None;
    }
    if auto_escalates {
        all_managers_approved(records).then_some(TimesheetStatus::ManagerApproved)
    } else {
        Some(TimesheetStatus::LeadApproved)
    }
}

/// Timesheet status after a manager approval landed on the ledger. A
/// manager's own timesheet needs the extra management tier before freezing.
pub fn status_after_manager_approval(
    records: &[ProjectApproval],
    owner_role: Role,
) -> Option<TimesheetStatus> {
    if !all_managers_approved(records) {
        return None;
    }
    if owner_role == Role::Manager {
        Some(TimesheetStatus::ManagementPending)
    } else {
        Some(TimesheetStatus::ManagerApproved)
    }
}

/// Rejection reset protocol: a rejection at any tier invalidates every
/// other record's progress. The triggering project's record is left
/// untouched so the just-written rejection survives. The lead tier is
/// re-derived from project membership via `lead_required` rather than
/// blindly forced to pending, so a tier with no reviewer keeps its waiver.
pub fn reset_for_rejection(
    records: &mut [ProjectApproval],
    triggering_project: &str,
    lead_required: &BTreeMap<String, bool>,
) {
    for record in records
        .iter_mut()
        .filter(|r| r.project_id != triggering_project)
    {
        let lead = match lead_required.get(&record.project_id) {
            Some(true) => TierStatus::Pending,
            Some(false) => TierStatus::NotRequired,
            // membership unknown: an existing waiver stays a waiver
            None if record.lead_status == TierStatus::NotRequired => TierStatus::NotRequired,
            None => TierStatus::Pending,
        };
        record.reset_tier(Tier::Lead, lead);
        record.reset_tier(Tier::Manager, TierStatus::Pending);
        record.reset_tier(Tier::Management, TierStatus::Pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeStamp;

    fn record(project: &str, lead: TierStatus, manager: TierStatus) -> ProjectApproval {
        let mut r = ProjectApproval::new("ts_x".into(), project.into(), lead, 1, 60);
        if manager == TierStatus::Approved {
            r.approve_tier(Tier::Manager, TimeStamp::new());
        }
        r
    }

    #[test]
    fn lead_predicate_skips_not_required() {
        let mut with_lead = record("proj_a", TierStatus::Pending, TierStatus::Pending);
        with_lead.approve_tier(Tier::Lead, TimeStamp::new());
        let without_lead = record("proj_b", TierStatus::NotRequired, TierStatus::Pending);

        assert!(all_leads_approved(&[with_lead, without_lead]));
    }

    #[test]
    fn lead_predicate_fails_on_pending_required_tier() {
        let pending = record("proj_a", TierStatus::Pending, TierStatus::Pending);
        assert!(!all_leads_approved(&[pending]));
    }

    #[test]
    fn manager_predicate_counts_every_record() {
        let approved = record("proj_a", TierStatus::NotRequired, TierStatus::Approved);
        let pending = record("proj_b", TierStatus::NotRequired, TierStatus::Pending);

        assert!(all_managers_approved(&[approved.clone()]));
        assert!(!all_managers_approved(&[approved, pending]));
    }

    #[test]
    fn lead_approval_without_escalation_yields_lead_approved() {
        let mut r = record("proj_a", TierStatus::Pending, TierStatus::Pending);
        r.approve_tier(Tier::Lead, TimeStamp::new());

        assert_eq!(
            status_after_lead_approval(&[r], false),
            Some(TimesheetStatus::LeadApproved)
        );
    }

    #[test]
    fn lead_approval_with_escalation_needs_all_managers() {
        let mut open = record("proj_a", TierStatus::Pending, TierStatus::Pending);
        open.approve_tier(Tier::Lead, TimeStamp::new());
        assert_eq!(status_after_lead_approval(&[open.clone()], true), None);

        open.approve_tier(Tier::Manager, TimeStamp::new());
        assert_eq!(
            status_after_lead_approval(&[open], true),
            Some(TimesheetStatus::ManagerApproved)
        );
    }

    #[test]
    fn manager_approval_routes_manager_owned_sheets_to_management() {
        let r = record("proj_a", TierStatus::NotRequired, TierStatus::Approved);

        assert_eq!(
            status_after_manager_approval(&[r.clone()], Role::Manager),
            Some(TimesheetStatus::ManagementPending)
        );
        assert_eq!(
            status_after_manager_approval(&[r], Role::Employee),
            Some(TimesheetStatus::ManagerApproved)
        );
    }

    #[test]
    fn reset_preserves_waiver_and_triggering_record() {
        let mut rejected = record("proj_a", TierStatus::Pending, TierStatus::Pending);
        rejected.reject_tier(Tier::Manager, "hours look wrong");
        let mut other = record("proj_b", TierStatus::NotRequired, TierStatus::Approved);
        other.approve_tier(Tier::Management, TimeStamp::new());

        let mut records = vec![rejected, other];
        let lead_required = BTreeMap::from([("proj_b".to_string(), false)]);
        reset_for_rejection(&mut records, "proj_a", &lead_required);

        assert_eq!(records[0].manager_status, TierStatus::Rejected);
        assert_eq!(
            records[0].manager_rejection_reason.as_deref(),
            Some("hours look wrong")
        );
        assert_eq!(records[1].lead_status, TierStatus::NotRequired);
        assert_eq!(records[1].manager_status, TierStatus::Pending);
        assert_eq!(records[1].management_status, TierStatus::Pending);
        assert_eq!(records[1].management_approved_at, None);
    }
}
