//! Core timesheet, approval ledger and tier types
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use std::fmt;

/// One review stage in the approval sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Lead,
    Manager,
    Management,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Lead => "lead",
            Tier::Manager => "manager",
            Tier::Management => "management",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tier state on a ledger entry. `NotRequired` marks a tier with no
/// applicable reviewer (e.g. a project without a lead) and must survive
/// rejection resets.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierStatus {
    #[n(0)]
    NotRequired,
    #[n(1)]
    Pending,
    #[n(2)]
    Approved,
    #[n(3)]
    Rejected,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    #[n(0)]
    Employee,
    #[n(1)]
    Lead,
    #[n(2)]
    Manager,
    #[n(3)]
    SuperAdmin,
    #[n(4)]
    Management,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Lead => "lead",
            Role::Manager => "manager",
            Role::SuperAdmin => "super_admin",
            Role::Management => "management",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single authoritative timesheet status. Always derivable from the
/// ProjectApproval set; recomputed on every mutation, never cached.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimesheetStatus {
    #[n(0)]
    Submitted,
    #[n(1)]
    LeadApproved,
    #[n(2)]
    LeadRejected,
    #[n(3)]
    ManagerApproved,
    #[n(4)]
    ManagerRejected,
    #[n(5)]
    ManagementPending,
    #[n(6)]
    ManagementRejected,
    #[n(7)]
    Frozen,
    #[n(8)]
    Billed,
}

impl TimesheetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimesheetStatus::Submitted => "submitted",
            TimesheetStatus::LeadApproved => "lead_approved",
            TimesheetStatus::LeadRejected => "lead_rejected",
            TimesheetStatus::ManagerApproved => "manager_approved",
            TimesheetStatus::ManagerRejected => "manager_rejected",
            TimesheetStatus::ManagementPending => "management_pending",
            TimesheetStatus::ManagementRejected => "management_rejected",
            TimesheetStatus::Frozen => "frozen",
            TimesheetStatus::Billed => "billed",
        }
    }
}

impl fmt::Display for TimesheetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// Manual ordering/equality impls: deriving them would add a spurious
// `T: Ord`/`T: Eq` bound that `Utc` does not satisfy, even though
// `DateTime<T>` is fully ordered for every `T`. These delegate to the
// inner `DateTime`, matching what the derive would have produced.
impl<T: TimeZone> PartialEq for TimeStamp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: TimeZone> Eq for TimeStamp<T> {}

impl<T: TimeZone> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Into::into)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// A calendar date, used for week boundaries. Encoded as days from the
/// common era so ordering survives the CBOR round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Day(NaiveDate);

impl Day {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Day)
    }
    pub fn date(&self) -> NaiveDate {
        self.0
    }
    /// Whole days between `earlier` and `self`; negative if `self` precedes it.
    pub fn days_since(&self, earlier: Day) -> i64 {
        self.0.signed_duration_since(earlier.0).num_days()
    }
}

impl From<NaiveDate> for Day {
    fn from(value: NaiveDate) -> Self {
        Day(value)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl<C> minicbor::Encode<C> for Day {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i32(self.0.num_days_from_ce())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Day {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(Day)
            .ok_or(minicbor::decode::Error::message(
                "day count out of range for a calendar date",
            ))
    }
}

/// One weekly work record per (user, week). The approval fields below are
/// written exclusively by the approval service once the sheet is submitted.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Timesheet {
    #[n(0)]
    pub id: String, // uuid7, bech32 encoded with the ts_ prefix
    #[n(1)]
    pub owner_id: String,
    #[n(2)]
    pub week_start: Day,
    #[n(3)]
    pub week_end: Day,
    #[n(4)]
    pub total_minutes: u64, // integers for worked time, never floats
    #[n(5)]
    pub status: TimesheetStatus,
    #[n(6)]
    pub lead_approver_id: Option<String>,
    #[n(7)]
    pub lead_approved_at: Option<TimeStamp<Utc>>,
    #[n(8)]
    pub manager_approver_id: Option<String>,
    #[n(9)]
    pub manager_approved_at: Option<TimeStamp<Utc>>,
    #[n(10)]
    pub verified_by: Option<String>,
    #[n(11)]
    pub verified_at: Option<TimeStamp<Utc>>,
    #[n(12)]
    pub lead_rejection_reason: Option<String>,
    #[n(13)]
    pub lead_rejected_at: Option<TimeStamp<Utc>>,
    #[n(14)]
    pub manager_rejection_reason: Option<String>,
    #[n(15)]
    pub manager_rejected_at: Option<TimeStamp<Utc>>,
    #[n(16)]
    pub management_rejection_reason: Option<String>,
    #[n(17)]
    pub management_rejected_at: Option<TimeStamp<Utc>>,
    #[n(18)]
    pub is_frozen: bool,
    #[n(19)]
    pub billing_snapshot_id: Option<String>,
    #[n(20)]
    pub billed_at: Option<TimeStamp<Utc>>,
    #[n(21)]
    pub deleted_at: Option<TimeStamp<Utc>>,
}

impl Timesheet {
    pub(crate) fn submitted(
        id: String,
        owner_id: String,
        week_start: Day,
        week_end: Day,
        total_minutes: u64,
    ) -> Self {
        Self {
            id,
            owner_id,
            week_start,
            week_end,
            total_minutes,
            status: TimesheetStatus::Submitted,
            lead_approver_id: None,
            lead_approved_at: None,
            manager_approver_id: None,
            manager_approved_at: None,
            verified_by: None,
            verified_at: None,
            lead_rejection_reason: None,
            lead_rejected_at: None,
            manager_rejection_reason: None,
            manager_rejected_at: None,
            management_rejection_reason: None,
            management_rejected_at: None,
            is_frozen: false,
            billing_snapshot_id: None,
            billed_at: None,
            deleted_at: None,
        }
    }

    pub fn stamp_lead_approval(&mut self, approver_id: &str, at: TimeStamp<Utc>) {
        self.lead_approver_id = Some(approver_id.to_string());
        self.lead_approved_at = Some(at);
    }

    pub fn stamp_manager_approval(&mut self, approver_id: &str, at: TimeStamp<Utc>) {
        self.manager_approver_id = Some(approver_id.to_string());
        self.manager_approved_at = Some(at);
    }

    /// Management approval is the freeze action. Terminal until billing.
    pub fn freeze(&mut self, verifier_id: &str, at: TimeStamp<Utc>) {
        self.status = TimesheetStatus::Frozen;
        self.is_frozen = true;
        self.verified_by = Some(verifier_id.to_string());
        self.verified_at = Some(at);
    }

    pub fn stamp_rejection(&mut self, tier: Tier, reason: &str, at: TimeStamp<Utc>) {
        match tier {
            Tier::Lead => {
                self.lead_rejection_reason = Some(reason.to_string());
                self.lead_rejected_at = Some(at);
            }
            Tier::Manager => {
                self.manager_rejection_reason = Some(reason.to_string());
                self.manager_rejected_at = Some(at);
            }
            Tier::Management => {
                self.management_rejection_reason = Some(reason.to_string());
                self.management_rejected_at = Some(at);
            }
        }
    }

    /// The review restarts after any rejection, so approver stamps go with it.
    pub fn clear_approval_stamps(&mut self) {
        self.lead_approver_id = None;
        self.lead_approved_at = None;
        self.manager_approver_id = None;
        self.manager_approved_at = None;
    }

    pub fn mark_billed(&mut self, snapshot_id: Option<&str>, at: TimeStamp<Utc>) {
        self.status = TimesheetStatus::Billed;
        self.billing_snapshot_id = snapshot_id.map(str::to_string);
        self.billed_at = Some(at);
    }
}

/// The ledger entry: one approval record per (timesheet, project) pair.
/// Created once at submission, mutated only by the approval service,
/// deleted only alongside its timesheet.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct ProjectApproval {
    #[n(0)]
    pub timesheet_id: String,
    #[n(1)]
    pub project_id: String,
    #[n(2)]
    pub lead_status: TierStatus,
    #[n(3)]
    pub lead_approved_at: Option<TimeStamp<Utc>>,
    #[n(4)]
    pub lead_rejection_reason: Option<String>,
    #[n(5)]
    pub manager_status: TierStatus,
    #[n(6)]
    pub manager_approved_at: Option<TimeStamp<Utc>>,
    #[n(7)]
    pub manager_rejection_reason: Option<String>,
    #[n(8)]
    pub management_status: TierStatus,
    #[n(9)]
    pub management_approved_at: Option<TimeStamp<Utc>>,
    #[n(10)]
    pub management_rejection_reason: Option<String>,
    #[n(11)]
    pub entry_count: u32,
    #[n(12)]
    pub total_minutes: u64,
}

impl ProjectApproval {
    pub(crate) fn new(
        timesheet_id: String,
        project_id: String,
        lead_status: TierStatus,
        entry_count: u32,
        total_minutes: u64,
    ) -> Self {
        Self {
            timesheet_id,
            project_id,
            lead_status,
            lead_approved_at: None,
            lead_rejection_reason: None,
            manager_status: TierStatus::Pending,
            manager_approved_at: None,
            manager_rejection_reason: None,
            management_status: TierStatus::Pending,
            management_approved_at: None,
            management_rejection_reason: None,
            entry_count,
            total_minutes,
        }
    }

    /// Storage key. The `timesheet_id/` prefix lets one scan yield a
    /// timesheet's full ledger.
    pub fn ledger_key(timesheet_id: &str, project_id: &str) -> String {
        format!("{timesheet_id}/{project_id}")
    }

    pub fn key(&self) -> String {
        Self::ledger_key(&self.timesheet_id, &self.project_id)
    }

    pub fn tier_status(&self, tier: Tier) -> TierStatus {
        match tier {
            Tier::Lead => self.lead_status,
            Tier::Manager => self.manager_status,
            Tier::Management => self.management_status,
        }
    }

    /// Marks the tier approved, clearing any prior rejection reason.
    pub fn approve_tier(&mut self, tier: Tier, at: TimeStamp<Utc>) {
        match tier {
            Tier::Lead => {
                self.lead_status = TierStatus::Approved;
                self.lead_approved_at = Some(at);
                self.lead_rejection_reason = None;
            }
            Tier::Manager => {
                self.manager_status = TierStatus::Approved;
                self.manager_approved_at = Some(at);
                self.manager_rejection_reason = None;
            }
            Tier::Management => {
                self.management_status = TierStatus::Approved;
                self.management_approved_at = Some(at);
                self.management_rejection_reason = None;
            }
        }
    }

    pub fn reject_tier(&mut self, tier: Tier, reason: &str) {
        match tier {
            Tier::Lead => {
                self.lead_status = TierStatus::Rejected;
                self.lead_approved_at = None;
                self.lead_rejection_reason = Some(reason.to_string());
            }
            Tier::Manager => {
                self.manager_status = TierStatus::Rejected;
                self.manager_approved_at = None;
                self.manager_rejection_reason = Some(reason.to_string());
            }
            Tier::Management => {
                self.management_status = TierStatus::Rejected;
                self.management_approved_at = None;
                self.management_rejection_reason = Some(reason.to_string());
            }
        }
    }

    /// Puts the tier back to `status`, wiping its timestamp and reason.
    pub fn reset_tier(&mut self, tier: Tier, status: TierStatus) {
        match tier {
            Tier::Lead => {
                self.lead_status = status;
                self.lead_approved_at = None;
                self.lead_rejection_reason = None;
            }
            Tier::Manager => {
                self.manager_status = status;
                self.manager_approved_at = None;
                self.manager_rejection_reason = None;
            }
            Tier::Management => {
                self.management_status = status;
                self.management_approved_at = None;
                self.management_rejection_reason = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn day_encoding() {
        let original = Day::from_ymd(2025, 2, 3).unwrap();

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: Day = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn approve_tier_clears_rejection() {
        let mut record = ProjectApproval::new(
            "ts_a".into(),
            "proj_a".into(),
            TierStatus::Pending,
            3,
            480,
        );
        record.reject_tier(Tier::Lead, "hours look wrong");
        assert_eq!(record.lead_status, TierStatus::Rejected);

        record.approve_tier(Tier::Lead, TimeStamp::new());
        assert_eq!(record.tier_status(Tier::Lead), TierStatus::Approved);
        assert_eq!(record.lead_rejection_reason, None);
        assert!(record.lead_approved_at.is_some());
    }

    #[test]
    fn timestamp_exposes_the_underlying_datetime() {
        use chrono::Datelike;

        let ts = TimeStamp::new_with(2025, 2, 3, 9, 0, 0).unwrap();
        assert_eq!(ts.to_datetime_utc().year(), 2025);
    }
}
