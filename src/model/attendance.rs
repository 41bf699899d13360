use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::utils::training_time::TrainingTime;

/// Late / early-leave classification of one training day.
///
/// Tardy and leaving-early are independent facts; the combined variant keeps
/// both when they hold on the same day. `Absent` is never derived from the
/// recorded times, it is only carried over from an explicit absence marker.
/// The numeric discriminants are the legacy status codes and appear only at
/// the persistence boundary.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum_macros::Display,
    strum_macros::FromRepr,
)]
#[repr(i16)]
pub enum AttendanceStatus {
    #[strum(serialize = "")]
    OnTime = 0,
    #[strum(serialize = "late")]
    Tardy = 1,
    #[strum(serialize = "left early")]
    LeavingEarly = 2,
    #[strum(serialize = "late / left early")]
    TardyAndLeavingEarly = 3,
    #[strum(serialize = "absent")]
    Absent = 9,
}

impl AttendanceStatus {
    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn from_code(code: i16) -> Option<Self> {
        Self::from_repr(code)
    }

    /// Label shown next to the day in the list and edit screens.
    pub fn display_name(self) -> String {
        self.to_string()
    }
}

/// One attendance row per (lms user, training date).
#[derive(Debug, Clone, PartialEq)]
pub struct StudentAttendance {
    pub student_attendance_id: Option<u64>,
    pub lms_user_id: u64,
    pub account_id: u64,
    pub training_date: NaiveDate,
    pub training_start_time: TrainingTime,
    pub training_end_time: TrainingTime,
    /// None means the day has not been entered yet, which is distinct from
    /// an explicit `Absent`.
    pub status: Option<AttendanceStatus>,
    pub note: String,
    pub blank_time: Option<u16>,
    pub delete_flg: bool,
    pub first_create_user: Option<u64>,
    pub first_create_date: Option<NaiveDateTime>,
    pub last_modified_user: Option<u64>,
    pub last_modified_date: Option<NaiveDateTime>,
}

impl StudentAttendance {
    /// Fresh, not-yet-entered row for a training date.
    pub fn new(lms_user_id: u64, account_id: u64, training_date: NaiveDate) -> Self {
        StudentAttendance {
            student_attendance_id: None,
            lms_user_id,
            account_id,
            training_date,
            training_start_time: TrainingTime::empty(),
            training_end_time: TrainingTime::empty(),
            status: None,
            note: String::new(),
            blank_time: None,
            delete_flg: false,
            first_create_user: None,
            first_create_date: None,
            last_modified_user: None,
            last_modified_date: None,
        }
    }

    pub fn status_code(&self) -> Option<i16> {
        self.status.map(AttendanceStatus::code)
    }
}

/// Raw `t_student_attendance` row. Times are the legacy "HH:MM" strings
/// (empty string = not recorded) and status is the legacy code; both convert
/// to the domain types here and nowhere else.
#[derive(Debug, Clone, FromRow)]
pub struct StudentAttendanceRow {
    pub student_attendance_id: u64,
    pub lms_user_id: u64,
    pub account_id: u64,
    pub training_date: NaiveDate,
    pub training_start_time: String,
    pub training_end_time: String,
    pub status: Option<i16>,
    pub note: String,
    pub blank_time: Option<u16>,
    pub delete_flg: bool,
    pub first_create_user: Option<u64>,
    pub first_create_date: Option<NaiveDateTime>,
    pub last_modified_user: Option<u64>,
    pub last_modified_date: Option<NaiveDateTime>,
}

impl From<StudentAttendanceRow> for StudentAttendance {
    fn from(row: StudentAttendanceRow) -> Self {
        StudentAttendance {
            student_attendance_id: Some(row.student_attendance_id),
            lms_user_id: row.lms_user_id,
            account_id: row.account_id,
            training_date: row.training_date,
            training_start_time: TrainingTime::parse(&row.training_start_time),
            training_end_time: TrainingTime::parse(&row.training_end_time),
            status: row.status.and_then(AttendanceStatus::from_code),
            note: row.note,
            blank_time: row.blank_time,
            delete_flg: row.delete_flg,
            first_create_user: row.first_create_user,
            first_create_date: row.first_create_date,
            last_modified_user: row.last_modified_user,
            last_modified_date: row.last_modified_date,
        }
    }
}

/// Insert-or-update decision for one reconciled row, made explicit instead
/// of leaving callers to probe for a nullable identity.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordWrite {
    Insert(StudentAttendance),
    Update { id: u64, record: StudentAttendance },
}

impl RecordWrite {
    /// Tags the record by identity presence: rows loaded from the database
    /// carry their key, fresh rows do not.
    pub fn from_record(record: StudentAttendance) -> Self {
        match record.student_attendance_id {
            Some(id) => RecordWrite::Update { id, record },
            None => RecordWrite::Insert(record),
        }
    }

    pub fn record(&self) -> &StudentAttendance {
        match self {
            RecordWrite::Insert(record) => record,
            RecordWrite::Update { record, .. } => record,
        }
    }
}

/// One day's submission from the direct-edit screen. Lives only for the
/// duration of the update request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DailyAttendanceEntry {
    #[schema(example = "2026-08-03", format = "date", value_type = String)]
    pub training_date: NaiveDate,
    #[schema(example = 9)]
    pub training_start_time_hour: Option<u32>,
    #[schema(example = 0)]
    pub training_start_time_minute: Option<u32>,
    #[schema(example = 18)]
    pub training_end_time_hour: Option<u32>,
    #[schema(example = 0)]
    pub training_end_time_minute: Option<u32>,
    /// Break minutes excluded from the day's worked time
    #[schema(example = 60)]
    pub blank_time: Option<u16>,
    #[serde(default)]
    #[schema(example = "left early for a doctor visit")]
    pub note: String,
    /// Display-only status label; the absence marker is preserved verbatim
    #[serde(default)]
    #[schema(example = "")]
    pub status_label: String,
}

impl DailyAttendanceEntry {
    pub fn start_time(&self) -> TrainingTime {
        TrainingTime::from_parts(self.training_start_time_hour, self.training_start_time_minute)
    }

    pub fn end_time(&self) -> TrainingTime {
        TrainingTime::from_parts(self.training_end_time_hour, self.training_end_time_minute)
    }

    pub fn is_marked_absent(&self) -> bool {
        self.status_label == AttendanceStatus::Absent.display_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_codes_round_trip() {
        for status in [
            AttendanceStatus::OnTime,
            AttendanceStatus::Tardy,
            AttendanceStatus::LeavingEarly,
            AttendanceStatus::TardyAndLeavingEarly,
            AttendanceStatus::Absent,
        ] {
            assert_eq!(AttendanceStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(AttendanceStatus::from_code(4), None);
    }

    #[test]
    fn combined_status_keeps_both_display_names() {
        assert_eq!(
            AttendanceStatus::TardyAndLeavingEarly.display_name(),
            "late / left early"
        );
        assert_eq!(AttendanceStatus::OnTime.display_name(), "");
    }

    #[test]
    fn row_conversion_maps_legacy_columns() {
        let row = StudentAttendanceRow {
            student_attendance_id: 42,
            lms_user_id: 7,
            account_id: 1,
            training_date: NaiveDate::from_ymd_opt(2026, 8, 3).unwrap(),
            training_start_time: "09:00".into(),
            training_end_time: "".into(),
            status: Some(1),
            note: "overslept".into(),
            blank_time: None,
            delete_flg: false,
            first_create_user: Some(7),
            first_create_date: None,
            last_modified_user: Some(7),
            last_modified_date: None,
        };
        let record = StudentAttendance::from(row);
        assert_eq!(record.student_attendance_id, Some(42));
        assert_eq!(record.training_start_time.to_string(), "09:00");
        assert!(record.training_end_time.is_empty());
        assert_eq!(record.status, Some(AttendanceStatus::Tardy));
    }

    #[test]
    fn write_tagging_follows_identity() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let fresh = StudentAttendance::new(7, 1, date);
        assert!(matches!(RecordWrite::from_record(fresh), RecordWrite::Insert(_)));

        let mut stored = StudentAttendance::new(7, 1, date);
        stored.student_attendance_id = Some(9);
        assert!(matches!(
            RecordWrite::from_record(stored),
            RecordWrite::Update { id: 9, .. }
        ));
    }
}
