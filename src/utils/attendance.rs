use chrono::{Local, NaiveDate};

use crate::model::attendance::AttendanceStatus;
use crate::utils::training_time::TrainingTime;

/// Derives the late / early-leave status from the recorded times against the
/// configured work-day boundaries.
///
/// Returns None when nothing has been recorded yet: an empty pair is "not
/// entered", never an absence. `Absent` itself is not derived here at all.
pub fn derive_status(
    start: TrainingTime,
    end: TrainingTime,
    work_start: TrainingTime,
    work_end: TrainingTime,
) -> Option<AttendanceStatus> {
    if start.is_empty() && end.is_empty() {
        return None;
    }
    let tardy = !start.is_empty() && start > work_start;
    let leaving_early = !end.is_empty() && end < work_end;
    Some(match (tardy, leaving_early) {
        (false, false) => AttendanceStatus::OnTime,
        (true, false) => AttendanceStatus::Tardy,
        (false, true) => AttendanceStatus::LeavingEarly,
        (true, true) => AttendanceStatus::TardyAndLeavingEarly,
    })
}

/// The training date a punch made right now belongs to: the local calendar
/// date.
pub fn current_training_date() -> NaiveDate {
    Local::now().date_naive()
}

/// Current wall-clock time truncated to the minute.
pub fn current_training_time() -> TrainingTime {
    TrainingTime::from(Local::now().time())
}

/// Break minutes rendered as "H:MM" for the list and edit screens.
pub fn blank_time_display(minutes: u16) -> String {
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

/// Selectable break durations, 15-minute steps up to 8 hours.
pub fn blank_time_choices() -> Vec<u16> {
    (1..=32).map(|i| i * 15).collect()
}
