use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::model::attendance::{
    AttendanceStatus, DailyAttendanceEntry, RecordWrite, StudentAttendance,
};
use crate::utils::attendance::derive_status;
use crate::utils::messages;
use crate::utils::training_time::{TrainingTime, pad2};

const NOTE_MAX_CHARS: usize = 100;
const START_TIME_LABEL: &str = "start time";
const END_TIME_LABEL: &str = "end time";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunchKind {
    In,
    Out,
}

/// Pre-condition failure of a punch. Each variant selects one message-catalog
/// key; the caller must not write anything when one is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PunchError {
    NotAuthorized,
    NotWorkDay,
    AlreadyRecorded,
    NoStartRecorded,
    EndBeforeStart { start: String, end: String },
}

impl PunchError {
    pub fn message(&self) -> String {
        match self {
            PunchError::NotAuthorized => messages::render("authorization.invalid", &[]),
            PunchError::NotWorkDay => messages::render("attendance.notWorkDay", &[]),
            PunchError::AlreadyRecorded => messages::render("attendance.punchAlreadyExists", &[]),
            PunchError::NoStartRecorded => messages::render("attendance.punchInEmpty", &[]),
            PunchError::EndBeforeStart { start, end } => {
                messages::render("attendance.trainingTimeRange", &[end, start])
            }
        }
    }
}

/// A single field-level validation failure, addressed by the JSON path of
/// the offending form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, derive_more::Display)]
#[display(fmt = "{}: {}", field, message)]
pub struct FieldError {
    #[schema(example = "attendance_list[0].training_start_time_minute")]
    pub field: String,
    #[schema(example = "The start time entry is incomplete.")]
    pub message: String,
}

fn field_path(index: usize, name: &str) -> String {
    format!("attendance_list[{}].{}", index, name)
}

/// Guard run before any punch mutation. Check order: student role, then
/// training-day calendar, then the state of the stored record. Advisory
/// only; concurrent writers are serialized by the database, not here.
pub fn punch_check(
    user: &AuthUser,
    kind: PunchKind,
    is_work_day: bool,
    existing: Option<&StudentAttendance>,
    now: TrainingTime,
) -> Result<(), PunchError> {
    if !user.is_student() {
        return Err(PunchError::NotAuthorized);
    }
    if !is_work_day {
        return Err(PunchError::NotWorkDay);
    }
    match kind {
        PunchKind::In => {
            if let Some(record) = existing {
                if !record.training_start_time.is_empty() {
                    return Err(PunchError::AlreadyRecorded);
                }
            }
        }
        PunchKind::Out => {
            let record = match existing {
                Some(record) if !record.training_start_time.is_empty() => record,
                _ => return Err(PunchError::NoStartRecorded),
            };
            if !record.training_end_time.is_empty() {
                return Err(PunchError::AlreadyRecorded);
            }
            if record.training_start_time > now {
                return Err(PunchError::EndBeforeStart {
                    start: record.training_start_time.to_string(),
                    end: now.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Builds the row a punch-in writes. A leftover row for the day with no
/// start time yet is reused and keeps its identity.
pub fn build_punch_in(
    user: &AuthUser,
    existing: Option<StudentAttendance>,
    training_date: NaiveDate,
    now_time: TrainingTime,
    now: NaiveDateTime,
    work_start: TrainingTime,
    work_end: TrainingTime,
) -> RecordWrite {
    let mut record = existing
        .unwrap_or_else(|| StudentAttendance::new(user.lms_user_id, user.account_id, training_date));
    record.training_start_time = now_time;
    record.status = derive_status(now_time, TrainingTime::empty(), work_start, work_end);
    record.delete_flg = false;
    record.last_modified_user = Some(user.lms_user_id);
    record.last_modified_date = Some(now);
    if record.student_attendance_id.is_none() {
        record.first_create_user = Some(user.lms_user_id);
        record.first_create_date = Some(now);
    }
    RecordWrite::from_record(record)
}

/// Builds the row a punch-out writes: sets the end time and re-derives the
/// status from both recorded times.
pub fn build_punch_out(
    user: &AuthUser,
    mut record: StudentAttendance,
    now_time: TrainingTime,
    now: NaiveDateTime,
    work_start: TrainingTime,
    work_end: TrainingTime,
) -> RecordWrite {
    record.training_end_time = now_time;
    record.status = derive_status(record.training_start_time, now_time, work_start, work_end);
    record.delete_flg = false;
    record.last_modified_user = Some(user.lms_user_id);
    record.last_modified_date = Some(now);
    RecordWrite::from_record(record)
}

/// Validates every submitted day independently, accumulating field errors
/// across the whole batch. Any error blocks all writes for the submission.
pub fn validate_entries(entries: &[DailyAttendanceEntry]) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        if entry.note.chars().count() > NOTE_MAX_CHARS {
            errors.push(FieldError {
                field: field_path(i, "note"),
                message: messages::render("maxlength", &["note", "100"]),
            });
        }

        let start_hour = entry.training_start_time_hour;
        let start_minute = entry.training_start_time_minute;
        let end_hour = entry.training_end_time_hour;
        let end_minute = entry.training_end_time_minute;

        // Hour and minute must come as a pair; the error points at the
        // missing half.
        if start_hour.is_none() && start_minute.is_some() {
            errors.push(FieldError {
                field: field_path(i, "training_start_time_hour"),
                message: messages::render("input.invalid", &[START_TIME_LABEL]),
            });
        }
        if start_hour.is_some() && start_minute.is_none() {
            errors.push(FieldError {
                field: field_path(i, "training_start_time_minute"),
                message: messages::render("input.invalid", &[START_TIME_LABEL]),
            });
        }
        if end_hour.is_none() && end_minute.is_some() {
            errors.push(FieldError {
                field: field_path(i, "training_end_time_hour"),
                message: messages::render("input.invalid", &[END_TIME_LABEL]),
            });
        }
        if end_hour.is_some() && end_minute.is_none() {
            errors.push(FieldError {
                field: field_path(i, "training_end_time_minute"),
                message: messages::render("input.invalid", &[END_TIME_LABEL]),
            });
        }

        if start_hour.is_none()
            && start_minute.is_none()
            && end_hour.is_some()
            && end_minute.is_some()
        {
            errors.push(FieldError {
                field: field_path(i, "training_start_time_hour"),
                message: messages::render("attendance.punchInEmpty", &[]),
            });
        }

        if let (Some(sh), Some(sm), Some(eh), Some(em)) =
            (start_hour, start_minute, end_hour, end_minute)
        {
            let start_disp = format!("{}:{}", pad2(&sh.to_string()), pad2(&sm.to_string()));
            let end_disp = format!("{}:{}", pad2(&eh.to_string()), pad2(&em.to_string()));
            if sh > eh {
                errors.push(FieldError {
                    field: field_path(i, "training_start_time_hour"),
                    message: messages::render(
                        "attendance.trainingTimeRange",
                        &[&end_disp, &start_disp],
                    ),
                });
            } else if sh == eh && sm > em {
                errors.push(FieldError {
                    field: field_path(i, "training_start_time_minute"),
                    message: messages::render(
                        "attendance.trainingTimeRange",
                        &[&end_disp, &start_disp],
                    ),
                });
            }

            // Elapsed time may be negative here when the range above already
            // failed; the break check still runs on the whole batch.
            let elapsed = i64::from(eh * 60 + em) - i64::from(sh * 60 + sm);
            if let Some(blank) = entry.blank_time {
                if i64::from(blank) > elapsed {
                    errors.push(FieldError {
                        field: field_path(i, "blank_time"),
                        message: messages::render("attendance.blankTimeError", &[]),
                    });
                }
            }
        }
    }
    errors
}

/// Merges validated edit entries into the user's stored records.
///
/// Each entry claims at most one existing record, matched by training date;
/// the match keeps its identity and creation audit and has its mutable
/// fields overwritten. Unmatched entries become fresh rows. Status is
/// re-derived from the edited times unless the entry carries the absence
/// marker, which is preserved verbatim. Every returned write covers exactly
/// one record.
pub fn reconcile(
    entries: &[DailyAttendanceEntry],
    existing: Vec<StudentAttendance>,
    target_lms_user_id: u64,
    actor: &AuthUser,
    now: NaiveDateTime,
    work_start: TrainingTime,
    work_end: TrainingTime,
) -> Vec<RecordWrite> {
    let mut remaining = existing;
    let mut writes = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut record = match remaining
            .iter()
            .position(|r| r.training_date == entry.training_date)
        {
            Some(idx) => remaining.remove(idx),
            None => StudentAttendance::new(target_lms_user_id, actor.account_id, entry.training_date),
        };

        let start = entry.start_time();
        let end = entry.end_time();

        record.lms_user_id = target_lms_user_id;
        record.account_id = actor.account_id;
        record.training_start_time = start;
        record.training_end_time = end;
        record.blank_time = entry.blank_time;
        record.note = entry.note.clone();
        record.status = if entry.is_marked_absent() {
            Some(AttendanceStatus::Absent)
        } else {
            derive_status(start, end, work_start, work_end)
        };
        record.delete_flg = false;
        record.last_modified_user = Some(actor.lms_user_id);
        record.last_modified_date = Some(now);
        if record.student_attendance_id.is_none() {
            record.first_create_user = Some(actor.lms_user_id);
            record.first_create_date = Some(now);
        }
        writes.push(RecordWrite::from_record(record));
    }
    writes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use chrono::NaiveDate;

    fn student() -> AuthUser {
        AuthUser {
            lms_user_id: 7,
            login_id: "student01".into(),
            user_name: "Taro Yamada".into(),
            role: Role::Student,
            account_id: 1,
            course_id: 3,
        }
    }

    fn teacher() -> AuthUser {
        AuthUser {
            lms_user_id: 2,
            login_id: "teacher01".into(),
            user_name: "Hanako Sato".into(),
            role: Role::Teacher,
            account_id: 1,
            course_id: 3,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 3).unwrap()
    }

    fn now_dt() -> NaiveDateTime {
        date().and_hms_opt(9, 0, 0).unwrap()
    }

    fn boundaries() -> (TrainingTime, TrainingTime) {
        (TrainingTime::parse("09:00"), TrainingTime::parse("18:00"))
    }

    fn stored(start: &str, end: &str) -> StudentAttendance {
        let mut record = StudentAttendance::new(7, 1, date());
        record.student_attendance_id = Some(42);
        record.training_start_time = TrainingTime::parse(start);
        record.training_end_time = TrainingTime::parse(end);
        record.first_create_user = Some(7);
        record.first_create_date = Some(date().and_hms_opt(9, 0, 0).unwrap());
        record
    }

    fn entry(date: NaiveDate) -> DailyAttendanceEntry {
        DailyAttendanceEntry {
            training_date: date,
            training_start_time_hour: None,
            training_start_time_minute: None,
            training_end_time_hour: None,
            training_end_time_minute: None,
            blank_time: None,
            note: String::new(),
            status_label: String::new(),
        }
    }

    #[test]
    fn punch_in_requires_student_role() {
        let err = punch_check(&teacher(), PunchKind::In, true, None, TrainingTime::parse("09:00"));
        assert_eq!(err, Err(PunchError::NotAuthorized));
    }

    #[test]
    fn punch_in_requires_a_training_day() {
        let err = punch_check(&student(), PunchKind::In, false, None, TrainingTime::parse("09:00"));
        assert_eq!(err, Err(PunchError::NotWorkDay));
    }

    #[test]
    fn punch_in_rejected_once_start_is_recorded() {
        let record = stored("09:00", "");
        let err = punch_check(
            &student(),
            PunchKind::In,
            true,
            Some(&record),
            TrainingTime::parse("09:05"),
        );
        assert_eq!(err, Err(PunchError::AlreadyRecorded));
    }

    #[test]
    fn punch_in_allowed_when_day_is_open() {
        assert!(punch_check(&student(), PunchKind::In, true, None, TrainingTime::parse("09:00")).is_ok());
        // a leftover row without a start time does not block the punch
        let record = stored("", "");
        assert!(punch_check(
            &student(),
            PunchKind::In,
            true,
            Some(&record),
            TrainingTime::parse("09:00")
        )
        .is_ok());
    }

    #[test]
    fn punch_out_without_start_is_rejected() {
        let err = punch_check(&student(), PunchKind::Out, true, None, TrainingTime::parse("18:00"));
        assert_eq!(err, Err(PunchError::NoStartRecorded));

        let record = stored("", "");
        let err = punch_check(
            &student(),
            PunchKind::Out,
            true,
            Some(&record),
            TrainingTime::parse("18:00"),
        );
        assert_eq!(err, Err(PunchError::NoStartRecorded));
    }

    #[test]
    fn punch_out_rejected_once_end_is_recorded() {
        let record = stored("09:00", "18:00");
        let err = punch_check(
            &student(),
            PunchKind::Out,
            true,
            Some(&record),
            TrainingTime::parse("18:30"),
        );
        assert_eq!(err, Err(PunchError::AlreadyRecorded));
    }

    #[test]
    fn punch_out_cannot_precede_start() {
        let record = stored("09:00", "");
        let err = punch_check(
            &student(),
            PunchKind::Out,
            true,
            Some(&record),
            TrainingTime::parse("08:30"),
        );
        assert_eq!(
            err,
            Err(PunchError::EndBeforeStart {
                start: "09:00".into(),
                end: "08:30".into()
            })
        );
        if let Err(e) = err {
            let message = e.message();
            assert!(message.contains("08:30") && message.contains("09:00"));
        }
    }

    #[test]
    fn punch_out_in_the_same_minute_is_allowed() {
        let record = stored("09:00", "");
        assert!(punch_check(
            &student(),
            PunchKind::Out,
            true,
            Some(&record),
            TrainingTime::parse("09:00")
        )
        .is_ok());
    }

    #[test]
    fn punch_in_builds_an_insert_with_audit_stamps() {
        let (ws, we) = boundaries();
        let write = build_punch_in(
            &student(),
            None,
            date(),
            TrainingTime::parse("08:55"),
            now_dt(),
            ws,
            we,
        );
        let RecordWrite::Insert(record) = write else {
            panic!("expected an insert for a fresh day");
        };
        assert_eq!(record.training_start_time.to_string(), "08:55");
        assert!(record.training_end_time.is_empty());
        assert_eq!(record.status, Some(AttendanceStatus::OnTime));
        assert_eq!(record.first_create_user, Some(7));
        assert_eq!(record.first_create_date, Some(now_dt()));
        assert_eq!(record.last_modified_user, Some(7));
    }

    #[test]
    fn late_punch_in_reuses_a_leftover_row() {
        let (ws, we) = boundaries();
        let write = build_punch_in(
            &student(),
            Some(stored("", "")),
            date(),
            TrainingTime::parse("09:20"),
            now_dt(),
            ws,
            we,
        );
        let RecordWrite::Update { id, record } = write else {
            panic!("expected the stored row to be reused");
        };
        assert_eq!(id, 42);
        assert_eq!(record.status, Some(AttendanceStatus::Tardy));
        // creation audit of the reused row is untouched
        assert_eq!(record.first_create_user, Some(7));
    }

    #[test]
    fn punch_out_re_derives_status_from_both_times() {
        let (ws, we) = boundaries();
        let write = build_punch_out(
            &student(),
            stored("09:30", ""),
            TrainingTime::parse("16:00"),
            now_dt(),
            ws,
            we,
        );
        let RecordWrite::Update { record, .. } = write else {
            panic!("expected an update");
        };
        assert_eq!(record.training_end_time.to_string(), "16:00");
        assert_eq!(record.status, Some(AttendanceStatus::TardyAndLeavingEarly));
    }

    #[test]
    fn lone_start_hour_flags_only_the_minute_field() {
        let mut e = entry(date());
        e.training_start_time_hour = Some(9);
        let errors = validate_entries(&[e]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "attendance_list[0].training_start_time_minute");
    }

    #[test]
    fn lone_minute_flags_the_hour_field() {
        let mut e = entry(date());
        e.training_end_time_minute = Some(30);
        let errors = validate_entries(&[e]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "attendance_list[0].training_end_time_hour");
    }

    #[test]
    fn end_without_start_is_rejected() {
        let mut e = entry(date());
        e.training_end_time_hour = Some(18);
        e.training_end_time_minute = Some(0);
        let errors = validate_entries(&[e]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "attendance_list[0].training_start_time_hour");
        assert_eq!(
            errors[0].message,
            messages::render("attendance.punchInEmpty", &[])
        );
    }

    #[test]
    fn end_before_start_reports_both_times_on_the_start_field() {
        let mut e = entry(date());
        e.training_start_time_hour = Some(9);
        e.training_start_time_minute = Some(0);
        e.training_end_time_hour = Some(8);
        e.training_end_time_minute = Some(30);
        let errors = validate_entries(&[e]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "attendance_list[0].training_start_time_hour");
        assert!(errors[0].message.contains("08:30"));
        assert!(errors[0].message.contains("09:00"));
    }

    #[test]
    fn minute_only_regression_points_at_the_minute_field() {
        let mut e = entry(date());
        e.training_start_time_hour = Some(9);
        e.training_start_time_minute = Some(30);
        e.training_end_time_hour = Some(9);
        e.training_end_time_minute = Some(10);
        let errors = validate_entries(&[e]);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].field,
            "attendance_list[0].training_start_time_minute"
        );
    }

    #[test]
    fn break_longer_than_the_day_is_rejected() {
        let mut e = entry(date());
        e.training_start_time_hour = Some(9);
        e.training_start_time_minute = Some(0);
        e.training_end_time_hour = Some(10);
        e.training_end_time_minute = Some(0);
        e.blank_time = Some(90);
        let errors = validate_entries(&[e]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "attendance_list[0].blank_time");
    }

    #[test]
    fn break_equal_to_elapsed_passes() {
        let mut e = entry(date());
        e.training_start_time_hour = Some(9);
        e.training_start_time_minute = Some(0);
        e.training_end_time_hour = Some(10);
        e.training_end_time_minute = Some(0);
        e.blank_time = Some(60);
        assert!(validate_entries(&[e]).is_empty());
    }

    #[test]
    fn long_note_is_rejected_at_101_chars() {
        let mut e = entry(date());
        e.note = "x".repeat(101);
        let errors = validate_entries(&[e]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "attendance_list[0].note");

        let mut ok = entry(date());
        ok.note = "x".repeat(100);
        assert!(validate_entries(&[ok]).is_empty());
    }

    #[test]
    fn errors_accumulate_across_entries() {
        let mut first = entry(date());
        first.training_start_time_hour = Some(9);
        let mut second = entry(NaiveDate::from_ymd_opt(2026, 8, 4).unwrap());
        second.note = "x".repeat(101);
        let errors = validate_entries(&[first, second]);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].field.starts_with("attendance_list[0]."));
        assert!(errors[1].field.starts_with("attendance_list[1]."));
    }

    #[test]
    fn reconcile_creates_an_insert_for_an_unmatched_day() {
        let (ws, we) = boundaries();
        let mut e = entry(date());
        e.training_start_time_hour = Some(9);
        e.training_start_time_minute = Some(0);
        e.training_end_time_hour = Some(18);
        e.training_end_time_minute = Some(0);
        let writes = reconcile(&[e], Vec::new(), 7, &student(), now_dt(), ws, we);
        assert_eq!(writes.len(), 1);
        let RecordWrite::Insert(record) = &writes[0] else {
            panic!("expected an insert");
        };
        assert_eq!(record.student_attendance_id, None);
        assert_eq!(record.status, Some(AttendanceStatus::OnTime));
        assert_eq!(record.first_create_user, Some(7));
        assert_eq!(record.first_create_date, Some(now_dt()));
    }

    #[test]
    fn reconcile_overwrites_a_matched_record_in_place() {
        let (ws, we) = boundaries();
        let mut e = entry(date());
        e.training_start_time_hour = Some(10);
        e.training_start_time_minute = Some(15);
        e.training_end_time_hour = Some(18);
        e.training_end_time_minute = Some(0);
        e.blank_time = Some(30);
        e.note = "arrived late".into();

        let writes = reconcile(&[e], vec![stored("09:00", "18:00")], 7, &teacher(), now_dt(), ws, we);
        assert_eq!(writes.len(), 1);
        let RecordWrite::Update { id, record } = &writes[0] else {
            panic!("expected an update");
        };
        assert_eq!(*id, 42);
        assert_eq!(record.training_start_time.to_string(), "10:15");
        assert_eq!(record.status, Some(AttendanceStatus::Tardy));
        assert_eq!(record.blank_time, Some(30));
        assert_eq!(record.note, "arrived late");
        // identity and creation audit survive; the modifier is the actor
        assert_eq!(record.student_attendance_id, Some(42));
        assert_eq!(record.first_create_user, Some(7));
        assert_eq!(record.last_modified_user, Some(2));
        assert_eq!(record.last_modified_date, Some(now_dt()));
    }

    #[test]
    fn absence_marker_is_preserved_verbatim() {
        let (ws, we) = boundaries();
        let mut e = entry(date());
        e.status_label = AttendanceStatus::Absent.display_name();
        let writes = reconcile(&[e], Vec::new(), 7, &student(), now_dt(), ws, we);
        assert_eq!(writes[0].record().status, Some(AttendanceStatus::Absent));
    }

    #[test]
    fn clearing_both_times_leaves_the_day_not_entered() {
        let (ws, we) = boundaries();
        let e = entry(date());
        let writes = reconcile(&[e], vec![stored("09:00", "18:00")], 7, &student(), now_dt(), ws, we);
        assert_eq!(writes[0].record().status, None);
    }

    #[test]
    fn each_submitted_day_is_written_exactly_once() {
        let (ws, we) = boundaries();
        let other_date = NaiveDate::from_ymd_opt(2026, 8, 4).unwrap();
        let entries = vec![entry(date()), entry(other_date)];
        let writes = reconcile(
            &entries,
            vec![stored("09:00", "18:00")],
            7,
            &student(),
            now_dt(),
            ws,
            we,
        );
        assert_eq!(writes.len(), 2);
        assert!(matches!(writes[0], RecordWrite::Update { id: 42, .. }));
        assert!(matches!(writes[1], RecordWrite::Insert(_)));
    }
}
