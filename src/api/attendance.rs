use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::model::attendance::{
    AttendanceStatus, DailyAttendanceEntry, RecordWrite, StudentAttendance, StudentAttendanceRow,
};
use crate::service::attendance::{self as attendance_service, PunchKind};
use crate::utils::attendance as attendance_util;
use crate::utils::messages;
use crate::utils::training_time::TrainingTime;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

/* =========================
Persistence access
========================= */

const SELECT_ATTENDANCE: &str = r#"
    SELECT student_attendance_id, lms_user_id, account_id, training_date,
           training_start_time, training_end_time, status, note, blank_time,
           delete_flg, first_create_user, first_create_date,
           last_modified_user, last_modified_date
    FROM t_student_attendance
"#;

async fn find_record(
    pool: &MySqlPool,
    lms_user_id: u64,
    training_date: NaiveDate,
) -> Result<Option<StudentAttendance>, sqlx::Error> {
    let sql = format!(
        "{} WHERE lms_user_id = ? AND training_date = ? AND delete_flg = 0",
        SELECT_ATTENDANCE
    );
    let row = sqlx::query_as::<_, StudentAttendanceRow>(&sql)
        .bind(lms_user_id)
        .bind(training_date)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(StudentAttendance::from))
}

async fn find_all_records(
    pool: &MySqlPool,
    lms_user_id: u64,
) -> Result<Vec<StudentAttendance>, sqlx::Error> {
    let sql = format!(
        "{} WHERE lms_user_id = ? AND delete_flg = 0 ORDER BY training_date",
        SELECT_ATTENDANCE
    );
    let rows = sqlx::query_as::<_, StudentAttendanceRow>(&sql)
        .bind(lms_user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(StudentAttendance::from).collect())
}

async fn is_work_day(
    pool: &MySqlPool,
    course_id: u64,
    training_date: NaiveDate,
) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM m_course_schedule WHERE course_id = ? AND training_date = ?",
    )
    .bind(course_id)
    .bind(training_date)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

#[derive(sqlx::FromRow)]
struct TargetUserSql {
    user_name: String,
    course_id: u64,
}

async fn find_target_user(
    pool: &MySqlPool,
    lms_user_id: u64,
) -> Result<Option<TargetUserSql>, sqlx::Error> {
    sqlx::query_as::<_, TargetUserSql>(
        "SELECT user_name, course_id FROM m_lms_user WHERE lms_user_id = ? AND delete_flg = 0",
    )
    .bind(lms_user_id)
    .fetch_optional(pool)
    .await
}

/// Scheduled days up to today with no recorded start time.
async fn not_entered_count(
    pool: &MySqlPool,
    course_id: u64,
    lms_user_id: u64,
    as_of: NaiveDate,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM m_course_schedule s
        LEFT JOIN t_student_attendance a
            ON a.training_date = s.training_date
            AND a.lms_user_id = ?
            AND a.delete_flg = 0
        WHERE s.course_id = ?
        AND s.training_date <= ?
        AND (a.student_attendance_id IS NULL OR a.training_start_time = '')
        "#,
    )
    .bind(lms_user_id)
    .bind(course_id)
    .bind(as_of)
    .fetch_one(pool)
    .await
}

async fn insert_record(pool: &MySqlPool, record: &StudentAttendance) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO t_student_attendance
            (lms_user_id, account_id, training_date, training_start_time,
             training_end_time, status, note, blank_time, delete_flg,
             first_create_user, first_create_date, last_modified_user, last_modified_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.lms_user_id)
    .bind(record.account_id)
    .bind(record.training_date)
    .bind(record.training_start_time.to_string())
    .bind(record.training_end_time.to_string())
    .bind(record.status_code())
    .bind(&record.note)
    .bind(record.blank_time)
    .bind(record.delete_flg)
    .bind(record.first_create_user)
    .bind(record.first_create_date)
    .bind(record.last_modified_user)
    .bind(record.last_modified_date)
    .execute(pool)
    .await?;
    Ok(())
}

async fn update_record(
    pool: &MySqlPool,
    id: u64,
    record: &StudentAttendance,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE t_student_attendance
        SET lms_user_id = ?, account_id = ?, training_date = ?,
            training_start_time = ?, training_end_time = ?, status = ?,
            note = ?, blank_time = ?, delete_flg = ?,
            last_modified_user = ?, last_modified_date = ?
        WHERE student_attendance_id = ?
        "#,
    )
    .bind(record.lms_user_id)
    .bind(record.account_id)
    .bind(record.training_date)
    .bind(record.training_start_time.to_string())
    .bind(record.training_end_time.to_string())
    .bind(record.status_code())
    .bind(&record.note)
    .bind(record.blank_time)
    .bind(record.delete_flg)
    .bind(record.last_modified_user)
    .bind(record.last_modified_date)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn apply_write(pool: &MySqlPool, write: &RecordWrite) -> Result<(), sqlx::Error> {
    match write {
        RecordWrite::Insert(record) => insert_record(pool, record).await,
        RecordWrite::Update { id, record } => update_record(pool, *id, record).await,
    }
}

#[derive(sqlx::FromRow)]
struct AttendanceListSql {
    training_date: NaiveDate,
    section_name: String,
    student_attendance_id: Option<u64>,
    training_start_time: Option<String>,
    training_end_time: Option<String>,
    status: Option<i16>,
    note: Option<String>,
    blank_time: Option<u16>,
}

/// Schedule left-joined with the user's attendance, one row per training day.
async fn attendance_management(
    pool: &MySqlPool,
    course_id: u64,
    lms_user_id: u64,
) -> Result<Vec<AttendanceListSql>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceListSql>(
        r#"
        SELECT s.training_date, s.section_name,
               a.student_attendance_id, a.training_start_time, a.training_end_time,
               a.status, a.note, a.blank_time
        FROM m_course_schedule s
        LEFT JOIN t_student_attendance a
            ON a.training_date = s.training_date
            AND a.lms_user_id = ?
            AND a.delete_flg = 0
        WHERE s.course_id = ?
        ORDER BY s.training_date
        "#,
    )
    .bind(lms_user_id)
    .bind(course_id)
    .fetch_all(pool)
    .await
}

/* =========================
Response shapes
========================= */

#[derive(Serialize, ToSchema)]
pub struct AttendanceDayResponse {
    #[schema(example = 42)]
    pub student_attendance_id: Option<u64>,
    #[schema(example = "2026-08-03", format = "date", value_type = String)]
    pub training_date: NaiveDate,
    #[schema(example = "2026-08-03 (Mon)")]
    pub disp_training_date: String,
    #[schema(example = "Java basics")]
    pub section_name: String,
    pub is_today: bool,
    #[schema(example = "09:00")]
    pub training_start_time: String,
    #[schema(example = "18:00")]
    pub training_end_time: String,
    pub status: Option<AttendanceStatus>,
    #[schema(example = "late")]
    pub status_disp_name: String,
    #[schema(example = 60)]
    pub blank_time: Option<u16>,
    #[schema(example = "1:00")]
    pub blank_time_disp: String,
    pub note: String,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceDayResponse>,
    /// Scheduled days up to today still missing a start time
    #[schema(example = 2)]
    pub not_entered_count: i64,
}

#[derive(Serialize, ToSchema)]
pub struct SelectOption {
    #[schema(example = 9)]
    pub value: u32,
    #[schema(example = "09")]
    pub label: String,
}

#[derive(Serialize, ToSchema)]
pub struct DailyAttendanceFormRow {
    pub student_attendance_id: Option<u64>,
    #[schema(example = "2026-08-03", format = "date", value_type = String)]
    pub training_date: NaiveDate,
    pub disp_training_date: String,
    pub section_name: String,
    pub is_today: bool,
    pub training_start_time_hour: Option<u32>,
    pub training_start_time_minute: Option<u32>,
    pub training_end_time_hour: Option<u32>,
    pub training_end_time_minute: Option<u32>,
    pub blank_time: Option<u16>,
    pub blank_time_disp: String,
    pub status_label: String,
    pub note: String,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceFormResponse {
    pub lms_user_id: u64,
    pub user_name: String,
    pub attendance_list: Vec<DailyAttendanceFormRow>,
    pub hour_options: Vec<SelectOption>,
    pub minute_options: Vec<SelectOption>,
    pub blank_time_options: Vec<SelectOption>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AttendanceFormQuery {
    /// Target student; another user's sheet requires the teacher or admin role
    #[schema(example = 123)]
    pub lms_user_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateAttendanceReq {
    /// Target student; another user's sheet requires the teacher or admin role
    #[schema(example = 123)]
    pub lms_user_id: Option<u64>,
    pub attendance_list: Vec<DailyAttendanceEntry>,
}

fn day_response(row: AttendanceListSql, today: NaiveDate) -> AttendanceDayResponse {
    let status = row.status.and_then(AttendanceStatus::from_code);
    let start = TrainingTime::parse(row.training_start_time.as_deref().unwrap_or(""));
    let end = TrainingTime::parse(row.training_end_time.as_deref().unwrap_or(""));
    AttendanceDayResponse {
        student_attendance_id: row.student_attendance_id,
        training_date: row.training_date,
        disp_training_date: row.training_date.format("%Y-%m-%d (%a)").to_string(),
        section_name: row.section_name,
        is_today: row.training_date == today,
        training_start_time: start.to_string(),
        training_end_time: end.to_string(),
        status,
        status_disp_name: status.map(AttendanceStatus::display_name).unwrap_or_default(),
        blank_time: row.blank_time,
        blank_time_disp: row
            .blank_time
            .map(attendance_util::blank_time_display)
            .unwrap_or_default(),
        note: row.note.unwrap_or_default(),
    }
}

fn form_row(row: AttendanceListSql, today: NaiveDate) -> DailyAttendanceFormRow {
    let status = row.status.and_then(AttendanceStatus::from_code);
    let start = TrainingTime::parse(row.training_start_time.as_deref().unwrap_or(""));
    let end = TrainingTime::parse(row.training_end_time.as_deref().unwrap_or(""));
    DailyAttendanceFormRow {
        student_attendance_id: row.student_attendance_id,
        training_date: row.training_date,
        disp_training_date: row.training_date.format("%Y-%m-%d (%a)").to_string(),
        section_name: row.section_name,
        is_today: row.training_date == today,
        training_start_time_hour: start.hour(),
        training_start_time_minute: start.minute(),
        training_end_time_hour: end.hour(),
        training_end_time_minute: end.minute(),
        blank_time: row.blank_time,
        blank_time_disp: row
            .blank_time
            .map(attendance_util::blank_time_display)
            .unwrap_or_default(),
        status_label: status.map(AttendanceStatus::display_name).unwrap_or_default(),
        note: row.note.unwrap_or_default(),
    }
}

/* =========================
Attendance list
========================= */
/// Monthly attendance list endpoint
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    responses(
        (status = 200, description = "Attendance list for the caller's course", body = AttendanceListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn get_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let today = attendance_util::current_training_date();

    let rows = attendance_management(pool.get_ref(), auth.course_id, auth.lms_user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, lms_user_id = auth.lms_user_id, "Failed to fetch attendance list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let not_entered = not_entered_count(pool.get_ref(), auth.course_id, auth.lms_user_id, today)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, lms_user_id = auth.lms_user_id, "Failed to count missing days");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let data = rows.into_iter().map(|row| day_response(row, today)).collect();

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data,
        not_entered_count: not_entered,
    }))
}

/* =========================
Punch in
========================= */
/// Punch-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/punch-in",
    responses(
        (status = 200, description = "Punched in successfully", body = Object, example = json!({
            "message": "Attendance has been updated."
        })),
        (status = 400, description = "Punch rejected by a pre-condition", body = Object, example = json!({
            "error": "Attendance for today has already been recorded. Please use direct edit instead."
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn punch_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let training_date = attendance_util::current_training_date();
    let now_time = attendance_util::current_training_time();

    let work_day = is_work_day(pool.get_ref(), auth.course_id, training_date)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, course_id = auth.course_id, "Work day lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let existing = find_record(pool.get_ref(), auth.lms_user_id, training_date)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, lms_user_id = auth.lms_user_id, "Attendance lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    // The whole guard runs before any write
    if let Err(check) = attendance_service::punch_check(
        &auth,
        PunchKind::In,
        work_day,
        existing.as_ref(),
        now_time,
    ) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": check.message()
        })));
    }

    let write = attendance_service::build_punch_in(
        &auth,
        existing,
        training_date,
        now_time,
        Local::now().naive_local(),
        config.work_start_time,
        config.work_end_time,
    );

    apply_write(pool.get_ref(), &write).await.map_err(|e| {
        tracing::error!(error = %e, lms_user_id = auth.lms_user_id, "Punch-in failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": messages::render("attendance.update.notice", &[])
    })))
}

/* =========================
Punch out
========================= */
/// Punch-out endpoint
#[utoipa::path(
    put,
    path = "/api/v1/attendance/punch-out",
    responses(
        (status = 200, description = "Punched out successfully", body = Object, example = json!({
            "message": "Attendance has been updated."
        })),
        (status = 400, description = "Punch rejected by a pre-condition", body = Object, example = json!({
            "error": "An end time cannot be recorded without a start time."
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn punch_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let training_date = attendance_util::current_training_date();
    let now_time = attendance_util::current_training_time();

    let work_day = is_work_day(pool.get_ref(), auth.course_id, training_date)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, course_id = auth.course_id, "Work day lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let existing = find_record(pool.get_ref(), auth.lms_user_id, training_date)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, lms_user_id = auth.lms_user_id, "Attendance lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    if let Err(check) = attendance_service::punch_check(
        &auth,
        PunchKind::Out,
        work_day,
        existing.as_ref(),
        now_time,
    ) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": check.message()
        })));
    }

    let Some(record) = existing else {
        // punch_check already rejects this shape
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": attendance_service::PunchError::NoStartRecorded.message()
        })));
    };

    let write = attendance_service::build_punch_out(
        &auth,
        record,
        now_time,
        Local::now().naive_local(),
        config.work_start_time,
        config.work_end_time,
    );

    apply_write(pool.get_ref(), &write).await.map_err(|e| {
        tracing::error!(error = %e, lms_user_id = auth.lms_user_id, "Punch-out failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": messages::render("attendance.update.notice", &[])
    })))
}

/* =========================
Direct edit form
========================= */
/// Direct edit form endpoint
#[utoipa::path(
    get,
    path = "/api/v1/attendance/form",
    params(AttendanceFormQuery),
    responses(
        (status = 200, description = "Editable attendance sheet with select options", body = AttendanceFormResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn get_attendance_form(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceFormQuery>,
) -> actix_web::Result<impl Responder> {
    // The sheet is labeled with the target's name and follows the target's
    // course calendar, which may differ from the caller's.
    let (target, user_name, course_id) = match query.lms_user_id {
        Some(id) if id != auth.lms_user_id => {
            auth.require_teacher_or_admin()?;
            let user = find_target_user(pool.get_ref(), id)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, lms_user_id = id, "Target user lookup failed");
                    actix_web::error::ErrorInternalServerError("Internal Server Error")
                })?
                .ok_or_else(|| actix_web::error::ErrorNotFound("Unknown student"))?;
            (id, user.user_name, user.course_id)
        }
        _ => (auth.lms_user_id, auth.user_name.clone(), auth.course_id),
    };
    let today = attendance_util::current_training_date();

    let rows = attendance_management(pool.get_ref(), course_id, target)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, lms_user_id = target, "Failed to fetch attendance sheet");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let attendance_list = rows.into_iter().map(|row| form_row(row, today)).collect();

    let hour_options = (0..24)
        .map(|h| SelectOption {
            value: h,
            label: format!("{:02}", h),
        })
        .collect();
    let minute_options = (0..60)
        .map(|m| SelectOption {
            value: m,
            label: format!("{:02}", m),
        })
        .collect();
    let blank_time_options = attendance_util::blank_time_choices()
        .into_iter()
        .map(|m| SelectOption {
            value: u32::from(m),
            label: attendance_util::blank_time_display(m),
        })
        .collect();

    Ok(HttpResponse::Ok().json(AttendanceFormResponse {
        lms_user_id: target,
        user_name,
        attendance_list,
        hour_options,
        minute_options,
        blank_time_options,
    }))
}

/* =========================
Direct edit update
========================= */
/// Batch direct edit endpoint
#[utoipa::path(
    put,
    path = "/api/v1/attendance",
    request_body(
        content = UpdateAttendanceReq,
        description = "One entry per visible training date",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "All entries saved", body = Object, example = json!({
            "message": "Attendance has been updated."
        })),
        (status = 400, description = "Validation failed; nothing was written", body = Object, example = json!({
            "errors": [
                { "field": "attendance_list[0].training_start_time_minute",
                  "message": "The start time entry is incomplete." }
            ]
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<UpdateAttendanceReq>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();

    // Students edit their own sheet; another user's requires teacher/admin
    let target = match payload.lms_user_id {
        Some(id) if id != auth.lms_user_id => {
            auth.require_teacher_or_admin()?;
            id
        }
        _ => auth.lms_user_id,
    };

    // Any field error aborts the whole batch
    let errors = attendance_service::validate_entries(&payload.attendance_list);
    if !errors.is_empty() {
        for err in &errors {
            tracing::debug!(field_error = %err, "Attendance edit rejected");
        }
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "errors": errors
        })));
    }

    let existing = find_all_records(pool.get_ref(), target).await.map_err(|e| {
        tracing::error!(error = %e, lms_user_id = target, "Failed to fetch attendance records");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let writes = attendance_service::reconcile(
        &payload.attendance_list,
        existing,
        target,
        &auth,
        Local::now().naive_local(),
        config.work_start_time,
        config.work_end_time,
    );

    for write in &writes {
        apply_write(pool.get_ref(), write).await.map_err(|e| {
            tracing::error!(error = %e, lms_user_id = target, "Attendance update failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": messages::render("attendance.update.notice", &[])
    })))
}
