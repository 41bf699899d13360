use crate::api::attendance::{
    AttendanceDayResponse, AttendanceFormQuery, AttendanceFormResponse, AttendanceListResponse,
    DailyAttendanceFormRow, SelectOption, UpdateAttendanceReq,
};
use crate::model::attendance::{AttendanceStatus, DailyAttendanceEntry};
use crate::service::attendance::FieldError;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "LMS Attendance API",
        version = "1.0.0",
        description = r#"
## Student Attendance Tracking

This API powers the attendance feature of a learning management system (LMS).

### 🔹 Key Features
- **Punch in / punch out**
  - One tap start and end of a training day, guarded by pre-write checks
- **Attendance list**
  - Scheduled training dates joined with recorded times and late / early-leave status
- **Direct edit**
  - Correct recorded times, breaks and notes for every visible day in one batch

### 🔐 Security
All attendance endpoints are protected using **JWT Bearer authentication**.
Students manage their own sheet; teachers and admins may edit on a student's behalf.

### 📦 Response Format
- JSON-based RESTful responses
- Field-level validation errors are returned next to the offending form fields

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::get_attendance,
        crate::api::attendance::punch_in,
        crate::api::attendance::punch_out,
        crate::api::attendance::get_attendance_form,
        crate::api::attendance::update_attendance
    ),
    components(
        schemas(
            AttendanceListResponse,
            AttendanceDayResponse,
            AttendanceFormResponse,
            AttendanceFormQuery,
            DailyAttendanceFormRow,
            DailyAttendanceEntry,
            UpdateAttendanceReq,
            SelectOption,
            AttendanceStatus,
            FieldError
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Attendance management APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
