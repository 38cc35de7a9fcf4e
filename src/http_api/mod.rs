use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::persistence::{DynCourseStore, StoreError};
use crate::timetable::{ExamCountdown, GRID_DAY_COLUMNS, Timetable, TimetableError};
use crate::{Course, Semester, SlotRange, TimeSlot, TimeSlotTable, WeekRange, WeekView};

pub type SharedTimetable = Arc<Mutex<Timetable<DynCourseStore>>>;

#[derive(Clone)]
pub struct AppState {
    timetable: SharedTimetable,
}

impl AppState {
    pub fn new(timetable: Timetable<DynCourseStore>) -> Self {
        Self {
            timetable: Arc::new(Mutex::new(timetable)),
        }
    }

    pub fn with_shared(timetable: SharedTimetable) -> Self {
        Self { timetable }
    }

    fn timetable(&self) -> SharedTimetable {
        self.timetable.clone()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Internal(String),
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<TimetableError> for ApiError {
    fn from(value: TimetableError) -> Self {
        let message = value.to_string();
        match value {
            TimetableError::Validation(_) => ApiError::Invalid(message),
            TimetableError::NotFound(_)
            | TimetableError::UnknownSemester(_)
            | TimetableError::Store(StoreError::NotFound(_)) => ApiError::NotFound(message),
            TimetableError::Conflict { .. } => ApiError::Conflict(message),
            TimetableError::Store(_) | TimetableError::Grid(_) => {
                error!(%message, "request failed");
                ApiError::Internal(message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct CourseQuery {
    week: Option<u32>,
    day: Option<u8>,
    q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ForceQuery {
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ExamQuery {
    today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct RangePayload {
    template: Course,
    lessons: SlotRange,
    weeks: WeekRange,
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Serialize)]
struct RangeCreated {
    ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct GridRow {
    slot: i32,
    time: String,
    days: Vec<String>,
}

#[derive(Debug, Serialize)]
struct WeekResponse {
    week: u32,
    label: String,
    courses: Vec<Course>,
    grid: Vec<GridRow>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/range", post(create_course_range))
        .route(
            "/courses/:id",
            get(get_course).put(update_course).delete(delete_course),
        )
        .route("/courses/:id/exam", get(course_exam))
        .route("/weeks/:week", get(get_week))
        .route("/semester", get(get_semester).put(put_semester))
        .route("/time-slots", get(get_time_slots).put(put_time_slots))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, timetable: Timetable<DynCourseStore>) -> std::io::Result<()> {
    let state = AppState::new(timetable);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseQuery>,
) -> Result<Json<Vec<Course>>, ApiError> {
    let timetable = state.timetable();
    let guard = timetable.lock();
    let mut courses = match (&query.q, query.week) {
        (Some(keyword), _) => guard.search(keyword)?,
        (None, Some(week)) => guard.courses_for_week(week)?,
        (None, None) => guard.courses()?,
    };
    if let Some(week) = query.week.filter(|_| query.q.is_some()) {
        courses.retain(|course| course.weeks.contains(week));
    }
    if let Some(day) = query.day {
        courses.retain(|course| course.weekday == day);
    }
    Ok(Json(courses))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Course>, ApiError> {
    let timetable = state.timetable();
    let course = timetable.lock().course(id)?;
    Ok(Json(course))
}

async fn create_course(
    State(state): State<AppState>,
    Query(options): Query<ForceQuery>,
    Json(mut course): Json<Course>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    course.id = None;
    let timetable = state.timetable();
    let created = {
        let mut guard = timetable.lock();
        let id = guard.add_course(course, options.force)?;
        guard.course(id)?
    };
    Ok((StatusCode::CREATED, Json(created)))
}

async fn create_course_range(
    State(state): State<AppState>,
    Json(payload): Json<RangePayload>,
) -> Result<(StatusCode, Json<RangeCreated>), ApiError> {
    let timetable = state.timetable();
    let ids = timetable.lock().add_course_range(
        &payload.template,
        payload.lessons,
        payload.weeks,
        payload.force,
    )?;
    Ok((StatusCode::CREATED, Json(RangeCreated { ids })))
}

async fn update_course(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(options): Query<ForceQuery>,
    Json(mut course): Json<Course>,
) -> Result<Json<Course>, ApiError> {
    match course.id {
        Some(body_id) if body_id != id => {
            return Err(ApiError::invalid(
                "course id in payload does not match path parameter",
            ));
        }
        _ => course.id = Some(id),
    }
    let timetable = state.timetable();
    let updated = {
        let mut guard = timetable.lock();
        guard.update_course(course, options.force)?;
        guard.course(id)?
    };
    Ok(Json(updated))
}

async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let timetable = state.timetable();
    let removed = timetable.lock().delete_course(id)?;
    if !removed {
        return Err(ApiError::NotFound(format!("course {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn course_exam(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ExamQuery>,
) -> Result<Json<ExamCountdown>, ApiError> {
    let today = query
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let timetable = state.timetable();
    let countdown = timetable.lock().exam_countdown(id, today)?;
    Ok(Json(countdown))
}

async fn get_week(
    State(state): State<AppState>,
    Path(week): Path<u32>,
) -> Result<Json<WeekResponse>, ApiError> {
    let timetable = state.timetable();
    let guard = timetable.lock();
    let courses = guard.courses_for_week(week)?;
    let df = guard.week_grid(week).map_err(ApiError::from)?;
    let label = WeekView::for_week(guard.semester(), week)
        .map(|view| view.label(guard.semester()))
        .ok_or_else(|| ApiError::invalid(format!("week {week} has no calendar dates")))?;
    drop(guard);

    let grid = grid_rows(&df).map_err(|err| ApiError::from(TimetableError::Grid(err)))?;
    Ok(Json(WeekResponse {
        week,
        label,
        courses,
        grid,
    }))
}

fn grid_rows(df: &polars::prelude::DataFrame) -> polars::prelude::PolarsResult<Vec<GridRow>> {
    let slots = df.column("slot")?.i32()?;
    let times = df.column("time")?.str()?;
    let mut days = Vec::with_capacity(GRID_DAY_COLUMNS.len());
    for name in GRID_DAY_COLUMNS {
        days.push(df.column(name)?.str()?);
    }
    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        rows.push(GridRow {
            slot: slots.get(idx).unwrap_or_default(),
            time: times.get(idx).unwrap_or_default().to_string(),
            days: days
                .iter()
                .map(|column| column.get(idx).unwrap_or_default().to_string())
                .collect(),
        });
    }
    Ok(rows)
}

async fn get_semester(State(state): State<AppState>) -> Json<Semester> {
    let timetable = state.timetable();
    let semester = timetable.lock().semester().clone();
    Json(semester)
}

async fn put_semester(
    State(state): State<AppState>,
    Json(semester): Json<Semester>,
) -> Result<Json<Semester>, ApiError> {
    let timetable = state.timetable();
    let current = {
        let mut guard = timetable.lock();
        guard.set_semester(semester)?;
        guard.semester().clone()
    };
    Ok(Json(current))
}

async fn get_time_slots(State(state): State<AppState>) -> Json<Vec<TimeSlot>> {
    let timetable = state.timetable();
    let slots = timetable.lock().time_slots().iter().copied().collect();
    Json(slots)
}

async fn put_time_slots(
    State(state): State<AppState>,
    Json(slots): Json<Vec<TimeSlot>>,
) -> Result<Json<Vec<TimeSlot>>, ApiError> {
    let table = TimeSlotTable::from_slots(slots).map_err(|err| ApiError::invalid(err.to_string()))?;
    let timetable = state.timetable();
    let current = {
        let mut guard = timetable.lock();
        guard.set_time_slots(table)?;
        guard.time_slots().iter().copied().collect()
    };
    Ok(Json(current))
}
