use std::net::SocketAddr;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::alert::{self, Evaluation};
use crate::checkin::{self, SubmitRequest};
use crate::db;
use crate::error::{EvaluateError, SubmitError};
use crate::models::{CheckinRecord, ClassCheckin, Emotion, Priority};
use crate::notify::Notifier;
use crate::stats;

const GENERIC_FAILURE: &str = "something went wrong, please try again";

#[derive(Clone)]
struct AppState {
    pool: PgPool,
    notifier: Notifier,
}

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

pub async fn serve(addr: SocketAddr, pool: PgPool, notifier: Notifier) -> anyhow::Result<()> {
    let state = AppState { pool, notifier };
    let app = Router::new()
        .route("/api/checkin", post(submit_checkin))
        .route("/api/evaluate", post(evaluate_student))
        .route("/api/dashboard/:class_id", get(class_dashboard))
        .layer(Extension(state));

    log::info!("Starting ClassPulse HTTP server on http://{addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

/// POST /api/checkin. On success the pattern check runs as a spawned
/// task; the submitter's response never waits on detection or dispatch.
async fn submit_checkin(
    Extension(state): Extension<AppState>,
    Json(request): Json<SubmitRequest>,
) -> (StatusCode, Json<ApiResponse<CheckinRecord>>) {
    match checkin::submit(&state.pool, &request).await {
        Ok(record) => {
            if alert::is_tracked(record.emotion) {
                tokio::spawn(alert::run_post_checkin(
                    state.pool.clone(),
                    state.notifier.clone(),
                    record.student_id,
                ));
            }
            (
                StatusCode::OK,
                Json(ApiResponse::ok("check-in saved", record)),
            )
        }
        Err(SubmitError::Persistence(cause)) => {
            log::error!("check-in persistence failure: {cause:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(GENERIC_FAILURE)),
            )
        }
        Err(rejected) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::err(rejected.to_string())),
        ),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateRequest {
    student_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluationData {
    alert: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pattern: Option<Emotion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    student: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sent: Option<bool>,
}

impl EvaluationData {
    fn no_alert() -> Self {
        Self {
            alert: false,
            pattern: None,
            priority: None,
            student: None,
            class: None,
            sent: None,
        }
    }
}

/// POST /api/evaluate: re-run pattern detection for one student.
async fn evaluate_student(
    Extension(state): Extension<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> (StatusCode, Json<ApiResponse<EvaluationData>>) {
    let Ok(student_id) = Uuid::parse_str(&request.student_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::err("a valid student id is required")),
        );
    };

    match alert::evaluate(&state.pool, &state.notifier, student_id).await {
        Ok(Evaluation::InsufficientHistory { available }) => (
            StatusCode::OK,
            Json(ApiResponse::ok(
                format!("only {available} check-ins on record, 3 are needed"),
                EvaluationData::no_alert(),
            )),
        ),
        Ok(Evaluation::NoPattern) => (
            StatusCode::OK,
            Json(ApiResponse::ok(
                "no repeated pattern in the last 3 check-ins",
                EvaluationData::no_alert(),
            )),
        ),
        Ok(Evaluation::Alerted {
            event,
            student,
            sent,
        }) => {
            let message = if sent {
                "alert dispatched"
            } else {
                "pattern detected but the alert could not be delivered"
            };
            (
                StatusCode::OK,
                Json(ApiResponse::ok(
                    message,
                    EvaluationData {
                        alert: true,
                        pattern: Some(event.pattern),
                        priority: Some(event.priority),
                        student: Some(student.student_name),
                        class: Some(student.class_name),
                        sent: Some(sent),
                    },
                )),
            )
        }
        Err(EvaluateError::StudentNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err("no student exists with that id")),
        ),
        Err(EvaluateError::Persistence(cause)) => {
            log::error!("pattern evaluation failure: {cause:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(GENERIC_FAILURE)),
            )
        }
    }
}

#[derive(Serialize)]
struct DashboardData {
    class: String,
    summary: stats::DashboardSummary,
    distribution: Vec<stats::EmotionCount>,
    needing_attention: Vec<ClassCheckin>,
}

/// GET /api/dashboard/:class_id: today's aggregates for one class.
async fn class_dashboard(
    Extension(state): Extension<AppState>,
    Path(class_id): Path<Uuid>,
) -> (StatusCode, Json<ApiResponse<DashboardData>>) {
    match load_dashboard(&state.pool, class_id).await {
        Ok(Some(data)) => (
            StatusCode::OK,
            Json(ApiResponse::ok(format!("dashboard for class {}", data.class), data)),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err("no class exists with that id")),
        ),
        Err(cause) => {
            log::error!("dashboard query failure: {cause:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(GENERIC_FAILURE)),
            )
        }
    }
}

async fn load_dashboard(pool: &PgPool, class_id: Uuid) -> anyhow::Result<Option<DashboardData>> {
    let Some(class) = db::fetch_class(pool, class_id).await? else {
        return Ok(None);
    };

    let checkins = db::fetch_today_class_checkins(pool, class_id).await?;
    let total_students = db::count_students(pool, class_id).await? as usize;

    let summary = stats::dashboard_summary(&checkins, total_students);
    let distribution = stats::emotion_distribution(&checkins);
    let needing_attention = stats::needing_attention(&checkins)
        .into_iter()
        .cloned()
        .collect();

    Ok(Some(DashboardData {
        class: class.name,
        summary,
        distribution,
        needing_attention,
    }))
}
