//! The remote authority: the canonical activation registry over HTTP.
//!
//! One POST endpoint carries both the read-only `check` and the
//! compare-and-set `activate`; a static health endpoint serves liveness
//! probes. The registry is the same whole-file table the validator uses
//! locally, plus an informational `<fingerprint>_date` sibling entry kept
//! compatible with existing registry files.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::license::{TIMESTAMP_FORMAT, codec};
use crate::remote::AuthorityAction;
use crate::store::{BindOutcome, Table};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Table>,
    pub secret: Arc<Vec<u8>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/validate", post(validate))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    license_key: Option<String>,
    machine_id: Option<String>,
    action: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    valid: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    already_activated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    activated: Option<bool>,
}

impl ValidateResponse {
    fn rejected(message: &str) -> Self {
        Self {
            valid: false,
            message: message.to_string(),
            already_activated: None,
            activated: None,
        }
    }
}

const BOUND_ELSEWHERE: &str =
    "this license has already been activated on another machine; each key can only be used once";

pub async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> (StatusCode, Json<ValidateResponse>) {
    let (Some(license_key), Some(machine_id)) =
        (request.license_key.as_deref(), request.machine_id.as_deref())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ValidateResponse::rejected("incomplete request")),
        );
    };
    let action = match AuthorityAction::from_str(request.action.as_deref().unwrap_or("check")) {
        Ok(action) => action,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ValidateResponse::rejected("invalid action")),
            );
        }
    };

    // Keys that fail to decode still get a stable identity, so a corrupted
    // but previously registered key cannot evade its binding.
    let fingerprint = codec::presented_fingerprint(license_key, &state.secret);

    match action {
        AuthorityAction::Check => {
            let response = match state.registry.get(&fingerprint) {
                Some(owner) if owner != machine_id => ValidateResponse {
                    valid: false,
                    message: BOUND_ELSEWHERE.to_string(),
                    already_activated: Some(true),
                    activated: None,
                },
                Some(_) => ValidateResponse {
                    valid: true,
                    message: "license valid for this machine".to_string(),
                    already_activated: Some(true),
                    activated: None,
                },
                None => ValidateResponse {
                    valid: true,
                    message: "license available for activation".to_string(),
                    already_activated: Some(false),
                    activated: None,
                },
            };
            (StatusCode::OK, Json(response))
        }
        AuthorityAction::Activate => match state.registry.try_bind(&fingerprint, machine_id) {
            Ok(BindOutcome::AlreadyBound(owner)) if owner != machine_id => (
                StatusCode::OK,
                Json(ValidateResponse {
                    valid: false,
                    message: BOUND_ELSEWHERE.to_string(),
                    already_activated: Some(true),
                    activated: None,
                }),
            ),
            Ok(outcome) => {
                if outcome == BindOutcome::Created {
                    let stamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
                    if let Err(err) = state.registry.put(&format!("{fingerprint}_date"), &stamp) {
                        error!(error = %err, "failed to stamp activation date");
                    }
                    info!(machine = %machine_id, "license activated");
                }
                (
                    StatusCode::OK,
                    Json(ValidateResponse {
                        valid: true,
                        message: "license activated".to_string(),
                        already_activated: None,
                        activated: Some(true),
                    }),
                )
            }
            Err(err) => {
                error!(error = %err, "failed to record activation");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ValidateResponse::rejected("failed to record activation")),
                )
            }
        },
    }
}
