use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::coordinator::{AdoptionError, OutcomeKind, TransitionCoordinator};
use super::domain::{AdoptionId, AnimalId, AnimalProfile, AnimalUpdate, Decision, Identity, Role, UserId};
use super::store::{EntityStore, StoreError};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Router builder exposing the adoption lifecycle over HTTP.
pub fn adoption_router<S>(coordinator: Arc<TransitionCoordinator<S>>) -> Router
where
    S: EntityStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/animals",
            get(list_animals_handler::<S>).post(create_animal_handler::<S>),
        )
        .route(
            "/api/v1/animals/:animal_id",
            get(animal_view_handler::<S>)
                .put(edit_animal_handler::<S>)
                .delete(delete_animal_handler::<S>),
        )
        .route(
            "/api/v1/animals/:animal_id/adoptions",
            post(apply_handler::<S>),
        )
        .route(
            "/api/v1/adoptions/:adoption_id/:decision",
            post(decide_handler::<S>),
        )
        .with_state(coordinator)
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub contact_info: String,
}

/// Resolve the caller from the headers set by the authenticating proxy.
///
/// Returns `Ok(None)` when no identity headers are present and `Err` with a
/// ready-made response when they are present but malformed.
pub fn resolve_identity(headers: &HeaderMap) -> Result<Option<Identity>, Response> {
    let user_id = headers.get(USER_ID_HEADER);
    let role = headers.get(USER_ROLE_HEADER);

    let (user_id, role) = match (user_id, role) {
        (None, None) => return Ok(None),
        (Some(user_id), Some(role)) => (user_id, role),
        _ => return Err(unauthenticated("both identity headers are required")),
    };

    let user_id = user_id
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .ok_or_else(|| unauthenticated("x-user-id must be an integer"))?;
    let role = role
        .to_str()
        .ok()
        .and_then(Role::from_label)
        .ok_or_else(|| unauthenticated("x-user-role must be admin, moderator, or user"))?;

    Ok(Some(Identity::new(UserId(user_id), role)))
}

fn require_identity(headers: &HeaderMap) -> Result<Identity, Response> {
    resolve_identity(headers)?.ok_or_else(|| unauthenticated("authentication required"))
}

fn unauthenticated(message: &str) -> Response {
    let payload = json!({
        "outcome": "unauthenticated",
        "message": message,
    });
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

pub fn outcome_status(kind: OutcomeKind) -> StatusCode {
    match kind {
        OutcomeKind::Success => StatusCode::OK,
        OutcomeKind::Forbidden => StatusCode::FORBIDDEN,
        OutcomeKind::NotFound => StatusCode::NOT_FOUND,
        OutcomeKind::InvalidTransition
        | OutcomeKind::AlreadyPlaced
        | OutcomeKind::DuplicateApplication => StatusCode::CONFLICT,
        OutcomeKind::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
        OutcomeKind::StoreError => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AdoptionError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match kind {
            OutcomeKind::StoreError => "the request could not be completed, please try again".to_string(),
            _ => self.to_string(),
        };
        let payload = json!({
            "outcome": kind,
            "message": message,
        });
        (outcome_status(kind), Json(payload)).into_response()
    }
}

/// Run a coordinator call on the blocking pool; lock waits must not stall the runtime.
async fn run_blocking<S, T, F>(
    coordinator: &Arc<TransitionCoordinator<S>>,
    work: F,
) -> Result<T, AdoptionError>
where
    S: EntityStore + 'static,
    T: Send + 'static,
    F: FnOnce(&TransitionCoordinator<S>) -> Result<T, AdoptionError> + Send + 'static,
{
    let coordinator = Arc::clone(coordinator);
    match tokio::task::spawn_blocking(move || work(&coordinator)).await {
        Ok(result) => result,
        Err(err) => Err(AdoptionError::Store(StoreError::Unavailable(format!(
            "coordinator task failed: {err}"
        )))),
    }
}

/// Unwrap a JSON body once the caller is known, so identity failures win
/// over malformed payloads.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(value)| value).map_err(|rejection| {
        AdoptionError::InvalidInput(rejection.body_text()).into_response()
    })
}

fn respond<T: serde::Serialize>(success: StatusCode, result: Result<T, AdoptionError>) -> Response {
    match result {
        Ok(body) => (success, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_animals_handler<S>(
    State(coordinator): State<Arc<TransitionCoordinator<S>>>,
) -> Response
where
    S: EntityStore + 'static,
{
    let result = run_blocking(&coordinator, |coordinator| coordinator.list_animals()).await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn create_animal_handler<S>(
    State(coordinator): State<Arc<TransitionCoordinator<S>>>,
    headers: HeaderMap,
    body: Result<Json<AnimalProfile>, JsonRejection>,
) -> Response
where
    S: EntityStore + 'static,
{
    let identity = match require_identity(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let profile = match json_body(body) {
        Ok(profile) => profile,
        Err(response) => return response,
    };
    let result = run_blocking(&coordinator, move |coordinator| {
        coordinator.create_animal(&identity, profile)
    })
    .await;
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn animal_view_handler<S>(
    State(coordinator): State<Arc<TransitionCoordinator<S>>>,
    headers: HeaderMap,
    Path(animal_id): Path<i64>,
) -> Response
where
    S: EntityStore + 'static,
{
    let viewer = match resolve_identity(&headers) {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };
    let result = run_blocking(&coordinator, move |coordinator| {
        coordinator.animal_view(viewer.as_ref(), AnimalId(animal_id))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn edit_animal_handler<S>(
    State(coordinator): State<Arc<TransitionCoordinator<S>>>,
    headers: HeaderMap,
    Path(animal_id): Path<i64>,
    body: Result<Json<AnimalUpdate>, JsonRejection>,
) -> Response
where
    S: EntityStore + 'static,
{
    let identity = match require_identity(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let update = match json_body(body) {
        Ok(update) => update,
        Err(response) => return response,
    };
    let result = run_blocking(&coordinator, move |coordinator| {
        coordinator.edit_animal(&identity, AnimalId(animal_id), update)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn delete_animal_handler<S>(
    State(coordinator): State<Arc<TransitionCoordinator<S>>>,
    headers: HeaderMap,
    Path(animal_id): Path<i64>,
) -> Response
where
    S: EntityStore + 'static,
{
    let identity = match require_identity(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let result = run_blocking(&coordinator, move |coordinator| {
        coordinator.delete_animal(&identity, AnimalId(animal_id))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn apply_handler<S>(
    State(coordinator): State<Arc<TransitionCoordinator<S>>>,
    headers: HeaderMap,
    Path(animal_id): Path<i64>,
    body: Result<Json<ApplyRequest>, JsonRejection>,
) -> Response
where
    S: EntityStore + 'static,
{
    let identity = match require_identity(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let request = match json_body(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let result = run_blocking(&coordinator, move |coordinator| {
        coordinator.apply_for_adoption(&identity, AnimalId(animal_id), &request.contact_info)
    })
    .await;
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn decide_handler<S>(
    State(coordinator): State<Arc<TransitionCoordinator<S>>>,
    headers: HeaderMap,
    Path((adoption_id, decision)): Path<(i64, String)>,
) -> Response
where
    S: EntityStore + 'static,
{
    let identity = match require_identity(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let Some(decision) = Decision::from_label(&decision) else {
        return AdoptionError::InvalidInput(format!("unknown decision '{decision}'"))
            .into_response();
    };
    let result = run_blocking(&coordinator, move |coordinator| {
        coordinator.decide_adoption(&identity, AdoptionId(adoption_id), decision)
    })
    .await;
    respond(StatusCode::OK, result)
}
