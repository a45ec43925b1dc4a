use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use shared::*;

use crate::handlers::{BookingService, TableQueries};
use crate::store::BookingStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookingStore>,
}

/// Accepts either a bare date or a date-time; the time part is dropped later.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum ReservationDate {
    DateTime(NaiveDateTime),
    Date(NaiveDate),
}

impl ReservationDate {
    pub fn into_datetime(self) -> NaiveDateTime {
        match self {
            ReservationDate::DateTime(dt) => dt,
            ReservationDate::Date(date) => date.and_time(NaiveTime::default()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub reservation_date: ReservationDate,
    #[serde(deserialize_with = "deserialize_time_slot")]
    pub time_slot: NaiveTime,
    #[serde(default)]
    pub customer_id: i32,
}

#[derive(Debug, Serialize)]
pub struct CreateBookingResponse {
    pub booking_id: i32,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `HH:MM` or `HH:MM:SS`.
fn deserialize_time_slot<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(&raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"))
        .map_err(|e| serde::de::Error::custom(format!("invalid time slot {:?}: {}", raw, e)))
}

pub enum ApiError {
    Booking(BookingError),
    Body(JsonRejection),
}

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        ApiError::Booking(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection)
    }
}

/// Renders the whole cause chain, e.g. `pool checkout: connection refused`.
fn storage_detail(e: &anyhow::Error) -> String {
    format!("{:#}", e)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Body(rejection) => (rejection.status(), rejection.body_text()),
            ApiError::Booking(BookingError::Storage(e)) => {
                tracing::error!("Request failed: {}", storage_detail(&e));
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            ApiError::Booking(e) => {
                let status = match e.kind() {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/tables", get(list_tables))
        .route("/tables/available", get(list_available_tables))
        .route("/tables/booked", get(list_booked_tables))
        .route("/tables/:id", get(get_table))
        .route("/tables/:id/booking", get(prepare_booking))
        .route("/tables/:id/bookings", post(create_booking))
        .route("/bookings/:id", get(get_confirmation))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn list_tables(State(state): State<AppState>) -> ApiResult<Json<Vec<Table>>> {
    Ok(Json(TableQueries::new(state.store).list_tables().await?))
}

pub async fn list_available_tables(State(state): State<AppState>) -> ApiResult<Json<Vec<Table>>> {
    Ok(Json(TableQueries::new(state.store).list_available().await?))
}

pub async fn list_booked_tables(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TableWithBookings>>> {
    Ok(Json(TableQueries::new(state.store).list_booked().await?))
}

pub async fn get_table(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<TableWithBookings>> {
    Ok(Json(TableQueries::new(state.store).get_table(id).await?))
}

pub async fn prepare_booking(
    State(state): State<AppState>,
    Path(table_id): Path<i32>,
) -> ApiResult<Json<TableWithBookings>> {
    Ok(Json(BookingService::new(state.store).prepare_booking(table_id).await?))
}

pub async fn create_booking(
    State(state): State<AppState>,
    Path(table_id): Path<i32>,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let booking_id = BookingService::new(state.store)
        .create_booking(
            table_id,
            request.customer_id,
            request.reservation_date.into_datetime(),
            request.time_slot,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/bookings/{}", booking_id))],
        Json(CreateBookingResponse { booking_id }),
    ))
}

pub async fn get_confirmation(
    State(state): State<AppState>,
    Path(booking_id): Path<i32>,
) -> ApiResult<Json<BookingWithTable>> {
    Ok(Json(BookingService::new(state.store).get_confirmation(booking_id).await?))
}

pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use axum::body::Body;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app(tables: &[(i32, bool)]) -> Router {
        let store = Arc::new(MemoryStore::new());
        for &(capacity, availability) in tables {
            store.insert_table(capacity, availability).await;
        }
        create_router(AppState { store })
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, location, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn reservation_date_accepts_date_and_datetime() {
        let date: ReservationDate = serde_json::from_value(json!("2023-07-05")).unwrap();
        let datetime: ReservationDate = serde_json::from_value(json!("2023-07-05T18:30:00")).unwrap();
        assert_eq!(date.into_datetime().date(), datetime.into_datetime().date());
        assert_eq!(date.into_datetime().time(), NaiveTime::default());
    }

    #[test]
    fn time_slot_accepts_short_and_long_forms() {
        let short: CreateBookingRequest =
            serde_json::from_value(json!({"reservation_date": "2023-07-05", "time_slot": "10:00"})).unwrap();
        let long: CreateBookingRequest =
            serde_json::from_value(json!({"reservation_date": "2023-07-05", "time_slot": "10:00:00"})).unwrap();
        assert_eq!(short.time_slot, long.time_slot);
        assert_eq!(short.customer_id, 0);
    }

    #[tokio::test]
    async fn health() {
        let response = app(&[]).await.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn lists_tables_by_availability() {
        let router = app(&[(4, true), (2, false)]).await;

        let (status, _, body) = send(router.clone(), get("/tables/available")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{"id": 1, "seating_capacity": 4, "availability": true}]));

        let (_, _, body) = send(router.clone(), get("/tables/booked")).await;
        assert_eq!(body[0]["id"], 2);
        assert_eq!(body[0]["bookings"], json!([]));

        let (_, _, body) = send(router, get("/tables")).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn booking_flow_redirects_to_confirmation() {
        let router = app(&[(4, true)]).await;

        let (status, _, _) = send(router.clone(), get("/tables/1/booking")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, location, body) = send(
            router.clone(),
            post_json("/tables/1/bookings", json!({"reservation_date": "2023-07-05", "time_slot": "10:00"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"booking_id": 1}));
        let location = location.unwrap();
        assert_eq!(location, "/bookings/1");

        let (status, _, body) = send(router.clone(), get(&location)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["table_id"], 1);
        assert_eq!(body["reservation_date"], "2023-07-05");
        assert_eq!(body["time_slot"], "10:00:00");
        assert_eq!(body["table"]["availability"], false);

        let (status, _, body) = send(router, get("/tables/1/booking")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Table already booked");
    }

    #[tokio::test]
    async fn early_date_is_bad_request() {
        let router = app(&[(4, true)]).await;
        let (status, _, body) = send(
            router,
            post_json("/tables/1/bookings", json!({"reservation_date": "2023-01-01", "time_slot": "10:00"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid reservation date");
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let router = app(&[]).await;

        for uri in ["/tables/7", "/tables/7/booking", "/bookings/7"] {
            let (status, _, _) = send(router.clone(), get(uri)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        }

        let (status, _, _) = send(
            router,
            post_json("/tables/7/bookings", json!({"reservation_date": "2023-07-05", "time_slot": "10:00"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_booking_body_uses_error_shape() {
        let router = app(&[(4, true)]).await;

        let bodies = [
            json!({"reservation_date": "2023-07-05", "time_slot": "25:00"}),
            json!({"time_slot": "10:00"}),
        ];
        for body in bodies {
            let (status, _, response) = send(router.clone(), post_json("/tables/1/bookings", body)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert!(!response["error"].as_str().unwrap().is_empty());
        }

        let (status, _, body) = send(router, get("/tables/1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["availability"], true);
    }

    struct UnreachableStore;

    fn unreachable_error() -> anyhow::Error {
        anyhow!("connection refused").context("pool checkout")
    }

    #[async_trait]
    impl BookingStore for UnreachableStore {
        async fn list_tables(&self) -> Result<Vec<Table>> {
            Err(unreachable_error())
        }

        async fn list_tables_by_availability(&self, _available: bool) -> Result<Vec<Table>> {
            Err(unreachable_error())
        }

        async fn list_booked_tables(&self) -> Result<Vec<TableWithBookings>> {
            Err(unreachable_error())
        }

        async fn find_table(&self, _id: i32) -> Result<Option<TableWithBookings>> {
            Err(unreachable_error())
        }

        async fn find_booking(&self, _id: i32) -> Result<Option<BookingWithTable>> {
            Err(unreachable_error())
        }

        async fn commit_booking(&self, _request: &BookingRequest) -> Result<Option<Booking>> {
            Err(unreachable_error())
        }
    }

    #[test]
    fn storage_detail_keeps_cause_chain() {
        assert_eq!(storage_detail(&unreachable_error()), "pool checkout: connection refused");
    }

    #[tokio::test]
    async fn storage_failure_hides_detail_from_client() {
        let router = create_router(AppState { store: Arc::new(UnreachableStore) });

        let (status, _, body) = send(router, get("/tables/available")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Internal server error"}));
    }
}
