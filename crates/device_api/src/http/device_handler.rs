use crate::domain::{
    CreateDeviceRequest, DeviceService, ListDevicesFilter, ListDevicesRequest, PatchDeviceRequest,
    UpdateDeviceRequest,
};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use common::domain::{Device, DeviceState, DomainError, Page};
use common::http::ApiError;
use json_patch::Patch;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

type SharedService = Arc<DeviceService>;

/// Device as returned to clients. The surrogate id stays internal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub external_id: Uuid,
    pub name: String,
    pub brand: String,
    pub state: DeviceState,
    pub creation_time: DateTime<Utc>,
}

impl From<Device> for DeviceDto {
    fn from(device: Device) -> Self {
        Self {
            external_id: device.external_id,
            name: device.name,
            brand: device.brand,
            state: device.state,
            creation_time: device.creation_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDto<T> {
    pub content: Vec<T>,
    pub number: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u64,
    pub number_of_elements: usize,
}

impl From<Page<Device>> for PageDto<DeviceDto> {
    fn from(page: Page<Device>) -> Self {
        let total_pages = page.total_pages();
        let number_of_elements = page.number_of_elements();
        let page = page.map(DeviceDto::from);
        Self {
            content: page.content,
            number: page.number,
            size: page.size,
            total_elements: page.total_elements,
            total_pages,
            number_of_elements,
        }
    }
}

/// Body of `POST /devices`. Missing or null text fields become empty and fail the
/// required-field rule instead of failing deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateDeviceBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Body of `PUT /devices`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateDeviceBody {
    #[serde(default)]
    pub external_id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

impl PageQuery {
    fn into_request(self, filter: ListDevicesFilter) -> ListDevicesRequest {
        ListDevicesRequest {
            filter,
            page: self.page.unwrap_or_default(),
            size: self.size,
            sort: self.sort,
        }
    }
}

fn malformed(rejection: impl std::fmt::Display) -> ApiError {
    ApiError(DomainError::MalformedRequest(rejection.to_string()))
}

async fn create_device(
    State(service): State<SharedService>,
    body: Result<Json<CreateDeviceBody>, JsonRejection>,
) -> Result<(StatusCode, Json<DeviceDto>), ApiError> {
    let Json(body) = body.map_err(malformed)?;

    let device = service
        .create_device(CreateDeviceRequest {
            name: body.name.unwrap_or_default(),
            brand: body.brand.unwrap_or_default(),
            state: body.state,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(device.into())))
}

async fn update_device(
    State(service): State<SharedService>,
    body: Result<Json<UpdateDeviceBody>, JsonRejection>,
) -> Result<Json<DeviceDto>, ApiError> {
    let Json(body) = body.map_err(malformed)?;

    let device = service
        .update_device(UpdateDeviceRequest {
            external_id: body.external_id,
            name: body.name.unwrap_or_default(),
            brand: body.brand.unwrap_or_default(),
            state: body.state,
        })
        .await?;

    Ok(Json(device.into()))
}

async fn patch_device(
    State(service): State<SharedService>,
    external_id: Result<Path<Uuid>, PathRejection>,
    patch: Result<Json<Patch>, JsonRejection>,
) -> Result<Json<DeviceDto>, ApiError> {
    let Path(external_id) = external_id.map_err(malformed)?;
    let Json(patch) = patch.map_err(malformed)?;

    let device = service
        .patch_device(PatchDeviceRequest { external_id, patch })
        .await?;

    Ok(Json(device.into()))
}

async fn get_device(
    State(service): State<SharedService>,
    external_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DeviceDto>, ApiError> {
    let Path(external_id) = external_id.map_err(malformed)?;
    let device = service.get_device(external_id).await?;
    Ok(Json(device.into()))
}

async fn delete_device(
    State(service): State<SharedService>,
    external_id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(external_id) = external_id.map_err(malformed)?;
    service.delete_device(external_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list(
    service: &DeviceService,
    query: Result<Query<PageQuery>, QueryRejection>,
    filter: ListDevicesFilter,
) -> Result<Json<PageDto<DeviceDto>>, ApiError> {
    let Query(query) = query.map_err(malformed)?;
    let page = service.list_devices(query.into_request(filter)).await?;
    Ok(Json(page.into()))
}

async fn list_devices(
    State(service): State<SharedService>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PageDto<DeviceDto>>, ApiError> {
    list(&service, query, ListDevicesFilter::All).await
}

async fn list_devices_by_brand(
    State(service): State<SharedService>,
    brand: Result<Path<String>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PageDto<DeviceDto>>, ApiError> {
    let Path(brand) = brand.map_err(malformed)?;
    list(&service, query, ListDevicesFilter::Brand(brand)).await
}

async fn list_devices_by_state(
    State(service): State<SharedService>,
    state: Result<Path<String>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PageDto<DeviceDto>>, ApiError> {
    let Path(state) = state.map_err(malformed)?;
    list(&service, query, ListDevicesFilter::State(state)).await
}

async fn health(State(service): State<SharedService>) -> (StatusCode, Json<serde_json::Value>) {
    match service.health().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "UP" }))),
        Err(e) => {
            debug!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "DOWN" })),
            )
        }
    }
}

/// Device routes under `/api/v1` plus `/health`
pub fn device_router(service: Arc<DeviceService>) -> Router {
    let devices = Router::new()
        .route(
            "/devices",
            get(list_devices).post(create_device).put(update_device),
        )
        .route(
            "/devices/{external_id}",
            get(get_device).patch(patch_device).delete(delete_device),
        )
        .route("/devices/brand/{brand}", get(list_devices_by_brand))
        .route("/devices/state/{state}", get(list_devices_by_state));

    Router::new()
        .nest("/api/v1", devices)
        .route("/health", get(health))
        .with_state(service)
}
