use crate::domain::{
    apply_patch, require_existing, require_external_id, state_filter, validate_for_create,
    validate_for_delete, validate_for_update, DeviceCandidate,
};
use anyhow::anyhow;
use chrono::Utc;
use common::domain::{
    CreateDeviceRepoInput, Device, DeviceChange, DeviceFilter, DeviceRepository, DeviceSort,
    DomainError, DomainResult, ListDevicesRepoInput, Page, PageRequest,
};
use garde::Validate;
use json_patch::Patch;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Service request for creating a device
#[derive(Debug, Clone)]
pub struct CreateDeviceRequest {
    pub name: String,
    pub brand: String,
    pub state: Option<String>,
}

/// Service request for replacing a device's mutable fields
#[derive(Debug, Clone)]
pub struct UpdateDeviceRequest {
    pub external_id: Option<Uuid>,
    pub name: String,
    pub brand: String,
    pub state: Option<String>,
}

/// Service request for applying a JSON Patch to a device
#[derive(Debug, Clone)]
pub struct PatchDeviceRequest {
    pub external_id: Uuid,
    pub patch: Patch,
}

/// Which devices a listing covers, as received from the client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ListDevicesFilter {
    #[default]
    All,
    Brand(String),
    /// Unparsed state text
    State(String),
}

/// Service request for listing devices
#[derive(Debug, Clone, Default, Validate)]
pub struct ListDevicesRequest {
    #[garde(skip)]
    pub filter: ListDevicesFilter,
    #[garde(skip)]
    pub page: u32,
    #[garde(range(min = 1))]
    pub size: Option<u32>,
    #[garde(skip)]
    pub sort: Option<String>,
}

/// Page size bounds applied to listings
#[derive(Debug, Clone, Copy)]
pub struct PaginationConfig {
    pub default_size: u32,
    pub max_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_size: 20,
            max_size: 100,
        }
    }
}

/// Domain service for device lifecycle business logic
/// This is the orchestration layer that handlers call
pub struct DeviceService {
    device_repository: Arc<dyn DeviceRepository>,
    pagination: PaginationConfig,
}

fn saved_device(change: DeviceChange) -> DomainResult<Device> {
    match change {
        DeviceChange::Save(device) => Ok(device),
        DeviceChange::Delete(device) => Err(DomainError::RepositoryError(anyhow!(
            "store deleted device {} instead of saving it",
            device.external_id
        ))),
    }
}

impl DeviceService {
    pub fn new(device_repository: Arc<dyn DeviceRepository>, pagination: PaginationConfig) -> Self {
        Self {
            device_repository,
            pagination,
        }
    }

    /// Create a new device
    /// Server assigns the external id and creation time; state defaults to AVAILABLE
    #[instrument(skip(self, request), fields(name = %request.name, brand = %request.brand))]
    pub async fn create_device(&self, request: CreateDeviceRequest) -> DomainResult<Device> {
        let candidate = DeviceCandidate {
            name: request.name,
            brand: request.brand,
            state: request.state,
        };

        let validated = validate_for_create(&candidate)
            .inspect_err(|violations| warn!(%violations, "device create rejected"))?;

        let repo_input = CreateDeviceRepoInput {
            external_id: Uuid::new_v4(),
            name: validated.name,
            brand: validated.brand,
            state: validated.state.unwrap_or_default(),
            creation_time: Utc::now(),
        };

        debug!(external_id = %repo_input.external_id, "creating device");

        let device = self.device_repository.create_device(repo_input).await?;

        info!(external_id = %device.external_id, state = %device.state, "device created");
        Ok(device)
    }

    /// Replace name, brand and (optionally) state of an existing device
    #[instrument(skip(self, request), fields(external_id = ?request.external_id))]
    pub async fn update_device(&self, request: UpdateDeviceRequest) -> DomainResult<Device> {
        let candidate = DeviceCandidate {
            name: request.name,
            brand: request.brand,
            state: request.state,
        };

        let external_id = require_external_id(request.external_id, &candidate)
            .inspect_err(|violations| warn!(%violations, "device update rejected"))?;

        let change = self
            .device_repository
            .mutate_device(
                external_id,
                Box::new(move |current| {
                    let existing = require_existing(external_id, current)?;
                    let validated = validate_for_update(&existing, &candidate)?;
                    Ok(DeviceChange::Save(validated.apply_to(&existing)))
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "device update rejected"))?;

        let device = saved_device(change)?;
        info!(external_id = %device.external_id, state = %device.state, "device updated");
        Ok(device)
    }

    /// Apply a JSON Patch; the patched result goes through the same rules as a full update
    #[instrument(skip(self, request), fields(external_id = %request.external_id, operations = request.patch.0.len()))]
    pub async fn patch_device(&self, request: PatchDeviceRequest) -> DomainResult<Device> {
        let external_id = request.external_id;
        let patch = request.patch;

        let change = self
            .device_repository
            .mutate_device(
                external_id,
                Box::new(move |current| {
                    let existing = require_existing(external_id, current)?;
                    let candidate = apply_patch(&existing, &patch)?.into_candidate();
                    let validated = validate_for_update(&existing, &candidate)?;
                    Ok(DeviceChange::Save(validated.apply_to(&existing)))
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "device patch rejected"))?;

        let device = saved_device(change)?;
        info!(external_id = %device.external_id, state = %device.state, "device patched");
        Ok(device)
    }

    /// Delete a device that is not in use
    #[instrument(skip(self))]
    pub async fn delete_device(&self, external_id: Uuid) -> DomainResult<()> {
        self.device_repository
            .mutate_device(
                external_id,
                Box::new(move |current| {
                    let existing = require_existing(external_id, current)?;
                    validate_for_delete(&existing)?;
                    Ok(DeviceChange::Delete(existing))
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "device delete rejected"))?;

        info!(external_id = %external_id, "device deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_device(&self, external_id: Uuid) -> DomainResult<Device> {
        self.device_repository
            .get_device(external_id)
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(format!("device {} does not exist", external_id)))
    }

    /// List one page of devices, optionally filtered by brand or state
    #[instrument(skip(self, request), fields(filter = ?request.filter, page = request.page))]
    pub async fn list_devices(&self, request: ListDevicesRequest) -> DomainResult<Page<Device>> {
        common::garde::validate_request(&request)?;

        let filter = match request.filter {
            ListDevicesFilter::All => DeviceFilter::All,
            ListDevicesFilter::Brand(brand) => DeviceFilter::Brand(brand),
            ListDevicesFilter::State(state) => DeviceFilter::State(state_filter(&state)?),
        };

        let sort = request
            .sort
            .as_deref()
            .map(DeviceSort::parse)
            .transpose()?
            .unwrap_or_default();

        let size = request
            .size
            .unwrap_or(self.pagination.default_size)
            .min(self.pagination.max_size);

        let repo_input = ListDevicesRepoInput {
            filter,
            page: PageRequest {
                page: request.page,
                size,
                sort,
            },
        };

        let page = self.device_repository.list_devices(repo_input).await?;

        debug!(
            returned = page.number_of_elements(),
            total = page.total_elements,
            "listed devices"
        );
        Ok(page)
    }

    /// Whether the device store answers
    pub async fn health(&self) -> DomainResult<()> {
        self.device_repository.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{
        DeviceSortField, DeviceState, MockDeviceRepository, SortDirection, ViolationKind,
    };
    use serde_json::json;

    fn stored(state: DeviceState) -> Device {
        Device {
            id: 1,
            external_id: Uuid::new_v4(),
            name: "iPhone 15".to_string(),
            brand: "Apple".to_string(),
            state,
            creation_time: Utc::now(),
        }
    }

    /// Mock store that hands `existing` to the mutation closure
    fn repo_with(existing: Option<Device>) -> MockDeviceRepository {
        let mut mock_repo = MockDeviceRepository::new();
        mock_repo
            .expect_mutate_device()
            .times(1)
            .returning(move |_, mutation| mutation(existing.clone()));
        mock_repo
    }

    fn service(mock_repo: MockDeviceRepository) -> DeviceService {
        DeviceService::new(Arc::new(mock_repo), PaginationConfig::default())
    }

    fn violation_kinds(err: &DomainError) -> Vec<ViolationKind> {
        match err {
            DomainError::ValidationFailed(violations) => violations.iter().map(|v| v.kind).collect(),
            other => panic!("Expected ValidationFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_device_success() {
        let mut mock_repo = MockDeviceRepository::new();

        mock_repo
            .expect_create_device()
            .withf(|input| {
                input.name == "Pixel 8"
                    && input.brand == "Google"
                    && input.state == DeviceState::Available
            })
            .times(1)
            .return_once(|input| {
                Ok(Device {
                    id: 1,
                    external_id: input.external_id,
                    name: input.name,
                    brand: input.brand,
                    state: input.state,
                    creation_time: input.creation_time,
                })
            });

        let result = service(mock_repo)
            .create_device(CreateDeviceRequest {
                name: "Pixel 8".to_string(),
                brand: "Google".to_string(),
                state: None,
            })
            .await;

        let device = result.unwrap();
        assert_eq!(device.state, DeviceState::Available);
    }

    #[tokio::test]
    async fn test_create_device_invalid_never_reaches_store() {
        let mut mock_repo = MockDeviceRepository::new();
        mock_repo.expect_create_device().times(0);

        let err = service(mock_repo)
            .create_device(CreateDeviceRequest {
                name: "".to_string(),
                brand: "Google".to_string(),
                state: Some("broken".to_string()),
            })
            .await
            .unwrap_err();

        assert_eq!(
            violation_kinds(&err),
            vec![ViolationKind::RequiredField, ViolationKind::InvalidEnumValue]
        );
    }

    #[tokio::test]
    async fn test_create_device_already_exists() {
        let mut mock_repo = MockDeviceRepository::new();
        mock_repo
            .expect_create_device()
            .times(1)
            .return_once(|input| Err(DomainError::DeviceAlreadyExists(input.external_id.to_string())));

        let result = service(mock_repo)
            .create_device(CreateDeviceRequest {
                name: "Pixel 8".to_string(),
                brand: "Google".to_string(),
                state: None,
            })
            .await;

        assert!(matches!(result, Err(DomainError::DeviceAlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_update_in_use_device_rename_rejected() {
        let existing = stored(DeviceState::InUse);
        let external_id = existing.external_id;

        let err = service(repo_with(Some(existing)))
            .update_device(UpdateDeviceRequest {
                external_id: Some(external_id),
                name: "iPhone 15 Pro".to_string(),
                brand: "Apple".to_string(),
                state: None,
            })
            .await
            .unwrap_err();

        assert_eq!(violation_kinds(&err), vec![ViolationKind::ImmutableFieldViolation]);
    }

    #[tokio::test]
    async fn test_update_in_use_device_state_change_allowed() {
        let existing = stored(DeviceState::InUse);
        let external_id = existing.external_id;

        let device = service(repo_with(Some(existing.clone())))
            .update_device(UpdateDeviceRequest {
                external_id: Some(external_id),
                name: "iPhone 15".to_string(),
                brand: "Apple".to_string(),
                state: Some("AVAILABLE".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(device.state, DeviceState::Available);
        assert_eq!(device.creation_time, existing.creation_time);
    }

    #[tokio::test]
    async fn test_update_without_state_keeps_stored_state() {
        let existing = stored(DeviceState::Inactive);
        let external_id = existing.external_id;

        let device = service(repo_with(Some(existing)))
            .update_device(UpdateDeviceRequest {
                external_id: Some(external_id),
                name: "iPhone 15 (refurbished)".to_string(),
                brand: "Apple".to_string(),
                state: None,
            })
            .await
            .unwrap();

        assert_eq!(device.state, DeviceState::Inactive);
        assert_eq!(device.name, "iPhone 15 (refurbished)");
    }

    #[tokio::test]
    async fn test_update_missing_device_not_found() {
        let err = service(repo_with(None))
            .update_device(UpdateDeviceRequest {
                external_id: Some(Uuid::new_v4()),
                name: "iPhone 15".to_string(),
                brand: "Apple".to_string(),
                state: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::DeviceNotFound(_)));
    }

    #[tokio::test]
    async fn test_update_without_external_id_never_reaches_store() {
        let mut mock_repo = MockDeviceRepository::new();
        mock_repo.expect_mutate_device().times(0);

        let err = service(mock_repo)
            .update_device(UpdateDeviceRequest {
                external_id: None,
                name: "iPhone 15".to_string(),
                brand: "Apple".to_string(),
                state: None,
            })
            .await
            .unwrap_err();

        assert_eq!(violation_kinds(&err), vec![ViolationKind::RequiredField]);
    }

    #[tokio::test]
    async fn test_patch_in_use_device_rename_rejected() {
        let existing = stored(DeviceState::InUse);
        let external_id = existing.external_id;

        let patch: Patch = serde_json::from_value(json!([
            { "op": "replace", "path": "/name", "value": "iPhone 15 Pro" }
        ]))
        .unwrap();

        let err = service(repo_with(Some(existing)))
            .patch_device(PatchDeviceRequest { external_id, patch })
            .await
            .unwrap_err();

        assert_eq!(violation_kinds(&err), vec![ViolationKind::ImmutableFieldViolation]);
    }

    #[tokio::test]
    async fn test_patch_state_change() {
        let existing = stored(DeviceState::Available);
        let external_id = existing.external_id;

        let patch: Patch = serde_json::from_value(json!([
            { "op": "replace", "path": "/state", "value": "in_use" },
            { "op": "replace", "path": "/creationTime", "value": "2000-01-01T00:00:00Z" }
        ]))
        .unwrap();

        let device = service(repo_with(Some(existing.clone())))
            .patch_device(PatchDeviceRequest { external_id, patch })
            .await
            .unwrap();

        assert_eq!(device.state, DeviceState::InUse);
        assert_eq!(device.creation_time, existing.creation_time);
    }

    #[tokio::test]
    async fn test_patch_in_use_device_state_only_allowed() {
        let existing = stored(DeviceState::InUse);
        let external_id = existing.external_id;

        let patch: Patch = serde_json::from_value(json!([
            { "op": "replace", "path": "/state", "value": "INACTIVE" }
        ]))
        .unwrap();

        let device = service(repo_with(Some(existing.clone())))
            .patch_device(PatchDeviceRequest { external_id, patch })
            .await
            .unwrap();

        assert_eq!(device.state, DeviceState::Inactive);
        assert_eq!(device.name, existing.name);
        assert_eq!(device.brand, existing.brand);
    }

    #[tokio::test]
    async fn test_patch_in_use_device_rename_then_restore_allowed() {
        let existing = stored(DeviceState::InUse);
        let external_id = existing.external_id;

        let patch: Patch = serde_json::from_value(json!([
            { "op": "replace", "path": "/name", "value": "iPhone 15 Pro" },
            { "op": "replace", "path": "/name", "value": "iPhone 15" }
        ]))
        .unwrap();

        let device = service(repo_with(Some(existing.clone())))
            .patch_device(PatchDeviceRequest { external_id, patch })
            .await
            .unwrap();

        assert_eq!(device, existing);
    }

    #[tokio::test]
    async fn test_patch_failed_test_operation() {
        let existing = stored(DeviceState::Available);
        let external_id = existing.external_id;

        let patch: Patch = serde_json::from_value(json!([
            { "op": "replace", "path": "/name", "value": "Renamed" },
            { "op": "test", "path": "/state", "value": "UNEXPECTED" }
        ]))
        .unwrap();

        let err = service(repo_with(Some(existing)))
            .patch_device(PatchDeviceRequest { external_id, patch })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::PatchFailed {
                operation: Some(1),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_patch_missing_device_not_found() {
        let patch: Patch = serde_json::from_value(json!([])).unwrap();

        let err = service(repo_with(None))
            .patch_device(PatchDeviceRequest {
                external_id: Uuid::new_v4(),
                patch,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::DeviceNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_in_use_device_rejected() {
        let existing = stored(DeviceState::InUse);
        let external_id = existing.external_id;

        let err = service(repo_with(Some(existing)))
            .delete_device(external_id)
            .await
            .unwrap_err();

        assert_eq!(violation_kinds(&err), vec![ViolationKind::InUseViolation]);
    }

    #[tokio::test]
    async fn test_delete_available_device() {
        let existing = stored(DeviceState::Available);
        let external_id = existing.external_id;

        let result = service(repo_with(Some(existing)))
            .delete_device(external_id)
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_get_device_not_found() {
        let mut mock_repo = MockDeviceRepository::new();
        mock_repo
            .expect_get_device()
            .times(1)
            .return_once(|_| Ok(None));

        let result = service(mock_repo).get_device(Uuid::new_v4()).await;
        assert!(matches!(result, Err(DomainError::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_devices_applies_defaults_and_clamps_size() {
        let mut mock_repo = MockDeviceRepository::new();
        mock_repo
            .expect_list_devices()
            .withf(|input| {
                input.filter == DeviceFilter::State(DeviceState::InUse)
                    && input.page.page == 2
                    && input.page.size == 100
                    && input.page.sort.field == DeviceSortField::Name
                    && input.page.sort.direction == SortDirection::Desc
            })
            .times(1)
            .return_once(|input| Ok(Page::new(Vec::new(), &input.page, 0)));

        let page = service(mock_repo)
            .list_devices(ListDevicesRequest {
                filter: ListDevicesFilter::State("in_use".to_string()),
                page: 2,
                size: Some(500),
                sort: Some("name,desc".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(page.size, 100);
    }

    #[tokio::test]
    async fn test_list_devices_default_page_size() {
        let mut mock_repo = MockDeviceRepository::new();
        mock_repo
            .expect_list_devices()
            .withf(|input| input.page.size == 20 && input.page.sort == DeviceSort::default())
            .times(1)
            .return_once(|input| Ok(Page::new(Vec::new(), &input.page, 0)));

        let result = service(mock_repo)
            .list_devices(ListDevicesRequest::default())
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_list_devices_unknown_state() {
        let mut mock_repo = MockDeviceRepository::new();
        mock_repo.expect_list_devices().times(0);

        let err = service(mock_repo)
            .list_devices(ListDevicesRequest {
                filter: ListDevicesFilter::State("RETIRED".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(violation_kinds(&err), vec![ViolationKind::InvalidEnumValue]);
    }

    #[tokio::test]
    async fn test_list_devices_rejects_zero_size_and_bad_sort() {
        let mut mock_repo = MockDeviceRepository::new();
        mock_repo.expect_list_devices().times(0);
        let service = service(mock_repo);

        let zero = service
            .list_devices(ListDevicesRequest {
                size: Some(0),
                ..Default::default()
            })
            .await;
        assert!(matches!(zero, Err(DomainError::ValidationError(_))));

        let bad_sort = service
            .list_devices(ListDevicesRequest {
                sort: Some("id,asc".to_string()),
                ..Default::default()
            })
            .await;
        assert!(matches!(bad_sort, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_health_reports_store_failure() {
        let mut mock_repo = MockDeviceRepository::new();
        mock_repo
            .expect_ping()
            .times(1)
            .return_once(|| Err(DomainError::StoreUnavailable(anyhow!("connection refused"))));

        let result = service(mock_repo).health().await;
        assert!(matches!(result, Err(DomainError::StoreUnavailable(_))));
    }
}
