use crate::domain::page::{Page, PageRequest};
use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle state of a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    #[default]
    Available,
    InUse,
    Inactive,
}

impl DeviceState {
    pub const ALL: [DeviceState; 3] = [
        DeviceState::Available,
        DeviceState::InUse,
        DeviceState::Inactive,
    ];

    /// Wire and storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Available => "AVAILABLE",
            DeviceState::InUse => "IN_USE",
            DeviceState::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized device state '{0}', expected one of AVAILABLE, IN_USE, INACTIVE")]
pub struct UnknownDeviceState(pub String);

/// Parsing ignores case and surrounding whitespace
impl FromStr for DeviceState {
    type Err = UnknownDeviceState;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        DeviceState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownDeviceState(value.to_string()))
    }
}

/// Stored device record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Surrogate key assigned by the store
    pub id: i64,
    pub external_id: Uuid,
    pub name: String,
    pub brand: String,
    pub state: DeviceState,
    pub creation_time: DateTime<Utc>,
}

impl Device {
    pub fn is_in_use(&self) -> bool {
        self.state == DeviceState::InUse
    }
}

/// Input for inserting a device; identity and timestamp are assigned by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDeviceRepoInput {
    pub external_id: Uuid,
    pub name: String,
    pub brand: String,
    pub state: DeviceState,
    pub creation_time: DateTime<Utc>,
}

/// Which devices a listing scans
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeviceFilter {
    #[default]
    All,
    Brand(String),
    State(DeviceState),
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device) -> bool {
        match self {
            DeviceFilter::All => true,
            DeviceFilter::Brand(brand) => device.brand == *brand,
            DeviceFilter::State(state) => device.state == *state,
        }
    }
}

/// Input for listing devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDevicesRepoInput {
    pub filter: DeviceFilter,
    pub page: PageRequest,
}

/// Decision produced by a mutation, applied by the store in the same transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceChange {
    /// Persist name, brand and state of the given device
    Save(Device),
    /// Remove the given device
    Delete(Device),
}

/// Read-modify-write step run by [`DeviceRepository::mutate_device`].
///
/// Receives the record as currently stored (locked for the duration of the call),
/// or `None` when no record has the requested external id. Returning an error
/// aborts the transaction without writing.
pub type DeviceMutation = Box<dyn FnOnce(Option<Device>) -> DomainResult<DeviceChange> + Send>;

/// Repository trait for device storage operations
/// Infrastructure layer (postgres, memory) implements this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Insert a new device
    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device>;

    /// Get a device by external id
    async fn get_device(&self, external_id: Uuid) -> DomainResult<Option<Device>>;

    /// Check whether a device with the external id exists
    async fn device_exists(&self, external_id: Uuid) -> DomainResult<bool>;

    /// List one page of devices matching the filter
    async fn list_devices(&self, input: ListDevicesRepoInput) -> DomainResult<Page<Device>>;

    /// Load, decide and write a device as one atomic unit.
    /// Returns the change as applied by the store.
    async fn mutate_device(
        &self,
        external_id: Uuid,
        mutation: DeviceMutation,
    ) -> DomainResult<DeviceChange>;

    /// Verify the store is reachable
    async fn ping(&self) -> DomainResult<()>;
}
