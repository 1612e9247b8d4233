use crate::domain::{
    CreateDeviceRepoInput, Device, DeviceChange, DeviceMutation, DeviceRepository,
    DeviceSortField, DomainError, DomainResult, ListDevicesRepoInput, Page, PageRequest,
    SortDirection,
};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Default)]
struct DeviceTable {
    next_id: i64,
    devices: HashMap<Uuid, Device>,
}

/// Process-local device store, used for tests and single-node runs without PostgreSQL
#[derive(Default)]
pub struct InMemoryDeviceRepository {
    table: RwLock<DeviceTable>,
}

impl InMemoryDeviceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare_devices(a: &Device, b: &Device, page: &PageRequest) -> Ordering {
    let by_field = match page.sort.field {
        DeviceSortField::Name => a.name.cmp(&b.name),
        DeviceSortField::Brand => a.brand.cmp(&b.brand),
        DeviceSortField::State => a.state.as_str().cmp(b.state.as_str()),
        DeviceSortField::CreationTime => a.creation_time.cmp(&b.creation_time),
        DeviceSortField::ExternalId => a.external_id.cmp(&b.external_id),
    };
    let ordering = by_field.then(a.id.cmp(&b.id));
    match page.sort.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

#[async_trait]
impl DeviceRepository for InMemoryDeviceRepository {
    #[instrument(skip(self, input), fields(external_id = %input.external_id))]
    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device> {
        let mut table = self.table.write().await;

        if table.devices.contains_key(&input.external_id) {
            return Err(DomainError::DeviceAlreadyExists(
                input.external_id.to_string(),
            ));
        }

        table.next_id += 1;
        let device = Device {
            id: table.next_id,
            external_id: input.external_id,
            name: input.name,
            brand: input.brand,
            state: input.state,
            creation_time: input.creation_time,
        };
        table.devices.insert(device.external_id, device.clone());

        debug!(id = device.id, "registered device: {}", device.external_id);
        Ok(device)
    }

    async fn get_device(&self, external_id: Uuid) -> DomainResult<Option<Device>> {
        Ok(self.table.read().await.devices.get(&external_id).cloned())
    }

    async fn device_exists(&self, external_id: Uuid) -> DomainResult<bool> {
        Ok(self.table.read().await.devices.contains_key(&external_id))
    }

    #[instrument(skip(self, input), fields(filter = ?input.filter))]
    async fn list_devices(&self, input: ListDevicesRepoInput) -> DomainResult<Page<Device>> {
        let table = self.table.read().await;

        let mut matching: Vec<&Device> = table
            .devices
            .values()
            .filter(|device| input.filter.matches(device))
            .collect();
        matching.sort_by(|a, b| compare_devices(a, b, &input.page));

        let total = matching.len() as u64;
        let offset = usize::try_from(input.page.offset()).unwrap_or(usize::MAX);
        let content = matching
            .into_iter()
            .skip(offset)
            .take(input.page.size as usize)
            .cloned()
            .collect();

        Ok(Page::new(content, &input.page, total))
    }

    #[instrument(skip(self, mutation), fields(external_id = %external_id))]
    async fn mutate_device(
        &self,
        external_id: Uuid,
        mutation: DeviceMutation,
    ) -> DomainResult<DeviceChange> {
        // The write lock is held across load, decide and write
        let mut table = self.table.write().await;
        let current = table.devices.get(&external_id).cloned();

        match mutation(current.clone())? {
            DeviceChange::Save(device) => {
                let stored = current.ok_or_else(|| {
                    DomainError::DeviceNotFound(format!("device {} does not exist", external_id))
                })?;
                let updated = Device {
                    name: device.name,
                    brand: device.brand,
                    state: device.state,
                    ..stored
                };
                table.devices.insert(external_id, updated.clone());
                Ok(DeviceChange::Save(updated))
            }
            DeviceChange::Delete(device) => {
                table.devices.remove(&external_id);
                Ok(DeviceChange::Delete(device))
            }
        }
    }

    async fn ping(&self) -> DomainResult<()> {
        Ok(())
    }
}
