use crate::domain::{
    CreateDeviceRepoInput, Device, DeviceChange, DeviceFilter, DeviceMutation, DeviceRepository,
    DeviceSortField, DeviceState, DomainError, DomainResult, ListDevicesRepoInput, Page,
};
use crate::postgres::PostgresClient;
use anyhow::anyhow;
use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use tracing::{debug, instrument};
use uuid::Uuid;

const DEVICE_COLUMNS: &str = "id, external_id, name, brand, state, creation_time";

/// Convert a devices row to the domain record
fn device_from_row(row: &Row) -> DomainResult<Device> {
    let state: String = row.get(4);
    let state = state
        .parse::<DeviceState>()
        .map_err(|e| DomainError::RepositoryError(anyhow!(e)))?;

    Ok(Device {
        id: row.get(0),
        external_id: row.get(1),
        name: row.get(2),
        brand: row.get(3),
        state,
        creation_time: row.get(5),
    })
}

/// ORDER BY expression for a sort field. Text columns compare bytewise so the
/// order matches the in-memory store regardless of the database collation.
fn order_expression(field: DeviceSortField) -> &'static str {
    match field {
        DeviceSortField::Name => "name COLLATE \"C\"",
        DeviceSortField::Brand => "brand COLLATE \"C\"",
        DeviceSortField::State => "state COLLATE \"C\"",
        DeviceSortField::CreationTime | DeviceSortField::ExternalId => field.column(),
    }
}

fn repository_error(e: tokio_postgres::Error) -> DomainError {
    DomainError::RepositoryError(e.into())
}

/// PostgreSQL implementation of DeviceRepository trait
#[derive(Clone)]
pub struct PostgresDeviceRepository {
    client: PostgresClient,
}

impl PostgresDeviceRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn connection(&self) -> DomainResult<deadpool_postgres::Client> {
        self.client
            .get_connection()
            .await
            .map_err(DomainError::StoreUnavailable)
    }
}

#[async_trait]
impl DeviceRepository for PostgresDeviceRepository {
    #[instrument(skip(self, input), fields(external_id = %input.external_id, brand = %input.brand))]
    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device> {
        let conn = self.connection().await?;
        let state = input.state.as_str();

        let result = conn
            .query_one(
                &format!(
                    "INSERT INTO devices (external_id, name, brand, state, creation_time)
                     VALUES ($1, $2, $3, $4, $5)
                     RETURNING {}",
                    DEVICE_COLUMNS
                ),
                &[
                    &input.external_id,
                    &input.name,
                    &input.brand,
                    &state,
                    &input.creation_time,
                ],
            )
            .await;

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                // PostgreSQL error code 23505 is unique_violation
                if let Some(db_err) = e.as_db_error() {
                    if db_err.code().code() == "23505" {
                        return Err(DomainError::DeviceAlreadyExists(
                            input.external_id.to_string(),
                        ));
                    }
                }
                return Err(repository_error(e));
            }
        };

        let device = device_from_row(&row)?;
        debug!(id = device.id, "registered device: {}", device.external_id);
        Ok(device)
    }

    #[instrument(skip(self), fields(external_id = %external_id))]
    async fn get_device(&self, external_id: Uuid) -> DomainResult<Option<Device>> {
        let conn = self.connection().await?;

        let row = conn
            .query_opt(
                &format!(
                    "SELECT {} FROM devices WHERE external_id = $1",
                    DEVICE_COLUMNS
                ),
                &[&external_id],
            )
            .await
            .map_err(repository_error)?;

        row.as_ref().map(device_from_row).transpose()
    }

    #[instrument(skip(self), fields(external_id = %external_id))]
    async fn device_exists(&self, external_id: Uuid) -> DomainResult<bool> {
        let conn = self.connection().await?;

        let row = conn
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM devices WHERE external_id = $1)",
                &[&external_id],
            )
            .await
            .map_err(repository_error)?;

        Ok(row.get(0))
    }

    #[instrument(skip(self, input), fields(filter = ?input.filter, page = input.page.page, size = input.page.size))]
    async fn list_devices(&self, input: ListDevicesRepoInput) -> DomainResult<Page<Device>> {
        let conn = self.connection().await?;

        let (where_clause, filter_value) = match &input.filter {
            DeviceFilter::All => ("", None),
            DeviceFilter::Brand(brand) => ("WHERE brand = $1", Some(brand.clone())),
            DeviceFilter::State(state) => ("WHERE state = $1", Some(state.as_str().to_string())),
        };

        let limit = i64::from(input.page.size);
        let offset = i64::try_from(input.page.offset()).unwrap_or(i64::MAX);

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(value) = &filter_value {
            params.push(value);
        }

        let count_row = conn
            .query_one(
                &format!("SELECT COUNT(*) FROM devices {}", where_clause),
                &params,
            )
            .await
            .map_err(repository_error)?;
        let total: i64 = count_row.get(0);

        params.push(&limit);
        params.push(&offset);

        // Sort column and direction come from closed enums, never from raw input
        let sort = input.page.sort;
        let query = format!(
            "SELECT {} FROM devices {} ORDER BY {} {}, id {} LIMIT ${} OFFSET ${}",
            DEVICE_COLUMNS,
            where_clause,
            order_expression(sort.field),
            sort.direction.as_sql(),
            sort.direction.as_sql(),
            params.len() - 1,
            params.len()
        );

        let rows = conn.query(&query, &params).await.map_err(repository_error)?;

        let devices = rows
            .iter()
            .map(device_from_row)
            .collect::<DomainResult<Vec<_>>>()?;

        debug!("found {} of {} devices", devices.len(), total);

        Ok(Page::new(
            devices,
            &input.page,
            u64::try_from(total).unwrap_or_default(),
        ))
    }

    #[instrument(skip(self, mutation), fields(external_id = %external_id))]
    async fn mutate_device(
        &self,
        external_id: Uuid,
        mutation: DeviceMutation,
    ) -> DomainResult<DeviceChange> {
        let mut conn = self.connection().await?;

        let tx = conn.transaction().await.map_err(repository_error)?;

        let current = tx
            .query_opt(
                &format!(
                    "SELECT {} FROM devices WHERE external_id = $1 FOR UPDATE",
                    DEVICE_COLUMNS
                ),
                &[&external_id],
            )
            .await
            .map_err(repository_error)?
            .as_ref()
            .map(device_from_row)
            .transpose()?;

        // An error here drops the transaction, which rolls it back
        let change = mutation(current)?;

        let applied = match change {
            DeviceChange::Save(device) => {
                let state = device.state.as_str();
                let row = tx
                    .query_one(
                        &format!(
                            "UPDATE devices SET name = $1, brand = $2, state = $3
                             WHERE external_id = $4
                             RETURNING {}",
                            DEVICE_COLUMNS
                        ),
                        &[&device.name, &device.brand, &state, &external_id],
                    )
                    .await
                    .map_err(repository_error)?;
                DeviceChange::Save(device_from_row(&row)?)
            }
            DeviceChange::Delete(device) => {
                tx.execute("DELETE FROM devices WHERE external_id = $1", &[&external_id])
                    .await
                    .map_err(repository_error)?;
                DeviceChange::Delete(device)
            }
        };

        tx.commit().await.map_err(repository_error)?;

        debug!("applied device change: {}", external_id);
        Ok(applied)
    }

    async fn ping(&self) -> DomainResult<()> {
        self.client
            .ping()
            .await
            .map_err(DomainError::StoreUnavailable)
    }
}
