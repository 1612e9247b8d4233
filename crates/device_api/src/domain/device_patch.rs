//! RFC 6902 patches over the JSON form of a device.
//!
//! A patch runs against a detached document. Identity fields (`id`,
//! `externalId`, `creationTime`) may be addressed, but whatever the patch does
//! to them is discarded: the result always carries the pre-patch values.

use chrono::{DateTime, Utc};
use common::domain::{Device, DomainError};
use json_patch::Patch;
use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Fields a patch may address but never change
pub const IDENTITY_FIELDS: [&str; 3] = ["id", "externalId", "creationTime"];

/// Fields a patch may change
pub const MUTABLE_FIELDS: [&str; 3] = ["name", "brand", "state"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("operation {operation} failed: {reason}")]
    OperationFailed { operation: usize, reason: String },

    #[error("patched document is not an object")]
    NotAnObject,

    #[error("required field '{0}' was removed")]
    RequiredFieldRemoved(&'static str),

    #[error("field '{field}' must be a string")]
    TypeMismatch { field: &'static str },

    #[error("unknown field '{0}'")]
    UnknownField(String),
}

impl From<PatchError> for DomainError {
    fn from(err: PatchError) -> Self {
        let operation = match &err {
            PatchError::OperationFailed { operation, .. } => Some(*operation),
            _ => None,
        };
        DomainError::PatchFailed {
            operation,
            reason: err.to_string(),
        }
    }
}

/// Device as seen after a patch: identity restored, mutable fields as the patch left them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceView {
    pub id: i64,
    pub external_id: Uuid,
    pub name: String,
    pub brand: String,
    pub state: String,
    pub creation_time: DateTime<Utc>,
}

impl DeviceView {
    pub fn into_candidate(self) -> super::DeviceCandidate {
        super::DeviceCandidate {
            name: self.name,
            brand: self.brand,
            state: Some(self.state),
        }
    }
}

/// The document a patch addresses
pub fn device_document(device: &Device) -> Value {
    json!({
        "id": device.id,
        "externalId": device.external_id,
        "name": device.name,
        "brand": device.brand,
        "state": device.state.as_str(),
        "creationTime": device.creation_time,
    })
}

fn take_string(fields: &mut Map<String, Value>, field: &'static str) -> Result<String, PatchError> {
    match fields.remove(field) {
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(PatchError::TypeMismatch { field }),
        None => Err(PatchError::RequiredFieldRemoved(field)),
    }
}

/// Apply `patch` to `current` without touching it.
///
/// Operations run in order; the first failure aborts the whole patch.
pub fn apply_patch(current: &Device, patch: &Patch) -> Result<DeviceView, PatchError> {
    let mut document = device_document(current);

    json_patch::patch(&mut document, &patch.0).map_err(|e| PatchError::OperationFailed {
        operation: e.operation,
        reason: e.kind.to_string(),
    })?;

    let Value::Object(mut fields) = document else {
        return Err(PatchError::NotAnObject);
    };

    if let Some(unknown) = fields.keys().find(|key| {
        !IDENTITY_FIELDS.contains(&key.as_str()) && !MUTABLE_FIELDS.contains(&key.as_str())
    }) {
        return Err(PatchError::UnknownField(unknown.clone()));
    }

    let name = take_string(&mut fields, "name")?;
    let brand = take_string(&mut fields, "brand")?;
    let state = take_string(&mut fields, "state")?;

    Ok(DeviceView {
        id: current.id,
        external_id: current.external_id,
        name,
        brand,
        state,
        creation_time: current.creation_time,
    })
}
