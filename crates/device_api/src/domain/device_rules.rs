//! Device validation rules.
//!
//! Every rule appends to a [`ViolationSet`] instead of returning early, so a
//! caller sees all failures of one request together. The state gate compares
//! against the record loaded by the store inside the mutation transaction.

use common::domain::{Device, DeviceState, Violation, ViolationKind, ViolationSet};
use garde::Validate;
use uuid::Uuid;

/// Device fields proposed by a client, before any rule has run
#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct DeviceCandidate {
    #[garde(custom(not_blank))]
    pub name: String,
    #[garde(custom(not_blank))]
    pub brand: String,
    /// Raw state text; parsed by [`state_rule`]
    #[garde(skip)]
    pub state: Option<String>,
}

fn not_blank(value: &str, _context: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("must not be blank"));
    }
    Ok(())
}

/// A candidate that passed every rule for its operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDevice {
    pub name: String,
    pub brand: String,
    pub state: Option<DeviceState>,
}

impl ValidatedDevice {
    /// Merge onto a stored record. Identity and timestamp always come from `existing`;
    /// a missing state keeps the stored one.
    pub fn apply_to(self, existing: &Device) -> Device {
        Device {
            id: existing.id,
            external_id: existing.external_id,
            name: self.name,
            brand: self.brand,
            state: self.state.unwrap_or(existing.state),
            creation_time: existing.creation_time,
        }
    }
}

/// Required-field rules declared on [`DeviceCandidate`]
pub fn field_rules(candidate: &DeviceCandidate) -> ViolationSet {
    common::garde::field_errors(candidate)
        .into_iter()
        .map(|(field, message)| Violation::for_field(&field, ViolationKind::RequiredField, message))
        .collect()
}

/// Parse an optional state, recording an `InvalidEnumValue` violation for unknown text
pub fn state_rule(state: Option<&str>, violations: &mut ViolationSet) -> Option<DeviceState> {
    let raw = state?;
    match raw.parse::<DeviceState>() {
        Ok(state) => Some(state),
        Err(e) => {
            violations.push(Violation::for_field(
                "state",
                ViolationKind::InvalidEnumValue,
                e.to_string(),
            ));
            None
        }
    }
}

/// Parse a state used as a listing filter
pub fn state_filter(state: &str) -> Result<DeviceState, ViolationSet> {
    let mut violations = ViolationSet::new();
    match state_rule(Some(state), &mut violations) {
        Some(state) => Ok(state),
        None => Err(violations),
    }
}

fn state_gate(existing: &Device, candidate: &DeviceCandidate, violations: &mut ViolationSet) {
    if !existing.is_in_use() {
        return;
    }
    if candidate.name != existing.name {
        violations.push(Violation::for_field(
            "name",
            ViolationKind::ImmutableFieldViolation,
            format!("name cannot change while device is {}", DeviceState::InUse),
        ));
    }
    if candidate.brand != existing.brand {
        violations.push(Violation::for_field(
            "brand",
            ViolationKind::ImmutableFieldViolation,
            format!("brand cannot change while device is {}", DeviceState::InUse),
        ));
    }
}

fn validated(
    candidate: &DeviceCandidate,
    state: Option<DeviceState>,
    violations: ViolationSet,
) -> Result<ValidatedDevice, ViolationSet> {
    violations.into_result()?;
    Ok(ValidatedDevice {
        name: candidate.name.clone(),
        brand: candidate.brand.clone(),
        state,
    })
}

pub fn validate_for_create(candidate: &DeviceCandidate) -> Result<ValidatedDevice, ViolationSet> {
    let mut violations = field_rules(candidate);
    let state = state_rule(candidate.state.as_deref(), &mut violations);
    validated(candidate, state, violations)
}

/// Field, state-value and state-gate rules, all evaluated
pub fn validate_for_update(
    existing: &Device,
    candidate: &DeviceCandidate,
) -> Result<ValidatedDevice, ViolationSet> {
    let mut violations = field_rules(candidate);
    let state = state_rule(candidate.state.as_deref(), &mut violations);
    state_gate(existing, candidate, &mut violations);
    validated(candidate, state, violations)
}

pub fn validate_for_delete(existing: &Device) -> Result<(), ViolationSet> {
    let mut violations = ViolationSet::new();
    if existing.is_in_use() {
        violations.push(Violation::new(
            None,
            ViolationKind::InUseViolation,
            format!(
                "device {} cannot be deleted while {}",
                existing.external_id,
                DeviceState::InUse
            ),
        ));
    }
    violations.into_result()
}

/// Existence rule: the first step of every update, patch and delete
pub fn require_existing(
    external_id: Uuid,
    maybe_existing: Option<Device>,
) -> Result<Device, ViolationSet> {
    maybe_existing.ok_or_else(|| {
        vec![Violation::for_field(
            "externalId",
            ViolationKind::NotFound,
            format!("device {} does not exist", external_id),
        )]
        .into()
    })
}

/// A full update must name its target. When it does not, the remaining
/// request-level rules are reported alongside the missing id.
pub fn require_external_id(
    external_id: Option<Uuid>,
    candidate: &DeviceCandidate,
) -> Result<Uuid, ViolationSet> {
    if let Some(external_id) = external_id {
        return Ok(external_id);
    }

    let mut violations = ViolationSet::new();
    violations.push(Violation::for_field(
        "externalId",
        ViolationKind::RequiredField,
        "must be provided",
    ));
    violations.extend(field_rules(candidate));
    state_rule(candidate.state.as_deref(), &mut violations);
    Err(violations)
}
