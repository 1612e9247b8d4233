use std::fmt;

/// Category of a rule violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    RequiredField,
    InvalidEnumValue,
    ImmutableFieldViolation,
    InUseViolation,
    NotFound,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::RequiredField => "REQUIRED_FIELD",
            ViolationKind::InvalidEnumValue => "INVALID_ENUM_VALUE",
            ViolationKind::ImmutableFieldViolation => "IMMUTABLE_FIELD_VIOLATION",
            ViolationKind::InUseViolation => "IN_USE_VIOLATION",
            ViolationKind::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed rule, optionally tied to a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: Option<String>,
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn new(field: Option<&str>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            field: field.map(str::to_string),
            kind,
            message: message.into(),
        }
    }

    pub fn for_field(field: &str, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self::new(Some(field), kind, message)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {}", field, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Ordered collection of violations; rules append in evaluation order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViolationSet(Vec<Violation>);

impl ViolationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    pub fn extend(&mut self, other: ViolationSet) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }

    pub fn contains_kind(&self, kind: ViolationKind) -> bool {
        self.0.iter().any(|violation| violation.kind == kind)
    }

    /// `Ok(())` when no rule failed, otherwise the set itself
    pub fn into_result(self) -> Result<(), ViolationSet> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ViolationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&messages)
    }
}

impl From<Vec<Violation>> for ViolationSet {
    fn from(violations: Vec<Violation>) -> Self {
        Self(violations)
    }
}

impl FromIterator<Violation> for ViolationSet {
    fn from_iter<I: IntoIterator<Item = Violation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ViolationSet {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ViolationSet {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_is_ok() {
        assert!(ViolationSet::new().into_result().is_ok());
    }

    #[test]
    fn test_set_keeps_insertion_order() {
        let mut set = ViolationSet::new();
        set.push(Violation::for_field(
            "name",
            ViolationKind::RequiredField,
            "must not be blank",
        ));
        set.push(Violation::for_field(
            "brand",
            ViolationKind::RequiredField,
            "must not be blank",
        ));

        let fields: Vec<_> = set.iter().filter_map(|v| v.field.as_deref()).collect();
        assert_eq!(fields, vec!["name", "brand"]);
        assert_eq!(
            set.to_string(),
            "name: must not be blank; brand: must not be blank"
        );
        assert!(set.contains_kind(ViolationKind::RequiredField));
        assert!(!set.contains_kind(ViolationKind::NotFound));
    }

    #[test]
    fn test_violation_without_field_displays_message_only() {
        let violation = Violation::new(None, ViolationKind::InUseViolation, "device is in use");
        assert_eq!(violation.to_string(), "device is in use");
        assert_eq!(violation.kind.as_str(), "IN_USE_VIOLATION");
    }
}
