use crate::domain::result::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Device attributes a listing can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSortField {
    Name,
    Brand,
    State,
    CreationTime,
    ExternalId,
}

impl DeviceSortField {
    /// Column name in the devices table
    pub fn column(&self) -> &'static str {
        match self {
            DeviceSortField::Name => "name",
            DeviceSortField::Brand => "brand",
            DeviceSortField::State => "state",
            DeviceSortField::CreationTime => "creation_time",
            DeviceSortField::ExternalId => "external_id",
        }
    }

    fn from_param(value: &str) -> Option<Self> {
        match value {
            "name" => Some(DeviceSortField::Name),
            "brand" => Some(DeviceSortField::Brand),
            "state" => Some(DeviceSortField::State),
            "creationTime" | "creation_time" => Some(DeviceSortField::CreationTime),
            "externalId" | "external_id" => Some(DeviceSortField::ExternalId),
            _ => None,
        }
    }
}

/// Ordering of a device listing; ties are always broken by surrogate id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSort {
    pub field: DeviceSortField,
    pub direction: SortDirection,
}

impl Default for DeviceSort {
    fn default() -> Self {
        Self {
            field: DeviceSortField::CreationTime,
            direction: SortDirection::Desc,
        }
    }
}

impl DeviceSort {
    /// Parse a `field[,asc|desc]` sort parameter
    pub fn parse(param: &str) -> DomainResult<Self> {
        let mut parts = param.split(',').map(str::trim);
        let field_name = parts.next().unwrap_or_default();
        let field = DeviceSortField::from_param(field_name).ok_or_else(|| {
            DomainError::ValidationError(format!("sort: unsupported field '{}'", field_name))
        })?;

        let direction = match parts.next() {
            None => SortDirection::Asc,
            Some(dir) if dir.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            Some(dir) if dir.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            Some(dir) => {
                return Err(DomainError::ValidationError(format!(
                    "sort: unsupported direction '{}'",
                    dir
                )))
            }
        };

        if parts.next().is_some() {
            return Err(DomainError::ValidationError(format!(
                "sort: expected 'field[,asc|desc]', got '{}'",
                param
            )));
        }

        Ok(Self { field, direction })
    }
}

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: DeviceSort,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

/// One page of a listing plus the total count across all pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub number: u32,
    pub size: u32,
    pub total_elements: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            number: request.page,
            size: request.size,
            total_elements,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(u64::from(self.size))
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
        }
    }
}
