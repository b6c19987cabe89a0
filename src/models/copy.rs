//! Item copy (physical inventory unit) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::reference::{CatalogRecord, LocationRecord};
use crate::error::{AppError, AppResult};

pub const INVENTORY_CODE_MIN_LEN: usize = 3;
pub const INVENTORY_CODE_MAX_LEN: usize = 50;

/// Where a copy is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CopyLocation {
    Library,
    Lab,
}

impl CopyLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyLocation::Library => "library",
            CopyLocation::Lab => "lab",
        }
    }
}

impl std::str::FromStr for CopyLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "library" => Ok(CopyLocation::Library),
            "lab" => Ok(CopyLocation::Lab),
            _ => Err(format!("Invalid copy location: {}", s)),
        }
    }
}

text_column!(CopyLocation);

/// Availability state of a copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CopyState {
    Unavailable,
    #[default]
    Available,
    Loaned,
    Maintenance,
    Lost,
}

impl CopyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyState::Unavailable => "unavailable",
            CopyState::Available => "available",
            CopyState::Loaned => "loaned",
            CopyState::Maintenance => "maintenance",
            CopyState::Lost => "lost",
        }
    }
}

impl std::str::FromStr for CopyState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unavailable" => Ok(CopyState::Unavailable),
            "available" => Ok(CopyState::Available),
            "loaned" => Ok(CopyState::Loaned),
            "maintenance" => Ok(CopyState::Maintenance),
            "lost" => Ok(CopyState::Lost),
            _ => Err(format!("Invalid copy state: {}", s)),
        }
    }
}

text_column!(CopyState);

/// Normalised inventory code: trimmed, uppercased, 3 to 50 characters.
///
/// Uniqueness is compared on the normalised form, so `abc-01` and `ABC-01`
/// collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InventoryCode(String);

impl InventoryCode {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("Inventory code cannot be empty".to_string()));
        }

        let len = trimmed.chars().count();
        if len < INVENTORY_CODE_MIN_LEN {
            return Err(AppError::Validation(format!(
                "Inventory code must have at least {} characters",
                INVENTORY_CODE_MIN_LEN
            )));
        }
        if len > INVENTORY_CODE_MAX_LEN {
            return Err(AppError::Validation(format!(
                "Inventory code cannot exceed {} characters",
                INVENTORY_CODE_MAX_LEN
            )));
        }

        Ok(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InventoryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location paired with the registry entry it points at.
///
/// Exactly one of library/lab is ever set, so the pairing invariant holds by
/// construction once a value of this type exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Library(i32),
    Lab(i32),
}

impl Placement {
    /// Build a placement from the flat wire/database representation
    pub fn from_parts(
        location: CopyLocation,
        library_id: Option<i32>,
        lab_id: Option<i32>,
    ) -> AppResult<Self> {
        match (location, library_id, lab_id) {
            (CopyLocation::Library, Some(id), None) => Ok(Placement::Library(id)),
            (CopyLocation::Lab, None, Some(id)) => Ok(Placement::Lab(id)),
            (CopyLocation::Library, None, _) => Err(AppError::Validation(
                "A copy stored in a library must have library_id".to_string(),
            )),
            (CopyLocation::Lab, _, None) => Err(AppError::Validation(
                "A copy stored in a lab must have lab_id".to_string(),
            )),
            (CopyLocation::Library, Some(_), Some(_)) => Err(AppError::Validation(
                "A copy stored in a library cannot have lab_id".to_string(),
            )),
            (CopyLocation::Lab, Some(_), Some(_)) => Err(AppError::Validation(
                "A copy stored in a lab cannot have library_id".to_string(),
            )),
        }
    }

    /// Point `location` at the library or lab with id `reference_id`
    pub fn at(location: CopyLocation, reference_id: i32) -> Self {
        match location {
            CopyLocation::Library => Placement::Library(reference_id),
            CopyLocation::Lab => Placement::Lab(reference_id),
        }
    }

    pub fn location(&self) -> CopyLocation {
        match self {
            Placement::Library(_) => CopyLocation::Library,
            Placement::Lab(_) => CopyLocation::Lab,
        }
    }

    pub fn library_id(&self) -> Option<i32> {
        match self {
            Placement::Library(id) => Some(*id),
            Placement::Lab(_) => None,
        }
    }

    pub fn lab_id(&self) -> Option<i32> {
        match self {
            Placement::Lab(id) => Some(*id),
            Placement::Library(_) => None,
        }
    }
}

/// Copy record as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ItemCopy {
    pub id: i32,
    pub catalog_item_id: i32,
    /// Uppercase, globally unique
    pub inventory_code: String,
    pub location: CopyLocation,
    pub library_id: Option<i32>,
    pub lab_id: Option<i32>,
    pub state: CopyState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ItemCopy {
    /// Re-check the stored location/reference pairing
    pub fn placement(&self) -> AppResult<Placement> {
        Placement::from_parts(self.location, self.library_id, self.lab_id)
    }

    pub fn place(&mut self, placement: Placement) {
        self.location = placement.location();
        self.library_id = placement.library_id();
        self.lab_id = placement.lab_id();
    }
}

/// Validated copy ready to be inserted
#[derive(Debug, Clone)]
pub struct NewCopy {
    pub catalog_item_id: i32,
    pub inventory_code: InventoryCode,
    pub placement: Placement,
    pub state: CopyState,
    pub created_at: DateTime<Utc>,
}

/// Create copy request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCopy {
    pub catalog_item_id: i32,
    pub inventory_code: String,
    pub location: CopyLocation,
    pub library_id: Option<i32>,
    pub lab_id: Option<i32>,
}

/// Move a copy to another library or lab
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangeCopyLocation {
    pub location: CopyLocation,
    /// Library or lab id, matching `location`
    pub reference_id: i32,
}

/// Administrative state change
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangeCopyState {
    pub state: CopyState,
}

/// Edit catalog linkage or inventory code
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateCopyDetails {
    pub catalog_item_id: Option<i32>,
    pub inventory_code: Option<String>,
}

/// Copy query filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct CopyFilter {
    pub catalog_item_id: Option<i32>,
    pub location: Option<CopyLocation>,
    pub state: Option<CopyState>,
    pub library_id: Option<i32>,
    pub lab_id: Option<i32>,
}

impl CopyFilter {
    pub fn matches(&self, copy: &ItemCopy) -> bool {
        self.catalog_item_id.map_or(true, |id| copy.catalog_item_id == id)
            && self.location.map_or(true, |l| copy.location == l)
            && self.state.map_or(true, |s| copy.state == s)
            && self.library_id.map_or(true, |id| copy.library_id == Some(id))
            && self.lab_id.map_or(true, |id| copy.lab_id == Some(id))
    }
}

/// Available copy joined with its catalog entry, for loan discovery
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AvailableCopy {
    pub copy: ItemCopy,
    pub catalog: CatalogRecord,
}

/// Copy with its catalog entry and the library or lab holding it
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CopyDetails {
    pub copy: ItemCopy,
    pub catalog: CatalogRecord,
    /// Library when `copy.location` is library, lab otherwise
    pub location: LocationRecord,
}
