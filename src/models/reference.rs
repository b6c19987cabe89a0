//! Records owned by the administrative modules and read through the directory ports

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Catalog item type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Book,
    Tool,
    Equipment,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Book => "book",
            ItemKind::Tool => "tool",
            ItemKind::Equipment => "equipment",
        }
    }
}

impl std::str::FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "book" => Ok(ItemKind::Book),
            "tool" => Ok(ItemKind::Tool),
            "equipment" => Ok(ItemKind::Equipment),
            _ => Err(format!("Invalid item kind: {}", s)),
        }
    }
}

text_column!(ItemKind);

/// Borrower as exposed by the user directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserRecord {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
}

/// Minimal catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CatalogRecord {
    pub id: i32,
    pub title: String,
    pub kind: ItemKind,
    pub author: Option<String>,
    pub isbn: Option<String>,
}

/// Library or lab registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LocationRecord {
    pub id: i32,
    pub name: String,
}
