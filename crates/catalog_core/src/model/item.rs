//! Catalog item domain model.
//!
//! # Responsibility
//! - Define the persisted item record and the caller-supplied payload.
//! - Validate payload fields before any store write.
//!
//! # Invariants
//! - `id`, `created_at` and `updated_at` are assigned by the store only.
//! - `name` is never blank.
//! - `deleted_at` is the source of truth for tombstone state.

use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a catalog item.
pub type ItemId = i64;

/// Column width inherited from the catalog's relational schema.
pub const MAX_FIELD_CHARS: usize = 191;

/// Persisted catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Reference to an uploaded image (URL or path). Never dereferenced here.
    pub image: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
    /// Unix epoch milliseconds when soft-deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl Item {
    /// Returns whether this item is visible to reads.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Copies every mutable field from `payload` onto this item.
    ///
    /// Identifier and timestamps are left untouched.
    pub fn apply(&mut self, payload: &ItemPayload) {
        self.name = payload.name.clone();
        self.category = payload.category.clone();
        self.description = payload.description.clone();
        self.image = payload.image.clone();
    }

    /// Returns the mutable fields of this item as a payload.
    pub fn payload(&self) -> ItemPayload {
        ItemPayload {
            name: self.name.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
        }
    }
}

/// Caller-supplied mutable fields of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPayload {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl ItemPayload {
    /// Creates a payload carrying only the required name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Validates required fields and column widths.
    ///
    /// # Errors
    /// - `EmptyName` when `name` is blank.
    /// - `FieldTooLong` when any field exceeds [`MAX_FIELD_CHARS`].
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.name.trim().is_empty() {
            return Err(ItemValidationError::EmptyName);
        }

        let fields = [
            ("name", Some(self.name.as_str())),
            ("category", self.category.as_deref()),
            ("description", self.description.as_deref()),
            ("image", self.image.as_deref()),
        ];
        for (field, value) in fields {
            if value.is_some_and(|text| text.chars().count() > MAX_FIELD_CHARS) {
                return Err(ItemValidationError::FieldTooLong {
                    field,
                    max: MAX_FIELD_CHARS,
                });
            }
        }

        Ok(())
    }
}

/// Validation errors for item payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemValidationError {
    #[error("item name is required")]
    EmptyName,
    #[error("item {field} exceeds {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
}
