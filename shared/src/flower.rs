//! Flower shapes. Wire payloads use camelCase; store rows use snake_case and
//! are converted here, at the storage boundary.

use crate::ANONYMOUS_CREATOR;
use serde::{Deserialize, Serialize};

/// A placed flower as it travels in `flower-placed` and `flowers-all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flower {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub image_data: String,
    pub created_by: String,
    pub created_at: u64,
}

/// Payload of a `flower-place` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowerPlacement {
    pub x: f32,
    pub y: f32,
    pub image_data: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl FlowerPlacement {
    pub fn new(x: f32, y: f32, image_data: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            x,
            y,
            image_data: image_data.into(),
            created_by: Some(created_by.into()),
        }
    }

    /// Creator name after defaulting: missing, null or blank is anonymous.
    pub fn creator(&self) -> String {
        match self.created_by.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => ANONYMOUS_CREATOR.to_string(),
        }
    }
}

/// A validated placement handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFlower {
    pub x: f32,
    pub y: f32,
    pub image_data: String,
    pub created_by: String,
}

impl From<FlowerPlacement> for NewFlower {
    fn from(placement: FlowerPlacement) -> Self {
        let created_by = placement.creator();
        Self {
            x: placement.x,
            y: placement.y,
            image_data: placement.image_data,
            created_by,
        }
    }
}

impl NewFlower {
    pub fn into_flower(self, id: String, created_at: u64) -> Flower {
        Flower {
            id,
            x: self.x,
            y: self.y,
            image_data: self.image_data,
            created_by: self.created_by,
            created_at,
        }
    }
}

/// Persisted row layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowerRecord {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub image_data: String,
    pub created_by: String,
    pub created_at: u64,
}

impl From<FlowerRecord> for Flower {
    fn from(record: FlowerRecord) -> Self {
        Self {
            id: record.id,
            x: record.x,
            y: record.y,
            image_data: record.image_data,
            created_by: record.created_by,
            created_at: record.created_at,
        }
    }
}

impl From<&Flower> for FlowerRecord {
    fn from(flower: &Flower) -> Self {
        Self {
            id: flower.id.clone(),
            x: flower.x,
            y: flower.y,
            image_data: flower.image_data.clone(),
            created_by: flower.created_by.clone(),
            created_at: flower.created_at,
        }
    }
}
