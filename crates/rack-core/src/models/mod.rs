//! Data models for Rack

mod clothing;
mod conflict;

pub use clothing::{
    Category, ClothingId, ClothingItem, Condition, Gender, Occasions, Seasons, Size,
};
pub use conflict::{Conflict, ConflictMap, ConflictReason};
