//! Clothing record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::util::now;

/// A unique identifier for a clothing record, using UUID v7
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClothingId(Uuid);

impl ClothingId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ClothingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClothingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClothingId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Declares a closed string-valued enum whose wire form is its display label.
macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Label used on the wire and in the UI.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $(label if label.eq_ignore_ascii_case($label) => Ok(Self::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        concat!("Unknown ", stringify!($name), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

labelled_enum!(
    /// Intended wearer
    Gender { Male => "Male", Female => "Female", Unisex => "Unisex" }
);

labelled_enum!(
    /// Top-level garment category
    Category {
        Tops => "Tops",
        Bottoms => "Bottoms",
        OuterWear => "Outer Wear",
        InnerWear => "Inner Wear",
    }
);

labelled_enum!(
    /// Physical condition of the stock
    Condition { New => "New", Used => "Used", Refurbished => "Refurbished" }
);

labelled_enum!(
    Size { ExtraSmall => "XS", Small => "S", Medium => "M", Large => "L", ExtraLarge => "XL" }
);

/// Seasons a garment suits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Seasons {
    pub spring: bool,
    pub summer: bool,
    pub fall: bool,
    pub winter: bool,
}

/// Occasions a garment suits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occasions {
    pub formal: bool,
    pub casual: bool,
    pub active_wear: bool,
}

/// A clothing inventory record together with its edit clock.
///
/// Treated as immutable once handed to the store: callers clone, change
/// fields, and commit the copy through `LocalStore::add_item`, which is the
/// only place `edited_at` is stamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClothingItem {
    /// Unique identifier, never reassigned except by [`ClothingItem::with_new_id`]
    pub id: ClothingId,
    pub name: String,
    pub description: String,
    pub brand: String,
    pub gender: Gender,
    pub color: String,
    pub material: String,
    pub category: Category,
    pub sub_category: String,
    pub season: Seasons,
    pub occasion: Occasions,
    pub condition: Condition,
    /// Purchase cost in minor currency units
    pub cost_price: i64,
    /// Listing price in minor currency units
    pub selling_price: i64,
    pub quantity: i64,
    pub size: Size,
    pub date_bought: DateTime<Utc>,
    /// Last user edit; the sole basis for conflict classification
    #[serde(rename = "dateEdited")]
    pub edited_at: DateTime<Utc>,
    /// Hosted image reference, if an image was uploaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ClothingItem {
    /// Create a record with the given name and neutral defaults.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = now();
        Self {
            id: ClothingId::new(),
            name: name.into(),
            description: String::new(),
            brand: String::new(),
            gender: Gender::Unisex,
            color: String::new(),
            material: String::new(),
            category: Category::Tops,
            sub_category: String::new(),
            season: Seasons::default(),
            occasion: Occasions::default(),
            condition: Condition::New,
            cost_price: 0,
            selling_price: 0,
            quantity: 1,
            size: Size::Medium,
            date_bought: now,
            edited_at: now,
            image_url: None,
        }
    }

    /// Copy this record under a freshly generated identity.
    #[must_use]
    pub fn with_new_id(&self) -> Self {
        Self {
            id: ClothingId::new(),
            ..self.clone()
        }
    }

    /// Check if the record has no usable name (whitespace-only counts as empty)
    #[must_use]
    pub fn is_unnamed(&self) -> bool {
        self.name.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clothing_id_unique() {
        let id1 = ClothingId::new();
        let id2 = ClothingId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_clothing_id_parse() {
        let id = ClothingId::new();
        let parsed: ClothingId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_new_item_defaults() {
        let item = ClothingItem::new("Denim jacket");
        assert_eq!(item.name, "Denim jacket");
        assert_eq!(item.quantity, 1);
        assert_eq!(item.date_bought, item.edited_at);
        assert!(item.image_url.is_none());
    }

    #[test]
    fn test_with_new_id_keeps_fields() {
        let item = ClothingItem::new("Scarf");
        let copy = item.with_new_id();
        assert_ne!(copy.id, item.id);
        assert_eq!(copy.name, item.name);
        assert_eq!(copy.edited_at, item.edited_at);
    }

    #[test]
    fn test_labels_parse_case_insensitively() {
        assert_eq!("outer wear".parse::<Category>().unwrap(), Category::OuterWear);
        assert_eq!("xl".parse::<Size>().unwrap(), Size::ExtraLarge);
        assert_eq!(Gender::Female.to_string(), "Female");
        assert!("Sideways".parse::<Condition>().is_err());
    }

    #[test]
    fn test_serialized_shape_uses_wire_names() {
        let mut item = ClothingItem::new("Tee");
        item.category = Category::InnerWear;
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["category"], "Inner Wear");
        assert!(value.get("dateEdited").is_some());
        assert!(value.get("subCategory").is_some());
        assert!(value["occasion"].get("activeWear").is_some());
        assert!(value.get("imageUrl").is_none());
    }

    #[test]
    fn test_is_unnamed() {
        assert!(ClothingItem::new("  ").is_unnamed());
        assert!(!ClothingItem::new("Boots").is_unnamed());
    }
}
