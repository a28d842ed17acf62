//! Remote document shape and record mapping.
//!
//! The remote store keeps one document per record under
//! `users/{sync id}/clothing/{record id}`. Every field is wrapped in a typed
//! value object (`{"stringValue": "..."}`, `{"integerValue": "12"}`, ...).
//! A sibling document with the reserved id [`METADATA_DOCUMENT_ID`] carries the
//! `last_updated` freshness stamp and is never a record.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{ClothingId, ClothingItem, Occasions, Seasons};

/// Reserved id of the watermark document inside a record collection.
pub const METADATA_DOCUMENT_ID: &str = "metadata";
/// Field of the metadata document holding the last write stamp.
pub const LAST_UPDATED_FIELD: &str = "last_updated";

/// One typed field value, one variant per primitive kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldValue {
    StringValue(String),
    /// Integers travel as decimal strings to survive 64-bit precision.
    IntegerValue(String),
    DoubleValue(f64),
    BooleanValue(bool),
    /// RFC 3339 / ISO 8601 timestamp
    TimestampValue(String),
    MapValue(MapValue),
    ArrayValue(ArrayValue),
    NullValue(()),
    /// Base64-encoded bytes
    BytesValue(String),
    GeoPointValue(GeoPoint),
    /// Full document path
    ReferenceValue(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<FieldValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl FieldValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::StringValue(value.into())
    }

    pub fn integer(value: i64) -> Self {
        Self::IntegerValue(value.to_string())
    }

    pub fn timestamp(value: DateTime<Utc>) -> Self {
        Self::TimestampValue(value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn flags<'a>(pairs: impl IntoIterator<Item = (&'a str, bool)>) -> Self {
        Self::MapValue(MapValue {
            fields: pairs
                .into_iter()
                .map(|(name, flag)| (name.to_string(), Self::BooleanValue(flag)))
                .collect(),
        })
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::StringValue(_) => "string",
            Self::IntegerValue(_) => "integer",
            Self::DoubleValue(_) => "double",
            Self::BooleanValue(_) => "boolean",
            Self::TimestampValue(_) => "timestamp",
            Self::MapValue(_) => "map",
            Self::ArrayValue(_) => "array",
            Self::NullValue(()) => "null",
            Self::BytesValue(_) => "bytes",
            Self::GeoPointValue(_) => "geo point",
            Self::ReferenceValue(_) => "reference",
        }
    }
}

/// A remote document: its resource name plus typed fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// The last path segment of the resource name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    pub fn is_metadata(&self) -> bool {
        self.id() == METADATA_DOCUMENT_ID
    }
}

/// One page of a collection listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Build the field set of a record document.
pub fn encode_item(item: &ClothingItem) -> Document {
    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), FieldValue::string(&item.name));
    fields.insert(
        "description".to_string(),
        FieldValue::string(&item.description),
    );
    fields.insert("brand".to_string(), FieldValue::string(&item.brand));
    fields.insert("gender".to_string(), FieldValue::string(item.gender.as_str()));
    fields.insert("color".to_string(), FieldValue::string(&item.color));
    fields.insert("material".to_string(), FieldValue::string(&item.material));
    fields.insert(
        "category".to_string(),
        FieldValue::string(item.category.as_str()),
    );
    fields.insert(
        "subCategory".to_string(),
        FieldValue::string(&item.sub_category),
    );
    fields.insert(
        "season".to_string(),
        FieldValue::flags([
            ("spring", item.season.spring),
            ("summer", item.season.summer),
            ("fall", item.season.fall),
            ("winter", item.season.winter),
        ]),
    );
    fields.insert(
        "occasion".to_string(),
        FieldValue::flags([
            ("formal", item.occasion.formal),
            ("casual", item.occasion.casual),
            ("activeWear", item.occasion.active_wear),
        ]),
    );
    fields.insert(
        "condition".to_string(),
        FieldValue::string(item.condition.as_str()),
    );
    fields.insert("costPrice".to_string(), FieldValue::integer(item.cost_price));
    fields.insert(
        "sellingPrice".to_string(),
        FieldValue::integer(item.selling_price),
    );
    fields.insert("quantity".to_string(), FieldValue::integer(item.quantity));
    fields.insert("size".to_string(), FieldValue::string(item.size.as_str()));
    fields.insert(
        "dateBought".to_string(),
        FieldValue::timestamp(item.date_bought),
    );
    fields.insert(
        "dateEdited".to_string(),
        FieldValue::timestamp(item.edited_at),
    );
    if let Some(url) = &item.image_url {
        fields.insert("imgUrl".to_string(), FieldValue::string(url));
    }

    Document {
        fields,
        ..Document::default()
    }
}

/// Materialize a record from a document's fields.
///
/// Any missing or mistyped field makes the whole document unreconcilable.
pub fn decode_item(document: &Document) -> Result<ClothingItem> {
    let id = document.id();
    let fields = FieldReader {
        id,
        fields: &document.fields,
    };

    let season = fields.flags("season")?;
    let occasion = fields.flags("occasion")?;

    Ok(ClothingItem {
        id: id
            .parse::<ClothingId>()
            .map_err(|error| Error::decode(id, format!("invalid record id: {error}")))?,
        name: fields.string("name")?,
        description: fields.string("description")?,
        brand: fields.string("brand")?,
        gender: fields.label("gender")?,
        color: fields.string("color")?,
        material: fields.string("material")?,
        category: fields.label("category")?,
        sub_category: fields.string("subCategory")?,
        season: Seasons {
            spring: flag(&season, "spring"),
            summer: flag(&season, "summer"),
            fall: flag(&season, "fall"),
            winter: flag(&season, "winter"),
        },
        occasion: Occasions {
            formal: flag(&occasion, "formal"),
            casual: flag(&occasion, "casual"),
            active_wear: flag(&occasion, "activeWear"),
        },
        condition: fields.label("condition")?,
        cost_price: fields.integer("costPrice")?,
        selling_price: fields.integer("sellingPrice")?,
        quantity: fields.integer("quantity")?,
        size: fields.label("size")?,
        date_bought: fields.timestamp("dateBought")?,
        edited_at: fields.timestamp("dateEdited")?,
        image_url: fields.optional_string("imgUrl"),
    })
}

/// Body for the metadata document.
pub fn metadata_document(last_updated: DateTime<Utc>) -> Document {
    let mut fields = BTreeMap::new();
    fields.insert(
        LAST_UPDATED_FIELD.to_string(),
        FieldValue::timestamp(last_updated),
    );
    Document {
        fields,
        ..Document::default()
    }
}

/// Read `last_updated` from the metadata document.
pub fn decode_last_updated(document: &Document) -> Result<Option<DateTime<Utc>>> {
    let fields = FieldReader {
        id: METADATA_DOCUMENT_ID,
        fields: &document.fields,
    };
    if !document.fields.contains_key(LAST_UPDATED_FIELD) {
        return Ok(None);
    }
    fields.timestamp(LAST_UPDATED_FIELD).map(Some)
}

/// Parse a wire timestamp, normalized to UTC at millisecond precision.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc).trunc_subsecs(3))
}

struct FieldReader<'a> {
    id: &'a str,
    fields: &'a BTreeMap<String, FieldValue>,
}

impl FieldReader<'_> {
    fn field(&self, name: &str) -> Result<&FieldValue> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::decode(self.id, format!("missing field '{name}'")))
    }

    fn mistyped(&self, name: &str, expected: &str, value: &FieldValue) -> Error {
        Error::decode(
            self.id,
            format!(
                "field '{name}' should be {expected}, got {}",
                value.kind()
            ),
        )
    }

    fn string(&self, name: &str) -> Result<String> {
        match self.field(name)? {
            FieldValue::StringValue(value) => Ok(value.clone()),
            other => Err(self.mistyped(name, "a string", other)),
        }
    }

    fn optional_string(&self, name: &str) -> Option<String> {
        match self.fields.get(name) {
            Some(FieldValue::StringValue(value)) if !value.trim().is_empty() => {
                Some(value.trim().to_string())
            }
            _ => None,
        }
    }

    fn label<T>(&self, name: &str) -> Result<T>
    where
        T: std::str::FromStr<Err = Error>,
    {
        self.string(name)?
            .parse()
            .map_err(|error: Error| Error::decode(self.id, format!("field '{name}': {error}")))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn integer(&self, name: &str) -> Result<i64> {
        match self.field(name)? {
            FieldValue::IntegerValue(raw) => {
                let raw = raw.trim();
                raw.parse::<i64>()
                    .ok()
                    // Older writers stored decimal prices as integer strings.
                    .or_else(|| {
                        raw.parse::<f64>()
                            .ok()
                            .filter(|value| value.is_finite())
                            .map(|value| value.round() as i64)
                    })
                    .ok_or_else(|| {
                        Error::decode(self.id, format!("field '{name}' is not a number: '{raw}'"))
                    })
            }
            FieldValue::DoubleValue(value) if value.is_finite() => Ok(value.round() as i64),
            other => Err(self.mistyped(name, "an integer", other)),
        }
    }

    fn timestamp(&self, name: &str) -> Result<DateTime<Utc>> {
        match self.field(name)? {
            FieldValue::TimestampValue(raw) => parse_timestamp(raw).ok_or_else(|| {
                Error::decode(self.id, format!("field '{name}' is not a timestamp: '{raw}'"))
            }),
            other => Err(self.mistyped(name, "a timestamp", other)),
        }
    }

    fn flags(&self, name: &str) -> Result<BTreeMap<String, FieldValue>> {
        match self.field(name)? {
            FieldValue::MapValue(map) => Ok(map.fields.clone()),
            other => Err(self.mistyped(name, "a map", other)),
        }
    }
}

fn flag(fields: &BTreeMap<String, FieldValue>, name: &str) -> bool {
    matches!(fields.get(name), Some(FieldValue::BooleanValue(true)))
}
