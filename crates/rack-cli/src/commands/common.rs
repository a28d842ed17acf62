use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rack_core::db::LibSqlKeyValueStore;
use rack_core::models::{Occasions, Seasons};
use rack_core::{
    ClothingId, ClothingItem, Conflict, FirestoreRemote, LocalStore, Notifier, RemoteLink,
    SyncSession, SyncSettings, WriteOutcome,
};
use serde::Serialize;

use crate::cli::{ItemFields, OccasionArg, SeasonArg};
use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

#[derive(Debug, Serialize)]
pub struct ItemListItem {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub size: String,
    pub quantity: i64,
    pub selling_price: i64,
    pub edited_at: String,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct ConflictItem {
    pub id: String,
    pub reason: String,
    pub name: String,
    pub local_edited_at: Option<String>,
    pub remote_edited_at: Option<String>,
}

#[derive(Clone, Copy)]
pub enum OpenStoreMode {
    Standard,
    RequireSync,
}

impl OpenStoreMode {
    const fn requires_sync(self) -> bool {
        matches!(self, Self::RequireSync)
    }
}

/// Open the local store, attaching the remote when sync is configured.
pub async fn open_store(path: &Path, mode: OpenStoreMode) -> Result<Arc<LocalStore>, CliError> {
    let settings = SyncSettings::from_env()?;
    if settings.is_none() && mode.requires_sync() {
        return Err(CliError::SyncNotConfigured);
    }

    let backing = Arc::new(LibSqlKeyValueStore::open(path).await?);
    let mut store = LocalStore::new(backing, Notifier::new());
    if let Some(settings) = settings {
        let remote = FirestoreRemote::new(&settings)?;
        tracing::debug!("Remote sync enabled for scope {}", settings.scope);
        store = store.with_remote(RemoteLink::new(Arc::new(remote), settings.scope));
    }

    Ok(Arc::new(store))
}

/// Restore local state. With sync configured, pending writes are retried too.
pub async fn restore_store(store: &Arc<LocalStore>) -> Result<(), CliError> {
    if store.remote().is_none() {
        store.load().await?;
        return Ok(());
    }

    let report = SyncSession::new(Arc::clone(store))?.start().await?;
    if !report.remaining.is_empty() {
        tracing::debug!("{} write(s) still pending after startup", report.remaining.len());
    }
    Ok(())
}

/// Find one id matching an exact id or a unique prefix.
pub fn match_item_id(
    query: &str,
    ids: impl IntoIterator<Item = ClothingId>,
) -> Result<ClothingId, CliError> {
    let query = normalize_item_identifier(query)?;
    let ids: Vec<ClothingId> = ids.into_iter().collect();

    if let Ok(exact) = query.parse::<ClothingId>() {
        if ids.contains(&exact) {
            return Ok(exact);
        }
    }

    let needle = query.to_ascii_lowercase();
    let matching: Vec<ClothingId> = ids
        .into_iter()
        .filter(|id| id.to_string().starts_with(&needle))
        .collect();

    match matching.as_slice() {
        [] => Err(CliError::ItemNotFound(query)),
        [only] => Ok(*only),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(short_id)
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousItemId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn resolve_item(query: &str, store: &LocalStore) -> Result<ClothingItem, CliError> {
    let id = match_item_id(query, store.snapshot().into_keys())?;
    store
        .get(id)
        .ok_or_else(|| CliError::ItemNotFound(query.to_string()))
}

pub fn normalize_item_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyItemId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_name(parts: &[String]) -> Result<String, CliError> {
    let joined = parts.join(" ");
    let collapsed = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        Err(CliError::EmptyName)
    } else {
        Ok(collapsed)
    }
}

/// Overwrite the fields that were given on the command line.
pub fn apply_fields(item: &mut ClothingItem, fields: &ItemFields) -> Result<(), CliError> {
    let text = |value: &Option<String>| value.as_ref().map(|value| value.trim().to_string());

    if let Some(description) = text(&fields.description) {
        item.description = description;
    }
    if let Some(brand) = text(&fields.brand) {
        item.brand = brand;
    }
    if let Some(color) = text(&fields.color) {
        item.color = color;
    }
    if let Some(material) = text(&fields.material) {
        item.material = material;
    }
    if let Some(sub_category) = text(&fields.sub_category) {
        item.sub_category = sub_category;
    }
    if let Some(gender) = fields.gender {
        item.gender = gender;
    }
    if let Some(category) = fields.category {
        item.category = category;
    }
    if let Some(condition) = fields.condition {
        item.condition = condition;
    }
    if let Some(size) = fields.size {
        item.size = size;
    }
    if let Some(cost) = fields.cost {
        item.cost_price = non_negative("cost", cost)?;
    }
    if let Some(price) = fields.price {
        item.selling_price = non_negative("price", price)?;
    }
    if let Some(quantity) = fields.quantity {
        item.quantity = non_negative("quantity", quantity)?;
    }
    if !fields.seasons.is_empty() {
        item.season = seasons_from_args(&fields.seasons);
    }
    if !fields.occasions.is_empty() {
        item.occasion = occasions_from_args(&fields.occasions);
    }
    if let Some(url) = text(&fields.image_url) {
        item.image_url = if url.is_empty() {
            None
        } else if rack_core::util::is_http_url(&url) {
            Some(url)
        } else {
            return Err(CliError::InvalidValue(format!(
                "image URL must start with http:// or https://: {url}"
            )));
        };
    }
    Ok(())
}

fn non_negative(field: &str, value: i64) -> Result<i64, CliError> {
    if value < 0 {
        Err(CliError::InvalidValue(format!("{field} cannot be negative")))
    } else {
        Ok(value)
    }
}

pub fn seasons_from_args(args: &[SeasonArg]) -> Seasons {
    Seasons {
        spring: args.contains(&SeasonArg::Spring),
        summer: args.contains(&SeasonArg::Summer),
        fall: args.contains(&SeasonArg::Fall),
        winter: args.contains(&SeasonArg::Winter),
    }
}

pub fn occasions_from_args(args: &[OccasionArg]) -> Occasions {
    Occasions {
        formal: args.contains(&OccasionArg::Formal),
        casual: args.contains(&OccasionArg::Casual),
        active_wear: args.contains(&OccasionArg::Active),
    }
}

/// Save a user edit, pushing it unless `local_only` is set.
pub async fn save_edit(
    item: ClothingItem,
    local_only: bool,
    store: &LocalStore,
) -> Result<WriteOutcome, CliError> {
    let outcome = if local_only {
        store.commit_local_edit(item).await?
    } else {
        store.add_item(item, true).await?
    };
    Ok(outcome)
}

pub fn describe_outcome(outcome: &WriteOutcome) -> String {
    match outcome {
        WriteOutcome::LocalOnly => "saved locally".to_string(),
        WriteOutcome::Synced => "synced".to_string(),
        WriteOutcome::Queued => "queued for upload".to_string(),
        WriteOutcome::Rejected(message) => format!("saved locally, remote rejected: {message}"),
    }
}

pub fn short_id(id: &ClothingId) -> String {
    id.to_string().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_item_lines(items: &[ClothingItem]) -> Vec<String> {
    let now = Utc::now();
    items
        .iter()
        .map(|item| {
            let name = truncate(&item.name, 32);
            format!(
                "{:<13}  {name:<32}  {:<10}  {:<3} x{:<3}  {}",
                short_id(&item.id),
                item.category.as_str(),
                item.size.as_str(),
                item.quantity,
                format_relative_time(item.edited_at, now)
            )
        })
        .collect()
}

pub fn item_to_list_item(item: &ClothingItem) -> ItemListItem {
    ItemListItem {
        id: item.id.to_string(),
        name: item.name.clone(),
        brand: item.brand.clone(),
        category: item.category.to_string(),
        size: item.size.to_string(),
        quantity: item.quantity,
        selling_price: item.selling_price,
        edited_at: format_timestamp(item.edited_at),
        relative_time: format_relative_time(item.edited_at, Utc::now()),
    }
}

pub fn format_item_details(item: &ClothingItem) -> Vec<String> {
    let flags = |pairs: &[(&str, bool)]| {
        let names: Vec<&str> = pairs
            .iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| *name)
            .collect();
        if names.is_empty() {
            "-".to_string()
        } else {
            names.join(", ")
        }
    };
    let season = &item.season;
    let occasion = &item.occasion;

    vec![
        format!("id:          {}", item.id),
        format!("name:        {}", item.name),
        format!("brand:       {}", or_dash(&item.brand)),
        format!("description: {}", or_dash(&item.description)),
        format!(
            "category:    {} / {}",
            item.category,
            or_dash(&item.sub_category)
        ),
        format!("gender:      {}", item.gender),
        format!("size:        {}", item.size),
        format!("color:       {}", or_dash(&item.color)),
        format!("material:    {}", or_dash(&item.material)),
        format!("condition:   {}", item.condition),
        format!(
            "seasons:     {}",
            flags(&[
                ("spring", season.spring),
                ("summer", season.summer),
                ("fall", season.fall),
                ("winter", season.winter),
            ])
        ),
        format!(
            "occasions:   {}",
            flags(&[
                ("formal", occasion.formal),
                ("casual", occasion.casual),
                ("active wear", occasion.active_wear),
            ])
        ),
        format!(
            "price:       {} (cost {})",
            item.selling_price, item.cost_price
        ),
        format!("quantity:    {}", item.quantity),
        format!("bought:      {}", format_timestamp(item.date_bought)),
        format!("edited:      {}", format_timestamp(item.edited_at)),
        format!(
            "image:       {}",
            item.image_url.as_deref().unwrap_or("-")
        ),
    ]
}

pub fn conflict_to_item(conflict: &Conflict) -> ConflictItem {
    let name = conflict
        .client_copy()
        .or_else(|| conflict.server_copy())
        .map(|item| item.name.clone())
        .unwrap_or_default();
    ConflictItem {
        id: conflict.id().to_string(),
        reason: conflict.reason().to_string(),
        name,
        local_edited_at: conflict
            .client_copy()
            .map(|item| format_timestamp(item.edited_at)),
        remote_edited_at: conflict
            .server_copy()
            .map(|item| format_timestamp(item.edited_at)),
    }
}

pub fn format_conflict_lines<'a>(conflicts: impl IntoIterator<Item = &'a Conflict>) -> Vec<String> {
    conflicts
        .into_iter()
        .map(|conflict| {
            let item = conflict_to_item(conflict);
            format!(
                "{:<13}  {:<17}  {:<32}  local={} remote={}",
                short_id(&conflict.id()),
                item.reason,
                truncate(&item.name, 32),
                item.local_edited_at.as_deref().unwrap_or("-"),
                item.remote_edited_at.as_deref().unwrap_or("-"),
            )
        })
        .collect()
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - timestamp).num_milliseconds().max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let mut truncated = value
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("RACK_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("rack").join("rack.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve data directory".to_string()))
}
