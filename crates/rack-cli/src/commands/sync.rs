use std::sync::Arc;

use rack_core::sync::SyncReport;
use rack_core::{ConflictSet, LocalStore, Resolution, SyncSession};
use serde::Serialize;

use crate::commands::common::{
    conflict_to_item, format_conflict_lines, format_timestamp, match_item_id, short_id,
    ConflictItem,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncOutput {
    pub uploaded: usize,
    pub still_pending: usize,
    pub offline: bool,
    pub conflicts: Vec<ConflictItem>,
    pub skipped: Vec<SkippedItem>,
}

#[derive(Debug, Serialize)]
pub struct SkippedItem {
    pub id: String,
    pub reason: String,
}

impl From<&SyncReport> for SyncOutput {
    fn from(report: &SyncReport) -> Self {
        Self {
            uploaded: report.drained.completed.len(),
            still_pending: report.drained.remaining.len(),
            offline: report.reconciled.offline,
            conflicts: report
                .reconciled
                .conflicts
                .values()
                .map(conflict_to_item)
                .collect(),
            skipped: report
                .reconciled
                .skipped
                .iter()
                .map(|rejected| SkippedItem {
                    id: rejected.id.clone(),
                    reason: rejected.reason.clone(),
                })
                .collect(),
        }
    }
}

pub fn session_for(store: &Arc<LocalStore>) -> Result<SyncSession, CliError> {
    if store.remote().is_none() {
        return Err(CliError::SyncNotConfigured);
    }
    Ok(SyncSession::new(Arc::clone(store))?)
}

pub async fn run_sync(session: &SyncSession, as_json: bool) -> Result<SyncReport, CliError> {
    let report = session.sync_now().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&SyncOutput::from(&report))?);
        return Ok(report);
    }

    if !report.drained.completed.is_empty() {
        println!(
            "Uploaded {} pending change(s)",
            report.drained.completed.len()
        );
    }
    if report.reconciled.offline {
        println!(
            "Remote unreachable; nothing compared. {} change(s) still pending.",
            report.drained.remaining.len()
        );
    } else if report.reconciled.conflicts.is_empty() {
        println!("Everything is in sync.");
    } else {
        for line in format_conflict_lines(report.reconciled.conflicts.values()) {
            println!("{line}");
        }
        println!("Run `rack resolve <id> keep-local|keep-remote|delete-remote` to settle each entry.");
    }
    for skipped in &report.reconciled.skipped {
        println!("Skipped unreadable remote document {}: {}", skipped.id, skipped.reason);
    }

    Ok(report)
}

pub async fn run_resolve(
    query: &str,
    resolution: Resolution,
    session: &SyncSession,
) -> Result<(), CliError> {
    let reconciled = session.reconcile().await?;
    if reconciled.offline {
        return Err(rack_core::Error::Connectivity(
            "remote unreachable, cannot compare records".to_string(),
        )
        .into());
    }

    let id = match match_item_id(query, reconciled.conflicts.keys().copied()) {
        Ok(id) => id,
        Err(CliError::ItemNotFound(query)) => return Err(CliError::NoConflict(query)),
        Err(error) => return Err(error),
    };

    let mut set = ConflictSet::from(reconciled.conflicts);
    session
        .resolver()
        .resolve_in(&mut set, id, resolution)
        .await?;
    println!("{id} resolved ({resolution})");
    Ok(())
}

pub async fn run_pending(drain: bool, store: &Arc<LocalStore>) -> Result<(), CliError> {
    if drain {
        let session = session_for(store)?;
        let report = session.drain_pending().await?;
        println!(
            "Uploaded {} change(s), {} still pending",
            report.completed.len(),
            report.remaining.len()
        );
        return Ok(());
    }

    let ids = store.pending().ids().await;
    if ids.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }
    for id in ids {
        let name = store
            .get(id)
            .map_or_else(|| "(removed locally)".to_string(), |item| item.name);
        println!("{:<13}  {name}", short_id(&id));
    }
    Ok(())
}

pub async fn run_status(store: &LocalStore) -> Result<(), CliError> {
    println!("items:        {}", store.len());
    println!("pending:      {}", store.pending().len().await);
    println!(
        "last edit:    {}",
        store
            .watermark()
            .map_or_else(|| "-".to_string(), format_timestamp)
    );

    let Some(remote) = store.remote() else {
        println!("sync:         not configured");
        return Ok(());
    };
    println!("sync id:      {}", remote.scope);

    if !remote.adapter.is_online().await {
        println!("remote:       offline");
        return Ok(());
    }
    let remote_stamp = match remote.adapter.last_updated(&remote.scope).await {
        Ok(Some(stamp)) => format_timestamp(stamp),
        Ok(None) => "never".to_string(),
        Err(error) => format!("unavailable ({error})"),
    };
    println!("remote:       online, last updated {remote_stamp}");
    Ok(())
}
