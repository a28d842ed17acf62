use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rack_core::db::LibSqlKeyValueStore;
use rack_core::models::{Category, Size};
use rack_core::{
    ClothingId, ClothingItem, LocalStore, MemoryRemote, Notifier, RemoteAdapter, RemoteLink,
    Resolution, SyncScope,
};

use crate::cli::{CompletionShell, ItemFields, OccasionArg, ResolutionArg, SeasonArg};
use crate::commands::add::run_add;
use crate::commands::common::{
    apply_fields, format_relative_time, match_item_id, normalize_item_identifier, normalize_name,
    resolve_item, restore_store, seasons_from_args,
};
use crate::commands::completions::run_completions;
use crate::commands::duplicate::run_duplicate;
use crate::commands::edit::run_edit;
use crate::commands::remove::run_remove;
use crate::commands::sync::{run_pending, run_resolve, run_sync, session_for};
use crate::error::CliError;

async fn local_store() -> Arc<LocalStore> {
    let backing = Arc::new(LibSqlKeyValueStore::open_in_memory().await.unwrap());
    Arc::new(LocalStore::new(backing, Notifier::new()))
}

async fn linked_store() -> (Arc<LocalStore>, Arc<MemoryRemote>, SyncScope) {
    let scope = SyncScope::new("cli-tests").unwrap();
    let remote = Arc::new(MemoryRemote::new());
    let backing = Arc::new(LibSqlKeyValueStore::open_in_memory().await.unwrap());
    let store = LocalStore::new(backing, Notifier::new())
        .with_remote(RemoteLink::new(remote.clone(), scope.clone()));
    (Arc::new(store), remote, scope)
}

fn id(value: &str) -> ClothingId {
    value.parse().unwrap()
}

#[test]
fn normalize_name_collapses_whitespace() {
    assert_eq!(
        normalize_name(&["  Blue ".to_string(), "jeans\t".to_string()]).unwrap(),
        "Blue jeans"
    );
    assert!(matches!(
        normalize_name(&[" ".to_string()]),
        Err(CliError::EmptyName)
    ));
}

#[test]
fn normalize_item_identifier_rejects_blank() {
    assert!(matches!(
        normalize_item_identifier("   "),
        Err(CliError::EmptyItemId)
    ));
}

#[test]
fn match_item_id_accepts_exact_and_unique_prefix() {
    let first = id("01900000-0000-7000-8000-000000000001");
    let second = id("01911111-0000-7000-8000-000000000002");

    assert_eq!(
        match_item_id(&first.to_string(), [first, second]).unwrap(),
        first
    );
    assert_eq!(match_item_id("01911", [first, second]).unwrap(), second);
    assert!(matches!(
        match_item_id("ffff", [first, second]),
        Err(CliError::ItemNotFound(_))
    ));
}

#[test]
fn match_item_id_reports_ambiguous_prefix() {
    let first = id("01900000-0000-7000-8000-000000000001");
    let second = id("01900000-0000-7000-8000-000000000002");

    let error = match_item_id("0190", [first, second]).unwrap_err();
    match error {
        CliError::AmbiguousItemId(message) => assert!(message.contains("ambiguous")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn apply_fields_sets_only_given_values() {
    let mut item = ClothingItem::new("Parka");
    item.brand = "Keep".to_string();
    let fields = ItemFields {
        category: Some(Category::OuterWear),
        size: Some(Size::Large),
        price: Some(120),
        seasons: vec![SeasonArg::Fall, SeasonArg::Winter],
        occasions: vec![OccasionArg::Casual],
        ..ItemFields::default()
    };

    apply_fields(&mut item, &fields).unwrap();

    assert_eq!(item.brand, "Keep");
    assert_eq!(item.category, Category::OuterWear);
    assert_eq!(item.size, Size::Large);
    assert_eq!(item.selling_price, 120);
    assert!(item.season.winter && !item.season.summer);
    assert!(item.occasion.casual && !item.occasion.formal);
}

#[test]
fn apply_fields_rejects_bad_values() {
    let mut item = ClothingItem::new("Parka");

    let negative = ItemFields {
        quantity: Some(-1),
        ..ItemFields::default()
    };
    assert!(matches!(
        apply_fields(&mut item, &negative),
        Err(CliError::InvalidValue(_))
    ));

    let bad_url = ItemFields {
        image_url: Some("ftp://example.com/a.png".to_string()),
        ..ItemFields::default()
    };
    assert!(apply_fields(&mut item, &bad_url).is_err());
}

#[test]
fn empty_image_url_clears_the_link() {
    let mut item = ClothingItem::new("Parka");
    item.image_url = Some("https://img.example/parka.png".to_string());
    let fields = ItemFields {
        image_url: Some(String::new()),
        ..ItemFields::default()
    };

    apply_fields(&mut item, &fields).unwrap();

    assert_eq!(item.image_url, None);
}

#[test]
fn seasons_from_args_ignores_duplicates() {
    let seasons = seasons_from_args(&[SeasonArg::Spring, SeasonArg::Spring]);
    assert!(seasons.spring);
    assert!(!seasons.fall);
}

#[test]
fn resolution_arg_maps_to_core_resolution() {
    assert_eq!(
        Resolution::from(ResolutionArg::DeleteRemote),
        Resolution::DeleteFromServer
    );
    assert_eq!(Resolution::from(ResolutionArg::KeepLocal), Resolution::KeepLocal);
}

#[test]
fn format_relative_time_units() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    assert_eq!(format_relative_time(now - Duration::seconds(30), now), "just now");
    assert_eq!(format_relative_time(now - Duration::minutes(2), now), "2m ago");
    assert_eq!(format_relative_time(now - Duration::hours(2), now), "2h ago");
    assert_eq!(format_relative_time(now + Duration::hours(1), now), "just now");
}

#[tokio::test(flavor = "multi_thread")]
async fn run_add_then_edit_by_prefix() {
    let store = local_store().await;
    let added = run_add(
        &["Wool".to_string(), "coat".to_string()],
        &ItemFields::default(),
        true,
        &store,
    )
    .await
    .unwrap();

    let prefix = added.id.to_string()[..13].to_string();
    let fields = ItemFields {
        color: Some("Camel".to_string()),
        ..ItemFields::default()
    };
    run_edit(&prefix, Some("Wool overcoat"), &fields, true, &store)
        .await
        .unwrap();

    let edited = store.get(added.id).unwrap();
    assert_eq!(edited.name, "Wool overcoat");
    assert_eq!(edited.color, "Camel");
    assert!(edited.edited_at >= added.edited_at);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_duplicate_creates_new_identity() {
    let store = local_store().await;
    let original = ClothingItem::new("Loafers");
    store.add_item(original.clone(), false).await.unwrap();

    let copy_id = run_duplicate(&original.id.to_string(), true, &store)
        .await
        .unwrap();

    assert_ne!(copy_id, original.id);
    assert_eq!(store.get(copy_id).unwrap().name, "Loafers");
    assert_eq!(store.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_remove_deletes_remote_copy() {
    let (store, remote, scope) = linked_store().await;
    let item = run_add(&["Scarf".to_string()], &ItemFields::default(), false, &store)
        .await
        .unwrap();
    assert!(remote.get(&scope, item.id).await.is_ok());

    run_remove(&item.id.to_string(), false, &store).await.unwrap();

    assert!(resolve_item(&item.id.to_string(), &store).is_err());
    assert!(remote.records(&scope).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_commands_require_configuration() {
    let store = local_store().await;

    assert!(matches!(
        session_for(&store),
        Err(CliError::SyncNotConfigured)
    ));
    assert!(matches!(
        run_pending(true, &store).await,
        Err(CliError::SyncNotConfigured)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_sync_then_resolve_keep_remote() {
    let (store, remote, scope) = linked_store().await;
    let incoming = ClothingItem::new("Borrowed blazer");
    remote.seed(&scope, incoming.clone());
    let session = session_for(&store).unwrap();

    let report = run_sync(&session, true).await.unwrap();
    assert_eq!(report.reconciled.conflicts.len(), 1);

    run_resolve(&incoming.id.to_string()[..8], Resolution::KeepRemote, &session)
        .await
        .unwrap();

    assert_eq!(store.get(incoming.id).unwrap(), incoming);
    assert!(session.reconcile().await.unwrap().conflicts.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn run_resolve_without_conflict_is_an_error() {
    let (store, _remote, _scope) = linked_store().await;
    let item = run_add(&["Tie".to_string()], &ItemFields::default(), false, &store)
        .await
        .unwrap();
    let session = session_for(&store).unwrap();

    let error = run_resolve(&item.id.to_string(), Resolution::KeepLocal, &session)
        .await
        .unwrap_err();

    assert!(matches!(error, CliError::NoConflict(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_add_is_drained_by_pending_command() {
    let (store, remote, scope) = linked_store().await;
    remote.set_online(false);
    let item = run_add(&["Mittens".to_string()], &ItemFields::default(), false, &store)
        .await
        .unwrap();
    assert_eq!(store.pending().ids().await, vec![item.id]);

    remote.set_online(true);
    run_pending(true, &store).await.unwrap();

    assert!(store.pending().is_empty().await);
    assert!(remote.records(&scope).contains_key(&item.id));
}

#[tokio::test(flavor = "multi_thread")]
async fn next_command_startup_drains_queued_write() {
    let scope = SyncScope::new("cli-restart").unwrap();
    let remote = Arc::new(MemoryRemote::new());
    let backing = Arc::new(LibSqlKeyValueStore::open_in_memory().await.unwrap());
    let first_run = LocalStore::new(backing.clone(), Notifier::new())
        .with_remote(RemoteLink::new(remote.clone(), scope.clone()));
    remote.set_online(false);
    let item = run_add(&["Raincoat".to_string()], &ItemFields::default(), false, &first_run)
        .await
        .unwrap();
    assert_eq!(first_run.pending().ids().await, vec![item.id]);

    remote.set_online(true);
    let next_run = Arc::new(
        LocalStore::new(backing, Notifier::new())
            .with_remote(RemoteLink::new(remote.clone(), scope.clone())),
    );
    restore_store(&next_run).await.unwrap();

    assert!(next_run.pending().is_empty().await);
    assert_eq!(next_run.get(item.id).unwrap().name, "Raincoat");
    assert!(remote.records(&scope).contains_key(&item.id));
}

#[tokio::test(flavor = "multi_thread")]
async fn restore_without_sync_only_loads() {
    let backing = Arc::new(LibSqlKeyValueStore::open_in_memory().await.unwrap());
    let item = ClothingItem::new("Beanie");
    LocalStore::new(backing.clone(), Notifier::new())
        .add_item(item.clone(), false)
        .await
        .unwrap();

    let store = Arc::new(LocalStore::new(backing, Notifier::new()));
    restore_store(&store).await.unwrap();

    assert_eq!(store.get(item.id).unwrap(), item);
}

#[tokio::test(flavor = "multi_thread")]
async fn local_only_edit_wins_against_older_server_copy() {
    let (store, remote, scope) = linked_store().await;
    let mut jacket = ClothingItem::new("Jacket");
    jacket.edited_at -= Duration::hours(1);
    store.add_item(jacket.clone(), false).await.unwrap();
    remote.seed(&scope, jacket.clone());

    run_edit(
        &jacket.id.to_string(),
        Some("Denim jacket"),
        &ItemFields::default(),
        true,
        &store,
    )
    .await
    .unwrap();

    assert_eq!(remote.upsert_count(), 0);
    let session = session_for(&store).unwrap();
    let conflicts = session.reconcile().await.unwrap().conflicts;
    assert_eq!(
        conflicts[&jacket.id].reason(),
        rack_core::ConflictReason::ClientHasNewer
    );
}

#[test]
fn run_completions_writes_bash_script_file() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("rack.bash");

    run_completions(CompletionShell::Bash, Some(&output_path)).unwrap();

    let script = std::fs::read_to_string(&output_path).unwrap();
    assert!(script.contains("_rack()"));
    assert!(script.contains("complete -F _rack"));
}

#[tokio::test(flavor = "multi_thread")]
async fn store_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("rack.db");
    let item = ClothingItem::new("Boots");
    {
        let backing = Arc::new(LibSqlKeyValueStore::open(&path).await.unwrap());
        let store = LocalStore::new(backing, Notifier::new());
        store.add_item(item.clone(), false).await.unwrap();
    }

    let backing = Arc::new(LibSqlKeyValueStore::open(&path).await.unwrap());
    let store = LocalStore::new(backing, Notifier::new());
    store.load().await.unwrap();

    assert_eq!(store.get(item.id).unwrap(), item);
}
