//! Integration tests for the read side: wallet, providers and per-account data.

mod common;

use std::time::Duration;

use common::{eventually, position, provider_id, Harness};
use perpdeck_api::{endpoint, ApiError};
use perpdeck_atoms::tags;
use perpdeck_graph::{NodeError, NodeHandle, ReactivityTag};
use perpdeck_wallet::WalletStatus;

#[tokio::test]
async fn test_wallet_connection_drives_account() {
    let h = Harness::new(Some("hl"));
    let atoms = h.runtime.atoms().clone();

    h.wallet.connecting();
    h.connect_and_wait().await;
    let account = h.graph().get(&atoms.account).await.unwrap();
    assert_eq!(account, Some(h.account("hl")));

    h.wallet.disconnect();
    eventually(h.graph(), &atoms.wallet_status, |s| *s == WalletStatus::Disconnected).await;
    assert_eq!(h.graph().get(&atoms.account).await.unwrap(), None);
}

#[tokio::test]
async fn test_selected_provider_resolved_from_list() {
    let h = Harness::new(None);
    let atoms = h.runtime.atoms();

    assert_eq!(h.graph().get(&atoms.provider).await.unwrap(), None);

    h.runtime.select_provider(Some(provider_id("gmx")));
    let selected = h.graph().get(&atoms.provider).await.unwrap();
    assert_eq!(selected.map(|p| p.name), Some("GMX".to_string()));

    h.runtime.select_provider(Some(provider_id("unlisted")));
    assert_eq!(h.graph().get(&atoms.provider).await.unwrap(), None);
    assert_eq!(h.api.call_count(endpoint::PROVIDERS), 1);
}

#[tokio::test]
async fn test_account_family_identity() {
    let h = Harness::new(None);
    let positions = &h.runtime.atoms().positions;

    let a = positions.get(&h.account("hl"));
    let b = positions.get(&h.account("hl"));
    let other = positions.get(&h.account("gmx"));

    assert_eq!(a, b);
    assert_ne!(a.node_id(), other.node_id());
    assert_eq!(positions.len(), 2);
}

#[tokio::test]
async fn test_current_positions_follow_selection() {
    let h = Harness::new(Some("hl"));
    h.api.set_positions(h.account("hl"), vec![position("p-hl", "hl")]);
    h.api.set_positions(h.account("gmx"), vec![position("p-gmx", "gmx")]);
    h.connect_and_wait().await;

    let atoms = h.runtime.atoms();
    let current = h.graph().get(&atoms.current_positions).await.unwrap();
    assert_eq!(current[0].id.as_str(), "p-hl");

    h.runtime.select_provider(Some(provider_id("gmx")));
    let current = h.graph().get(&atoms.current_positions).await.unwrap();
    assert_eq!(current[0].id.as_str(), "p-gmx");
}

#[tokio::test]
async fn test_no_account_means_empty_portfolio() {
    let h = Harness::new(Some("hl"));
    h.wallet.disconnect();

    let atoms = h.runtime.atoms();
    assert!(h.graph().get(&atoms.current_positions).await.unwrap().is_empty());
    assert!(h.graph().get(&atoms.current_orders).await.unwrap().is_empty());
    assert_eq!(h.graph().get(&atoms.current_balances).await.unwrap(), None);
    assert_eq!(h.api.call_count(endpoint::POSITIONS), 0);
}

#[tokio::test]
async fn test_tag_invalidation_refetches_only_tagged() {
    let h = Harness::new(Some("hl"));
    h.connect_and_wait().await;
    let atoms = h.runtime.atoms();

    h.graph().get(&atoms.current_positions).await.unwrap();
    h.graph().get(&atoms.current_orders).await.unwrap();
    assert_eq!(h.api.call_count(endpoint::POSITIONS), 1);
    assert_eq!(h.api.call_count(endpoint::PROVIDERS), 0);

    let refreshed = h.graph().invalidate_tag(&ReactivityTag::from(tags::POSITIONS));
    assert_eq!(refreshed, 1);

    h.graph().get(&atoms.current_positions).await.unwrap();
    h.graph().get(&atoms.current_orders).await.unwrap();
    assert_eq!(h.api.call_count(endpoint::POSITIONS), 2);
    assert_eq!(h.api.call_count(endpoint::ORDERS), 1);
}

#[tokio::test]
async fn test_duplicate_wallet_state_does_not_refetch() {
    let h = Harness::new(Some("hl"));
    h.connect_and_wait().await;
    let atoms = h.runtime.atoms();
    let _sub = h.graph().subscribe(&atoms.current_positions);

    eventually(h.graph(), &atoms.current_positions, |_| true).await;
    assert_eq!(h.api.call_count(endpoint::POSITIONS), 1);

    h.connect();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.api.call_count(endpoint::POSITIONS), 1);
}

#[tokio::test]
async fn test_api_failure_cached_then_recovers() {
    let h = Harness::new(Some("hl"));
    h.connect_and_wait().await;
    let atoms = h.runtime.atoms();
    h.api.fail(endpoint::POSITIONS, ApiError::from_status(503, "maintenance".into()));

    let err = h.graph().get(&atoms.current_positions).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Status { status: 503, .. })));

    // Cached until something invalidates it.
    h.graph().get(&atoms.current_positions).await.unwrap_err();
    assert_eq!(h.api.call_count(endpoint::POSITIONS), 1);

    h.api.clear_failure(endpoint::POSITIONS);
    h.graph().invalidate_tag(&ReactivityTag::from(tags::POSITIONS));
    assert!(h.graph().get(&atoms.current_positions).await.is_ok());
}

#[tokio::test]
async fn test_idle_family_entries_evicted() {
    let h = Harness::new(Some("hl"));
    h.connect_and_wait().await;
    let atoms = h.runtime.atoms();
    let key = h.account("hl");

    let first = atoms.positions.get(&key);
    h.graph().get(&first).await.unwrap();
    assert_eq!(atoms.positions.evict_idle(), 1);
    assert!(!atoms.positions.contains(&key));

    let second = atoms.positions.get(&key);
    assert_ne!(first.node_id(), second.node_id());
    h.graph().get(&second).await.unwrap();
    assert_eq!(h.api.call_count(endpoint::POSITIONS), 2);

    // Providers are keep-alive and survive a sweep.
    h.graph().get(&atoms.providers).await.unwrap();
    h.graph().collect();
    assert!(h.graph().is_cached(atoms.providers.node_id()));
}

#[tokio::test]
async fn test_evicted_member_does_not_leave_view_stale() {
    let h = Harness::new(Some("hl"));
    let key = h.account("hl");
    h.api.set_positions(key.clone(), vec![position("p-old", "hl")]);
    h.connect_and_wait().await;
    let atoms = h.runtime.atoms();

    let before = h.graph().get(&atoms.current_positions).await.unwrap();
    assert_eq!(before[0].id.as_str(), "p-old");

    assert_eq!(atoms.positions.evict_idle(), 1);
    assert!(!h.graph().is_cached(atoms.current_positions.node_id()));

    h.api.set_positions(key.clone(), vec![position("p-new", "hl")]);
    let after = h.graph().get(&atoms.current_positions).await.unwrap();
    assert_eq!(after[0].id.as_str(), "p-new");

    // The view now depends on the rebuilt member, so the tag reaches it.
    h.api.set_positions(key, vec![position("p-newer", "hl")]);
    assert_eq!(h.graph().invalidate_tag(&ReactivityTag::from(tags::POSITIONS)), 1);
    let latest = h.graph().get(&atoms.current_positions).await.unwrap();
    assert_eq!(latest[0].id.as_str(), "p-newer");
}

#[tokio::test]
async fn test_shutdown_stops_runtime() {
    let h = Harness::new(Some("hl"));
    h.connect_and_wait().await;

    h.runtime.shutdown();
    assert!(h.runtime.is_shutdown());
    assert!(h.runtime.bridge().is_shutdown());
    assert!(matches!(
        h.graph().get(&h.runtime.atoms().providers).await,
        Err(NodeError::Shutdown)
    ));
}
