//! End-to-end exercise of the zone-resolution core through its public API.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::timeout;

use authzone::{
    TsigKey, ZoneChanged, ZoneChangedCause, ZoneManager, ZoneName,
    ZoneRecord, ZoneUpdateError,
};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn record(
    name: &str,
    serials: impl IntoIterator<Item = u64>,
    keys: Vec<TsigKey>,
) -> ZoneRecord {
    ZoneRecord::new(
        ZoneName::new(name),
        serials.into_iter().collect::<BTreeSet<_>>(),
        keys,
        Bytes::from_static(b"prepared zone data"),
    )
}

fn spawn_manager() -> (Arc<ZoneManager>, mpsc::Receiver<ZoneChanged>) {
    let (changed_tx, changed_rx) = mpsc::channel(16);
    let manager = Arc::new(ZoneManager::new(changed_tx));
    tokio::spawn({
        let manager = manager.clone();
        async move { manager.run().await }
    });
    (manager, changed_rx)
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn zones_load_resolve_and_fall_back() {
    let (manager, _changed_rx) = spawn_manager();

    manager
        .load(record("example.com", [], Vec::new()))
        .await
        .unwrap();
    manager
        .load(record("sub.example.com", [], Vec::new()))
        .await
        .unwrap();

    // Longest-matching-zone-cut semantics.
    assert_eq!(
        manager.zone_for_name("www.example.com"),
        Some(ZoneName::new("example.com"))
    );
    assert_eq!(
        manager.zone_for_name("host.sub.example.com"),
        Some(ZoneName::new("sub.example.com"))
    );
    assert_eq!(
        manager.zone_for_name("sub.example.com"),
        Some(ZoneName::new("sub.example.com"))
    );
    assert_eq!(manager.zone_for_name("example.org"), None);

    // Deleting the child exposes the parent again.
    manager
        .delete(&ZoneName::new("sub.example.com"))
        .await
        .unwrap();
    assert_eq!(
        manager.zone_for_name("host.sub.example.com"),
        Some(ZoneName::new("example.com"))
    );

    // Round trip through the catalog.
    let stored = manager.get_zone("example.com").unwrap();
    assert_eq!(stored.name(), &ZoneName::new("example.com"));
    manager.delete(&ZoneName::new("example.com")).await.unwrap();
    assert!(manager.get_zone("example.com").is_none());
    assert_eq!(
        manager.delete(&ZoneName::new("example.com")).await,
        Err(ZoneUpdateError::NotLoaded)
    );
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn serial_schedule_lifecycle() {
    let (manager, mut changed_rx) = spawn_manager();
    let now = unix_now();

    manager
        .load(record(
            "example.com",
            [now + 10, now + 20, now + 10_000_000_000],
            Vec::new(),
        ))
        .await
        .unwrap();

    assert_eq!(
        changed_rx.recv().await.unwrap().cause,
        ZoneChangedCause::Loaded
    );
    assert_eq!(
        changed_rx.recv().await.unwrap().cause,
        ZoneChangedCause::SerialElapsed
    );
    assert_eq!(
        changed_rx.recv().await.unwrap().cause,
        ZoneChangedCause::SerialElapsed
    );

    // The effectively-permanent far-future serial never arms a timer.
    assert!(timeout(Duration::from_secs(86_400), changed_rx.recv())
        .await
        .is_err());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn keys_resolve_per_zone() {
    let (manager, _changed_rx) = spawn_manager();

    let keys = vec![
        TsigKey::new("transfer", Bytes::from_static(b"s1"), "hmac-sha256"),
        TsigKey::new("update", Bytes::from_static(b"s2"), "hmac-sha512"),
    ];
    manager
        .load(record("example.com", [], keys))
        .await
        .unwrap();

    let (zone, key) = manager.get_key("update.example.com").unwrap();
    assert_eq!(zone, ZoneName::new("example.com"));
    assert_eq!(key.secret().as_ref(), b"s2");
    assert!(manager.get_key("missing.example.com").is_none());
    assert!(manager.get_key("update.example.org").is_none());
}
