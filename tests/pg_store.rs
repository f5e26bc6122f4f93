//! PostgreSQL store semantics. These need a database: run with `DATABASE_URL` set and
//! `cargo test -- --ignored`.

mod helpers;

use helpers::{make_client, make_onu};
use oltsync::data::models::{MacUpdate, OnuKey, PortOccupancy};
use oltsync::data::{PgStore, SyncStore};
use sqlx::PgPool;

fn key(pon_path: &str, position: u8) -> OnuKey {
    OnuKey {
        pon_path: pon_path.to_string(),
        position,
    }
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_port_occupancy_replaces_whole_table(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let row = |port, connected_users| PortOccupancy {
        slot: 1,
        port,
        connected_users,
    };

    store
        .replace_port_occupancy(&[row(1, 10), row(2, 20)])
        .await
        .unwrap();
    let written = store.replace_port_occupancy(&[row(3, 5)]).await.unwrap();

    assert_eq!(written, 1);
    let ports: Vec<(i16, i32)> =
        sqlx::query_as("SELECT port, connected_users FROM port_occupancy ORDER BY port")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(ports, vec![(3, 5)]);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_port_onus_leave_other_ports_alone(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    store
        .replace_port_onus("1/1/1/1", &[make_onu("1/1/1/1", 1, "ALCL:00000001", "A")])
        .await
        .unwrap();
    store
        .replace_port_onus("1/1/1/2", &[make_onu("1/1/1/2", 1, "ALCL:00000002", "B")])
        .await
        .unwrap();
    store.replace_port_onus("1/1/1/1", &[]).await.unwrap();

    let identities = store.onu_identities().await.unwrap();
    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].key, key("1/1/1/2", 1));
    assert_eq!(identities[0].serial, "ALCL:00000002");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_mac_updates_and_fiber_flags(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    store
        .replace_port_onus(
            "1/1/1/1",
            &[
                make_onu("1/1/1/1", 1, "ALCL:00000001", "MARIA"),
                make_onu("1/1/1/1", 2, "ALCL:00000002", "JOSE"),
            ],
        )
        .await
        .unwrap();

    let updated = store
        .update_onu_macs(&[
            MacUpdate {
                key: key("1/1/1/1", 1),
                mac: "00:1a:2b:3c:4d:5e".into(),
            },
            MacUpdate {
                key: key("1/1/1/9", 1),
                mac: "00:1a:2b:3c:4d:99".into(),
            },
        ])
        .await
        .unwrap();
    assert_eq!(updated, 1);

    store
        .upsert_fiber_clients(&[make_client("ALCL:00000001", "MARIA")])
        .await
        .unwrap();
    assert_eq!(
        store.fiber_client_keys().await.unwrap(),
        vec![("ALCL:00000001".to_string(), "MARIA".to_string())]
    );

    let counts = store.apply_fiber_flags(&[key("1/1/1/1", 1)]).await.unwrap();
    assert_eq!((counts.matched, counts.cleared), (1, 1));

    let flags: Vec<(i16, Option<String>, bool)> =
        sqlx::query_as("SELECT position, mac, is_fiber_client FROM onus ORDER BY position")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(
        flags,
        vec![
            (1, Some("00:1a:2b:3c:4d:5e".to_string()), true),
            (2, None, false),
        ]
    );
}
