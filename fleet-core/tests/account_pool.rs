#[path = "support/mod.rs"]
mod support;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use fleet_core::accounts::{AccountPool, min_level};
use fleet_core::database::InMemoryStore;
use parking_lot::Mutex;
use support::{account, at};

async fn pool(accounts: Vec<fleet_core::accounts::Account>) -> anyhow::Result<(Arc<AccountPool>, Arc<InMemoryStore>)> {
    let store = Arc::new(InMemoryStore::new());
    store.seed_accounts(accounts);
    let pool = Arc::new(AccountPool::new(store.clone()));
    pool.reload().await?;
    Ok((pool, store))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_allocations_never_share_an_account() -> anyhow::Result<()> {
    let now = at(0);
    let accounts = (0..5)
        .map(|i| account(&format!("acct-{i}"), 30, Some(now - Duration::days(2 + i))))
        .collect();
    let (pool, _) = pool(accounts).await?;
    let held: Arc<Mutex<HashSet<String>>> = Arc::default();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        let held = Arc::clone(&held);
        tasks.push(tokio::spawn(async move {
            for round in 0..50 {
                let Some(credentials) = pool.allocate(|_| true, now).await else {
                    tokio::task::yield_now().await;
                    continue;
                };
                assert!(
                    held.lock().insert(credentials.username.clone()),
                    "{} handed out twice",
                    credentials.username
                );
                if round % 3 == 0 {
                    tokio::task::yield_now().await;
                }
                held.lock().remove(&credentials.username);
                pool.release(&credentials.username, now).await;
            }
        }));
    }

    for task in tasks {
        task.await?;
    }
    assert!(held.lock().is_empty());
    assert_eq!(pool.stats(now).in_use, 0);
    Ok(())
}

#[tokio::test]
async fn allocation_only_returns_eligible_accounts() -> anyhow::Result<()> {
    let now = at(0);
    let old = Some(now - Duration::days(10));

    let mut suspended = account("suspended", 30, old);
    suspended.suspended = true;
    let mut banned = account("banned", 30, old);
    banned.banned = true;
    let mut warned = account("warned", 30, old);
    warned.warn = true;
    warned.warn_expiration = Some(now + Duration::hours(1));
    let mut warn_over = account("warn-over", 30, Some(now - Duration::days(4)));
    warn_over.warn = true;
    warn_over.warn_expiration = Some(now - Duration::hours(1));
    let mut disabled = account("disabled", 30, old);
    disabled.last_disabled = Some(now - Duration::hours(2));
    let mut cooled = account("cooled", 30, Some(now - Duration::days(3)));
    cooled.last_disabled = Some(now - Duration::hours(25));
    let low = account("low", 12, old);
    let fine = account("fine", 34, Some(now - Duration::days(2)));

    let (pool, _) = pool(vec![suspended, banned, warned, warn_over, disabled, cooled, low, fine]).await?;

    let mut handed_out = Vec::new();
    while let Some(credentials) = pool.allocate(min_level(30), now).await {
        handed_out.push(credentials.username);
    }
    assert_eq!(handed_out, vec!["warn-over", "cooled", "fine"]);
    Ok(())
}

#[tokio::test]
async fn least_recently_released_wins_and_unreleased_is_skipped() -> anyhow::Result<()> {
    let (pool, _) = pool(vec![
        account("a", 30, Some(at(100))),
        account("b", 30, Some(at(50))),
        account("c", 30, None),
    ])
    .await?;

    let now = at(200_000);
    let first = pool.allocate(|_| true, now).await.expect("an account");
    assert_eq!(first.username, "b");
    let second = pool.allocate(|_| true, now).await.expect("an account");
    assert_eq!(second.username, "a");
    // never released, never selectable
    assert!(pool.allocate(|_| true, now).await.is_none());
    assert!(!pool.is_in_use("c"));
    Ok(())
}

#[tokio::test]
async fn release_round_trip_updates_timestamps() -> anyhow::Result<()> {
    let (pool, store) = pool(vec![account("solo", 31, Some(at(0)))]).await?;

    let selected_at = at(100_000);
    let first = pool.allocate(min_level(30), selected_at).await.expect("an account");
    assert_eq!(first.username, "solo");
    assert!(pool.allocate(min_level(30), selected_at).await.is_none());

    let released_at = at(100_500);
    pool.release("solo", released_at).await;
    assert_eq!(store.account("solo").and_then(|a| a.last_released), Some(released_at));

    let again_at = at(101_000);
    let again = pool.allocate(min_level(30), again_at).await.expect("an account");
    assert_eq!(again.username, "solo");

    let record = &pool.snapshot()[0];
    assert!(record.in_use);
    assert_eq!(record.account.last_selected, Some(again_at));
    assert_eq!(record.account.last_released, None);
    Ok(())
}

#[tokio::test]
async fn store_failures_do_not_roll_back_memory() -> anyhow::Result<()> {
    let (pool, store) = pool(vec![account("solo", 30, Some(at(0)))]).await?;
    store.fail_writes(true);

    let now = at(200_000);
    assert!(pool.allocate(|_| true, now).await.is_some());
    assert!(pool.is_in_use("solo"));
    assert!(pool.mark_banned("solo", now).await);
    assert!(!pool.is_valid("solo", now)?);
    // store never saw either write
    let persisted = store.account("solo").expect("seeded");
    assert!(!persisted.banned);
    assert_eq!(persisted.last_selected, None);
    Ok(())
}

#[tokio::test]
async fn import_inserts_new_accounts_and_reloads() -> anyhow::Result<()> {
    let (pool, _) = pool(vec![account("existing", 30, Some(at(0)))]).await?;
    let rows = vec![
        fleet_core::accounts::NewAccount {
            username: "existing".into(),
            password: "x".into(),
            level: 30,
        },
        fleet_core::accounts::NewAccount {
            username: "fresh".into(),
            password: "y".into(),
            level: 0,
        },
    ];

    assert_eq!(pool.import(&rows).await?, 1);
    assert_eq!(pool.len(), 2);
    assert!(pool.exists("fresh"));
    Ok(())
}
