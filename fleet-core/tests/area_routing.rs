#[path = "support/mod.rs"]
mod support;

use std::sync::Arc;

use chrono::{Duration, FixedOffset};
use fleet_core::areas::{AreaId, WorkerMode};
use fleet_core::database::InMemoryStore;
use fleet_core::fleet::{FleetServices, Job};
use fleet_core::providers::FixedTimezone;
use fleet_core::FleetError;
use support::{RecordingNotifier, ScriptedRouteCalculator, account, area_record, at, fleet, route};

fn segments(fleet: &fleet_core::fleet::Fleet, area: AreaId) -> Vec<(usize, usize, usize)> {
    fleet
        .sessions()
        .list_by_area(area)
        .iter()
        .map(|session| {
            let (part, step) = session.route_part();
            (part.start, part.end, step)
        })
        .collect()
}

#[tokio::test]
async fn three_workers_split_a_ten_step_route() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    store.upsert_area(area_record(1, 3, 10));
    let fleet = fleet(&store, FleetServices::default());
    fleet.bootstrap(at(0)).await?;

    for worker in ["w1", "w2", "w3"] {
        let area = fleet.init_worker(worker, None, at(1)).await?;
        assert_eq!(area.id(), AreaId(1));
    }

    // w2 keeps its cursor (5) since it is still inside its new segment
    assert_eq!(
        segments(&fleet, AreaId(1)),
        vec![(0, 3, 0), (4, 6, 5), (7, 9, 7)]
    );
    assert!(matches!(
        fleet.init_worker("w4", None, at(1)).await,
        Err(FleetError::NoAreaNeedsWorkers)
    ));
    Ok(())
}

#[tokio::test]
async fn stale_worker_is_dropped_by_the_sweep() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    store.upsert_area(area_record(1, 3, 10));
    let fleet = fleet(&store, FleetServices::default());
    fleet.bootstrap(at(0)).await?;
    for worker in ["w1", "w2", "w3"] {
        fleet.init_worker(worker, None, at(0)).await?;
    }

    let later = at(0) + Duration::seconds(301);
    fleet.heartbeat("w1", None, later).await;
    fleet.heartbeat("w3", None, later).await;

    assert_eq!(fleet.sweep_stale_sessions(later), 1);
    assert_eq!(
        segments(&fleet, AreaId(1)),
        vec![(0, 4, 0), (0, 0, 0), (5, 9, 7)]
    );
    let stale = fleet.sessions().get("w2").expect("session kept");
    assert!(!stale.has_route_part());
    assert_eq!(stale.area_id(), Some(AreaId(1)));

    // nothing stale with a segment left
    assert_eq!(fleet.sweep_stale_sessions(later), 0);
    Ok(())
}

#[tokio::test]
async fn recalculation_without_live_workers_keeps_segments() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    store.upsert_area(area_record(1, 2, 10));
    let fleet = fleet(&store, FleetServices::default());
    fleet.bootstrap(at(0)).await?;
    fleet.init_worker("w1", None, at(0)).await?;
    fleet.init_worker("w2", None, at(0)).await?;
    let before = segments(&fleet, AreaId(1));

    let area = fleet.areas().get(AreaId(1)).expect("area");
    assert_eq!(fleet.recalculate_area(&area, at(0) + Duration::hours(1)), 0);
    assert_eq!(segments(&fleet, AreaId(1)), before);
    Ok(())
}

#[tokio::test]
async fn jobs_walk_the_segment_and_wrap() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    store.upsert_area(area_record(1, 2, 5));
    store.seed_accounts(vec![
        account("alpha", 30, Some(at(-200_000))),
        account("beta", 32, Some(at(-100_000))),
    ]);
    let fleet = fleet(&store, FleetServices::default());
    fleet.bootstrap(at(0)).await?;

    fleet.init_worker("w1", None, at(1)).await?;
    fleet.init_worker("w2", None, at(1)).await?;
    let credentials = fleet.assign_account("w2", None, at(2)).await?;
    assert_eq!(credentials.username, "alpha");

    // w2 owns steps 3..=4
    let expected = route(5);
    let mut latitudes = Vec::new();
    for _ in 0..3 {
        match fleet.next_job("w2", None, None, at(3)).await? {
            Job::ScanPokemon { lat, min_level, max_level, .. } => {
                assert_eq!((min_level, max_level), (30, 40));
                latitudes.push(lat);
            }
            other => panic!("unexpected job {other:?}"),
        }
    }
    assert_eq!(
        latitudes,
        vec![expected[3].latitude, expected[4].latitude, expected[3].latitude]
    );
    Ok(())
}

#[tokio::test]
async fn quest_hour_switches_the_area_to_a_quest_pass() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let mut record = area_record(1, 1, 4);
    record.enable_quests = true;
    record.quest_mode_hours = Some("21,22,23".into());
    store.upsert_area(record);
    store.seed_accounts(vec![account("alpha", 30, Some(at(-200_000)))]);

    let calculator = Arc::new(ScriptedRouteCalculator::returning(route(2)));
    let notifier = Arc::new(RecordingNotifier::default());
    let services = FleetServices {
        route_calculator: Some(calculator.clone()),
        quest_notifier: Some(notifier.clone()),
        timezone: Arc::new(FixedTimezone(FixedOffset::east_opt(0).expect("offset"))),
    };
    let fleet = fleet(&store, services);

    // 2024-06-01 00:00:00 UTC
    let midnight = at(0);
    fleet.bootstrap(midnight).await?;
    fleet.init_worker("w1", None, midnight).await?;
    fleet.assign_account("w1", None, midnight).await?;

    let at_hour = |hour: i64, minute: i64| midnight + Duration::hours(hour) + Duration::minutes(minute);

    assert!(matches!(
        fleet.next_job("w1", None, None, at_hour(20, 0)).await?,
        Job::ScanPokemon { .. }
    ));
    assert!(matches!(
        fleet.next_job("w1", None, None, at_hour(21, 0)).await?,
        Job::ScanQuest { quest_type: "normal", .. }
    ));
    assert_eq!(calculator.calls(), 1);
    assert_eq!(notifier.fences().len(), 1);
    assert_eq!(
        fleet.areas().get(AreaId(1)).expect("area").mode(),
        WorkerMode::Quest
    );

    // second quest step, then the pass is over
    assert!(matches!(
        fleet.next_job("w1", None, None, at_hour(21, 5)).await?,
        Job::ScanQuest { .. }
    ));
    assert!(matches!(
        fleet.next_job("w1", None, None, at_hour(21, 10)).await?,
        Job::ScanPokemon { .. }
    ));
    // later hours of the set do not fire again
    fleet.next_job("w1", None, None, at_hour(22, 0)).await?;
    fleet.next_job("w1", None, None, at_hour(23, 0)).await?;
    assert_eq!(notifier.fences().len(), 1);
    Ok(())
}

#[tokio::test]
async fn start_questing_reports_missing_route() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    store.upsert_area(area_record(1, 1, 4));
    let calculator = Arc::new(ScriptedRouteCalculator::failing());
    let fleet = fleet(
        &store,
        FleetServices {
            route_calculator: Some(calculator.clone()),
            ..FleetServices::default()
        },
    );
    fleet.bootstrap(at(0)).await?;

    assert!(!fleet.start_questing(AreaId(1)).await?);
    assert_eq!(calculator.calls(), 1);
    assert!(matches!(
        fleet.start_questing(AreaId(9)).await,
        Err(FleetError::AreaNotFound(AreaId(9)))
    ));
    Ok(())
}
