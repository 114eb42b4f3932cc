mod support;

use axum::http::StatusCode;
use serde_json::{Value, json};
use support::{controller, open_config, seeded_store, spawn_app};

#[tokio::test]
async fn worker_walks_init_account_and_job() {
    let app = spawn_app(open_config(), seeded_store()).await;

    let init = controller(&app, "init", "dev-1", "").await;
    assert_eq!(init["status"], "ok");
    assert_eq!(init["data"]["assigned"], true);
    assert_eq!(init["data"]["provider"], "fleet-controller");

    let account = controller(&app, "get_account", "dev-1", "").await;
    assert_eq!(account["status"], "ok");
    let username = account["data"]["username"].as_str().unwrap().to_string();
    assert!(username == "alpha" || username == "bravo");
    assert_eq!(account["data"]["password"], format!("{username}-pw"));

    let job = controller(&app, "get_job", "dev-1", &username).await;
    assert_eq!(job["status"], "ok");
    assert_eq!(job["data"]["action"], "scan_pokemon");
    assert_eq!(job["data"]["min_level"], 30);
    assert_eq!(job["data"]["max_level"], 40);
    assert!(job["data"]["lat"].as_f64().unwrap() > 47.0);

    let heartbeat = controller(&app, "heartbeat", "dev-1", "").await;
    assert_eq!(heartbeat, json!({ "status": "ok" }));
}

#[tokio::test]
async fn banned_account_gets_a_switch_request() {
    let app = spawn_app(open_config(), seeded_store()).await;
    controller(&app, "init", "dev-1", "").await;
    let account = controller(&app, "get_account", "dev-1", "").await;
    let username = account["data"]["username"].as_str().unwrap().to_string();

    let banned = controller(&app, "account_banned", "dev-1", &username).await;
    assert_eq!(banned, json!({ "status": "ok" }));

    let job = controller(&app, "get_job", "dev-1", &username).await;
    assert_eq!(job["data"]["action"], "switch_account");
    assert_eq!(job["data"]["min_level"], 30);
}

#[tokio::test]
async fn protocol_misses_use_error_codes() {
    let app = spawn_app(open_config(), seeded_store()).await;

    let unknown = controller(&app, "account_suspended", "dev-1", "nobody").await;
    assert_eq!(unknown, json!({ "status": "error", "error": "accountNotFound" }));

    let no_area = controller(&app, "get_account", "dev-9", "").await;
    assert_eq!(no_area, json!({ "status": "error", "error": "instanceNotFound" }));

    let ghost = controller(&app, "logged_out", "ghost", "").await;
    assert_eq!(ghost, json!({ "status": "error", "error": "deviceNotFound" }));
}

#[tokio::test]
async fn pool_exhaustion_reports_no_account_left() {
    let app = spawn_app(open_config(), seeded_store()).await;
    for device in ["dev-1", "dev-2"] {
        controller(&app, "init", device, "").await;
        let account = controller(&app, "get_account", device, "").await;
        assert_eq!(account["status"], "ok");
    }

    // both credentials are held
    let third = controller(&app, "get_account", "dev-1", "").await;
    assert_eq!(third, json!({ "status": "error", "error": "noAccountLeft" }));
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let app = spawn_app(open_config(), seeded_store()).await;

    let unknown_type = app
        .server
        .post("/controler")
        .json(&json!({ "type": "dance", "uuid": "dev-1" }))
        .await;
    unknown_type.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(unknown_type.json::<Value>(), json!({ "status": "error" }));

    let missing_uuid = app
        .server
        .post("/controler")
        .json(&json!({ "type": "init" }))
        .await;
    missing_uuid.assert_status(StatusCode::BAD_REQUEST);
    assert!(missing_uuid.json::<Value>()["error"].is_string());

    let missing_username = app
        .server
        .post("/controler")
        .json(&json!({ "type": "account_banned", "uuid": "dev-1" }))
        .await;
    missing_username.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_releases_the_credential() {
    let app = spawn_app(open_config(), seeded_store()).await;
    controller(&app, "init", "dev-1", "").await;
    let account = controller(&app, "get_account", "dev-1", "").await;
    let username = account["data"]["username"].as_str().unwrap().to_string();
    assert!(app.fleet.accounts().is_in_use(&username));

    let logout = controller(&app, "logged_out", "dev-1", "").await;
    assert_eq!(logout, json!({ "status": "ok" }));
    assert!(!app.fleet.accounts().is_in_use(&username));
    assert!(app.fleet.sessions().get("dev-1").is_none());
}

#[tokio::test]
async fn controller_alias_route_is_served() {
    let app = spawn_app(open_config(), seeded_store()).await;
    let response = app
        .server
        .post("/controller")
        .json(&json!({ "type": "heartbeat", "uuid": "dev-1" }))
        .await;
    response.assert_status_ok();
}
