use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde_json::{Value, json};

use crate::infra::app_state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let fleet = state.fleet();
    let mut health = json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "fleet": {
                "areas": fleet.areas().len(),
                "sessions": fleet.sessions().len(),
                "accounts": fleet.accounts().len(),
            }
        }
    });

    if let Some(database) = &state.database {
        let stats = database.pool_stats();
        let status = match sqlx::query("SELECT 1").execute(database.pool()).await {
            Ok(_) => "healthy",
            Err(_) => "unhealthy",
        };
        health["checks"]["database"] = json!({
            "status": status,
            "pool_size": stats.size,
            "idle": stats.idle,
            "max_size": stats.max_size,
        });
        if status != "healthy" {
            health["status"] = json!("unhealthy");
            return (StatusCode::SERVICE_UNAVAILABLE, Json(health));
        }
    }

    (StatusCode::OK, Json(health))
}
