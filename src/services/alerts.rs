use std::time::SystemTime;

use serde::Serialize;
use tracing::warn;

use crate::{
    dto::format_system_time,
    error::{AppError, ServiceError},
    state::SharedState,
};

#[derive(Debug, Serialize)]
struct AlertPayload {
    env: String,
    message: String,
    timestamp: String,
}

/// Fire an operational alert at the configured webhook, if any. Delivery is
/// best effort and never blocks the caller.
pub fn notify(state: &SharedState, message: impl Into<String>) {
    let Some(url) = state.config().alert_webhook_url.clone() else {
        return;
    };

    let payload = AlertPayload {
        env: state.config().env_name.clone(),
        message: message.into(),
        timestamp: format_system_time(SystemTime::now()),
    };
    let client = state.http().clone();

    tokio::spawn(async move {
        let result = client.post(&url).json(&payload).send().await;
        match result {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "alert webhook rejected payload");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to deliver alert"),
        }
    });
}

/// Map a service failure onto its HTTP error, escalating storage failures to
/// the ops webhook outside the local environment. The response body stays
/// generic either way; the backend detail goes to the logs and the alert.
pub fn escalate(state: &SharedState, err: ServiceError) -> AppError {
    if let ServiceError::Unavailable(source) = &err {
        warn!(error = %source, "storage failure on request path");
        if state.config().env_name != "local" {
            notify(state, format!("storage failure: {source}"));
        }
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::storage::StorageError, state::AppState};

    #[tokio::test]
    async fn escalate_keeps_backend_detail_out_of_the_response() {
        let state = AppState::new(AppConfig {
            env_name: "test".into(),
            port: 0,
            peer_health_url: None,
            self_addr: None,
            peer_refresh: std::time::Duration::from_secs(30),
            reaper_interval: std::time::Duration::from_secs(15),
            disconnect_grace: std::time::Duration::from_secs(60),
            alert_webhook_url: None,
            points_ledger_url: None,
            voice_channel_prefix: "room".into(),
        });

        let err = ServiceError::Unavailable(StorageError::unavailable(
            "update_one failed on rooms".into(),
            std::io::Error::other("socket closed"),
        ));
        let app = escalate(&state, err);

        assert!(matches!(app, AppError::ServiceUnavailable(_)));
        let message = app.to_string();
        assert!(!message.contains("rooms"));
        assert!(!message.contains("socket closed"));
    }
}
