use rand::{Rng, distr::Alphanumeric};
use uuid::Uuid;

use crate::config::AppConfig;

/// Issue the voice side-channel name for a new room. The random suffix keeps
/// channel names from colliding when a room id is ever reused by the voice
/// provider's cache.
pub fn channel_name(config: &AppConfig, room_id: Uuid) -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!(
        "{}-{}-{}",
        config.voice_channel_prefix,
        room_id.simple(),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
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
        }
    }

    #[test]
    fn channel_name_carries_prefix_and_room() {
        let room_id = Uuid::from_u128(42);
        let name = channel_name(&config(), room_id);
        assert!(name.starts_with(&format!("room-{}-", room_id.simple())));
    }

    #[test]
    fn channel_names_differ_per_issue() {
        let room_id = Uuid::from_u128(42);
        assert_ne!(
            channel_name(&config(), room_id),
            channel_name(&config(), room_id)
        );
    }
}
