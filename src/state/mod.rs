pub mod room;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig, dao::room_store::RoomStore, error::ServiceError, state::room::ParticipantRef,
};

pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to a participant's websocket on this instance.
pub struct PresenceEntry {
    pub room_id: Uuid,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state storing live connections, the peer list, and the
/// database handle.
pub struct AppState {
    config: AppConfig,
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    presence: DashMap<ParticipantRef, PresenceEntry>,
    peers: RwLock<Vec<String>>,
    http: reqwest::Client,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            room_store: RwLock::new(None),
            presence: DashMap::new(),
            peers: RwLock::new(Vec::new()),
            http: reqwest::Client::new(),
            degraded: degraded_tx,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared HTTP client used for peer relays and outbound webhooks.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Room store handle, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn install_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current room store and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.room_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.room_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Registry of locally connected participants keyed by identity.
    pub fn presence(&self) -> &DashMap<ParticipantRef, PresenceEntry> {
        &self.presence
    }

    /// Snapshot of the healthy peer addresses, self excluded.
    pub async fn peers(&self) -> Vec<String> {
        self.peers.read().await.clone()
    }

    /// Replace the peer list with a freshly discovered one.
    pub async fn set_peers(&self, peers: Vec<String>) {
        let mut guard = self.peers.write().await;
        *guard = peers;
    }

    /// Update and broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}
