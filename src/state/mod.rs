pub mod game;
pub mod grid;
pub mod state_machine;
pub mod view;

use std::{
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::SystemTime,
};

use dashmap::DashMap;
use tracing::info;

use crate::{
    config::AppConfig,
    dao::{
        event_store::{RoomEventStore, RoomLog},
        memory::MemoryEventLog,
    },
    dto::{format_system_time, room_event::RoomId},
    services::replication::ReplicationEngine,
    state::game::Game,
};

pub type SharedState = Arc<AppState>;

/// Key of a hosted session: the room it follows and the player it renders for.
pub type SessionKey = (RoomId, String);

#[derive(Debug, Clone)]
/// Room registered on this server.
pub struct Room {
    pub id: RoomId,
    pub game: Arc<Game>,
    pub created_at: String,
}

/// Central application state: configuration, the room log and the hosted sessions.
pub struct AppState {
    config: AppConfig,
    log: MemoryEventLog,
    store: Arc<dyn RoomEventStore>,
    room_log: Arc<dyn RoomLog>,
    rooms: DashMap<RoomId, Room>,
    next_room_id: AtomicI64,
    sessions: DashMap<SessionKey, Arc<ReplicationEngine>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        let log = MemoryEventLog::new(config.feed_capacity());
        Arc::new(Self {
            store: Arc::new(log.clone()),
            room_log: Arc::new(log.clone()),
            log,
            config,
            rooms: DashMap::new(),
            next_room_id: AtomicI64::new(1),
            sessions: DashMap::new(),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Append side of the room log.
    pub fn store(&self) -> Arc<dyn RoomEventStore> {
        Arc::clone(&self.store)
    }

    /// Read side of the room log.
    pub fn room_log(&self) -> Arc<dyn RoomLog> {
        Arc::clone(&self.room_log)
    }

    /// Register a room playing `game`.
    pub fn create_room(&self, game: Arc<Game>) -> Room {
        let room = Room {
            id: self.next_room_id.fetch_add(1, Ordering::SeqCst),
            game,
            created_at: format_system_time(SystemTime::now()),
        };
        self.rooms.insert(room.id, room.clone());
        room
    }

    /// Look a room up.
    pub fn room(&self, id: RoomId) -> Option<Room> {
        self.rooms.get(&id).map(|room| room.clone())
    }

    /// Registry of hosted sessions.
    pub fn sessions(&self) -> &DashMap<SessionKey, Arc<ReplicationEngine>> {
        &self.sessions
    }

    /// Detach every hosted session and end all live feeds.
    pub async fn shutdown(&self) {
        let keys = self
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();
        for key in keys {
            if let Some((_, engine)) = self.sessions.remove(&key) {
                engine.detach().await;
            }
        }
        self.log.close();
        info!("room log closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooms_get_increasing_ids() {
        let state = AppState::new(AppConfig::default());
        let game = Arc::new(Game::mock());
        let first = state.create_room(Arc::clone(&game));
        let second = state.create_room(game);

        assert!(first.id < second.id);
        assert_eq!(state.room(first.id).map(|room| room.id), Some(first.id));
        assert!(state.room(second.id + 1).is_none());
    }

    #[tokio::test]
    async fn shutdown_closes_the_log() {
        let state = AppState::new(AppConfig::default());
        state.shutdown().await;
        assert!(state.store().health_check().await.is_err());
    }
}
