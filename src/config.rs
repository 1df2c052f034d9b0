//! Application-level configuration loading, including the catalog of playable games.

use std::{env, fs, io::ErrorKind, path::PathBuf, sync::Arc};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{info, warn};

use crate::state::game::Game;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_ROOM_CONFIG_PATH";
/// Events buffered per live-feed subscriber before it is considered lagging.
pub const DEFAULT_FEED_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    games: IndexMap<String, Arc<Game>>,
    feed_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the built-in mock game.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        games = app_config.games.len(),
                        feed_capacity = app_config.feed_capacity,
                        "loaded game catalog from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document. Games whose boards are not rectangular
    /// are skipped; an empty catalog falls back to the mock game.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Games available to new rooms, in configuration order.
    pub fn games(&self) -> &IndexMap<String, Arc<Game>> {
        &self.games
    }

    /// Look a game up by identifier.
    pub fn game(&self, id: &str) -> Option<Arc<Game>> {
        self.games.get(id).cloned()
    }

    /// Per-subscriber buffer of the live room feed.
    pub fn feed_capacity(&self) -> usize {
        self.feed_capacity
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            games: catalog(vec![Game::mock()]),
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    games: Vec<Game>,
    #[serde(default)]
    feed_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let games = value
            .games
            .into_iter()
            .filter(|game| match game.check_shape() {
                Ok(()) => true,
                Err(reason) => {
                    warn!(game_id = %game.id, %reason, "skipping game with malformed boards");
                    false
                }
            })
            .collect::<Vec<_>>();

        let games = if games.is_empty() {
            warn!("no playable game in config; using the built-in mock game");
            vec![Game::mock()]
        } else {
            games
        };

        Self {
            games: catalog(games),
            feed_capacity: value
                .feed_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(DEFAULT_FEED_CAPACITY),
        }
    }
}

fn catalog(games: Vec<Game>) -> IndexMap<String, Arc<Game>> {
    games
        .into_iter()
        .map(|game| (game.id.clone(), Arc::new(game)))
        .collect()
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
