// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default Douglas-Peucker tolerance for stored routes, in degrees.
pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 0.0001;
/// Default isolation threshold for outlier removal, in kilometers.
pub const DEFAULT_OUTLIER_THRESHOLD_KM: f64 = 80.0;
/// Default centered smoothing window, in points.
pub const DEFAULT_SMOOTH_WINDOW: usize = 3;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory holding one dataset folder per user
    pub data_dir: PathBuf,
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Track processing settings shared by the job bodies
    pub tracks: TrackSettings,
    /// Base URL of the athlete directory (lookups are skipped when unset)
    pub athlete_api_url: Option<String>,
    /// Pause between two athlete lookups
    pub athlete_lookup_delay: Duration,
}

/// Tunables for the geometry pipeline.
#[derive(Debug, Clone, Copy)]
pub struct TrackSettings {
    /// Douglas-Peucker tolerance, in degrees
    pub simplify_tolerance: f64,
    /// Points farther than this from every other point are dropped
    pub outlier_threshold_km: f64,
    /// Centered smoothing window used for rendered images
    pub smooth_window: usize,
    /// Number of track files parsed concurrently
    pub parse_concurrency: usize,
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            simplify_tolerance: DEFAULT_SIMPLIFY_TOLERANCE,
            outlier_threshold_km: DEFAULT_OUTLIER_THRESHOLD_KM,
            smooth_window: DEFAULT_SMOOTH_WINDOW,
            parse_concurrency: 4,
        }
    }
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            data_dir: PathBuf::from("target/test-data"),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            tracks: TrackSettings::default(),
            athlete_api_url: None,
            athlete_lookup_delay: Duration::ZERO,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honored for local development. Unparseable numeric
    /// values fall back to their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
        if data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("DATA_DIR", "must not be empty".to_string()));
        }

        let defaults = TrackSettings::default();
        let tracks = TrackSettings {
            simplify_tolerance: env_or("ROUTE_SIMPLIFY_TOLERANCE", defaults.simplify_tolerance),
            outlier_threshold_km: env_or("OUTLIER_THRESHOLD_KM", defaults.outlier_threshold_km),
            smooth_window: env_or("SMOOTH_WINDOW", defaults.smooth_window),
            parse_concurrency: env_or("TRACK_PARSE_CONCURRENCY", defaults.parse_concurrency).max(1),
        };
        if tracks.simplify_tolerance < 0.0 {
            return Err(ConfigError::Invalid(
                "ROUTE_SIMPLIFY_TOLERANCE",
                "must be >= 0".to_string(),
            ));
        }

        Ok(Self {
            data_dir,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env_or("PORT", 8080),
            tracks,
            athlete_api_url: env::var("ATHLETE_API_URL")
                .ok()
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty()),
            athlete_lookup_delay: Duration::from_millis(env_or("ATHLETE_LOOKUP_DELAY_MS", 1000)),
        })
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Dataset file and artifact names inside a user's dataset folder.
pub mod files {
    pub const ACTIVITIES: &str = "activities.csv";
    pub const MEDIA: &str = "media.csv";
    /// Media rows removed by `remove_orphan_media`
    pub const ORPHAN_MEDIA: &str = "media-orphans.csv";
    pub const FOLLOWERS: &str = "followers.csv";
    pub const FOLLOWING: &str = "following.csv";

    pub const TRACKS_DIR: &str = "activities";
    pub const ROUTES_DIR: &str = "routes";
    pub const ACTIVITY_IMAGES_DIR: &str = "images/activities";
    pub const ROUTE_IMAGES_DIR: &str = "images/routes";
    pub const BACKUP_DIR: &str = ".quality-backups";

    pub const QUALITY_REPORT: &str = "data-quality-report.json";
    pub const HEATMAP: &str = "heatmap.json";
    pub const ATHLETES: &str = "athletes.json";
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
