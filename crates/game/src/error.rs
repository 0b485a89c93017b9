//! Error types for the simulation surface. None of these are fatal: each maps to
//! a "nothing happened" outcome that the HUD can show.

use std::path::PathBuf;
use thiserror::Error;

/// Why `Bomber::launch_missile` refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LaunchError {
    #[error("missile cooling down ({remaining:.1}s left)")]
    CoolingDown { remaining: f32 },
    #[error("no defense launcher in range")]
    NoTarget,
    #[error("bomber is down")]
    BomberDown,
}

/// Why a bomb release request was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BombError {
    #[error("bomb cooling down ({remaining:.1}s left)")]
    CoolingDown { remaining: f32 },
    #[error("bomb bay already cycling")]
    BayBusy,
    #[error("bomber is down")]
    BomberDown,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not access config at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("config value {field} = {value} {rule}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        rule: &'static str,
    },
    #[error("could not serialize config: {source}")]
    Serialize {
        #[source]
        source: ron::Error,
    },
}
