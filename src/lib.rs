//! Moodtrace - In-memory mood inference from passive browsing signals
//!
//! Moodtrace turns low-level interaction signals (scroll offsets, idle
//! windows, visibility changes, tab switches) into a coarse mood estimate
//! with a confidence, keeps a bounded log of behavior events, and aggregates
//! a per-domain mood average.
//!
//! ## Modules
//!
//! - **Accumulation**: [`metrics`] folds raw signals into a metrics snapshot
//! - **Estimation**: [`estimator`] scores a snapshot on a fixed cadence
//! - **Storage**: [`event_log`] and [`sites`] keep the bounded event history
//!   and per-domain averages
//! - **Session**: [`session`] hosts an [`engine::MoodEngine`] on a tokio task
//!   and hands out cloneable handles; [`ffi`] exposes the engine over a C ABI

pub mod analytics;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod event_log;
pub mod metrics;
pub mod session;
pub mod sites;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{ConfidencePolicy, EngineConfig};
pub use encoder::{parse_export, ExportEncoder};
pub use engine::{MoodEngine, Signal};
pub use error::SessionError;
pub use session::{Session, SessionHandle};

pub use types::{
    BehaviorEvent, BehaviorEventType, BehaviorImpact, ExportPayload, InfluenceClass, Metrics,
    MoodLabel, MoodState, SiteData, SiteEntry, SiteInfluence, TimelinePoint,
};

/// Moodtrace version
pub const MOODTRACE_VERSION: &str = env!("CARGO_PKG_VERSION");
