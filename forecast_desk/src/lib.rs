//! # Forecast Desk
//!
//! Monthly budget forecasting for construction cost lines, with an
//! acknowledgment workflow gating AI-recommended forecasts.
//!
//! ## Features
//!
//! - Rolling 12-month distribution of each budget line using a selectable curve
//!   (Manual, Linear, S-Curve, Bell Curve, AI Forecast) and a 1–10 weight tilt
//! - Month-by-month variance against the last committed forecast
//! - Portfolio totals per forecast type (GC & GR, Draw)
//! - Mandatory acknowledge-or-reject review whenever a line switches to the
//!   AI forecast; rejection restores the previous method
//! - Append-only acknowledgment audit log, persisted through a repository trait
//! - CSV export of the record set with a totals footer
//!
//! ## Quick Start
//!
//! ```rust
//! use forecast_desk::{
//!     DeskConfig, ForecastEngine, ForecastType, InMemoryRepository, Method, MonthKey,
//!     RecordDraft, ReviewState,
//! };
//!
//! let config = DeskConfig {
//!     start_month: Some(MonthKey::new(2025, 1)?),
//!     ..DeskConfig::default()
//! };
//! let mut engine = ForecastEngine::open("tower-a", config, InMemoryRepository::new())?;
//!
//! engine.create_record(RecordDraft::new("conc", ForecastType::Draw, "03-3000", 1_200_000.0))?;
//! engine.set_method("conc", Method::AiForecast)?;
//! assert_eq!(engine.review_state("conc"), ReviewState::Pending);
//!
//! engine.acknowledge("conc")?;
//! assert_eq!(engine.review_state("conc"), ReviewState::Acknowledged);
//! # Ok::<(), forecast_desk::DeskError>(())
//! ```

pub mod acknowledgment;
pub mod calendar;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod persistence;
pub mod rationale;
pub mod record;
pub mod store;

// Re-export commonly used types
pub use crate::acknowledgment::{Acknowledgment, AcknowledgmentStore, ReviewExit, ReviewState};
pub use crate::calendar::MonthKey;
pub use crate::config::DeskConfig;
pub use crate::engine::{ForecastEngine, MethodChange, UpsertOutcome};
pub use crate::error::DeskError;
pub use crate::persistence::{InMemoryRepository, JsonFileRepository, ProjectRepository, ProjectSnapshot};
pub use crate::rationale::{CsiRationaleProvider, Rationale, RationaleProvider};
pub use crate::record::{ForecastRecord, ForecastType, RecordDraft};
pub use crate::store::{ForecastTotals, RecordStore};
pub use curve_math::{Method, Weight};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
