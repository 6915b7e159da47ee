//! Schedule derivation and arrival prediction.
//!
//! The engine turns sparse operator metadata into concrete departures and
//! per-stop arrival estimates:
//! - Operating-window extraction from free-text schedule descriptions
//! - Headway resolution from an explicit frequency or a daily trip count
//! - Stop-offset tables from geometry, locally estimated or fetched from an
//!   external routing service with the local estimate as fallback
//! - Idempotent generation of upcoming trips on a headway grid
//! - ETA projection from the schedule model or from persisted trips

pub mod cache;
pub mod error;
pub mod eta;
pub mod headway;
pub mod offsets;
pub mod trips;
pub mod window;

pub use error::EngineError;
pub use offsets::{OffsetResolver, OffsetSource, OffsetTable};
pub use window::OperatingWindow;
