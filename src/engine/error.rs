use thiserror::Error;

/// Failure conditions surfaced by schedule and ETA computations.
///
/// Two classes of trouble never appear here because they are recovered
/// internally: a generation batch losing the uniqueness race reports zero
/// inserted rows, and an unreachable external routing service falls back to
/// the local travel-time estimate.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("route has no parseable operating window")]
    NoScheduleWindow,
    #[error("route has neither a usable frequency nor a daily trip count")]
    NoFrequencyData,
    #[error("fewer than two stops with coordinates in this direction")]
    InsufficientGeometry,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    /// Stable machine-readable kind for API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NoScheduleWindow => "no-schedule-window",
            EngineError::NoFrequencyData => "no-frequency-data",
            EngineError::InsufficientGeometry => "insufficient-geometry",
            EngineError::Database(_) => "database",
        }
    }
}
