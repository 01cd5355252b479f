use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("{count} grid nodes still carry an undefined point type")]
    UndefinedPointType { count: usize },

    #[error("Query outside field domain on axis {axis}: {value} not in [{min}, {max}]")]
    OutOfDomain {
        axis: usize,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Physics constraint violated: {0}")]
    PhysicsViolation(String),

    #[error("Event {event_id}: deposit {index} lies outside the active volume")]
    DepositOutsideActiveVolume { event_id: u64, index: usize },

    #[error("Unknown contact id {0}")]
    MissingContact(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SimResult<T> = Result<T, DetectorError>;
