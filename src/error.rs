use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("invalid override {name}={value}")]
    InvalidOverride { name: &'static str, value: String },
    #[error("device error: {0}")]
    Device(String),
    #[error("device did not raise ap_done after {polls} polls")]
    Timeout { polls: u64 },
    #[error("accelerator is busy")]
    Busy,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConvResult<T> = Result<T, ConvError>;
