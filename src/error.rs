use thiserror::Error;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NetworkStage {
    Token,
    Status,
}

/// Conditions that end the running session. Every variant is handled the
/// same way: show the code, light the warning colours, count down, restart.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("network failure during {stage:?} request: {message}")]
    Network {
        stage: NetworkStage,
        message: String,
    },
    #[error("clock synchronisation failed: {0}")]
    ClockSync(String),
}

impl DeviceError {
    pub fn token(message: impl Into<String>) -> Self {
        Self::Network {
            stage: NetworkStage::Token,
            message: message.into(),
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::Network {
            stage: NetworkStage::Status,
            message: message.into(),
        }
    }

    /// Short code that fits the 12 character display.
    pub fn display_code(&self) -> &'static str {
        match self {
            DeviceError::Network {
                stage: NetworkStage::Token,
                ..
            } => "TOKEN ERROR",
            DeviceError::Network {
                stage: NetworkStage::Status,
                ..
            } => "STATUS ERROR",
            DeviceError::ClockSync(_) => "TIME ERROR",
        }
    }
}
