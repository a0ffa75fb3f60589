use thiserror::Error;

/// Reasons a tracking session could not be started.
///
/// Everything after a successful start (a failed append, a slow tick) is handled
/// inside the tracking loop and reported through `TrackingEvent`s instead.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("invalid tracking configuration: {0}")]
    InvalidConfiguration(String),

    #[error("{resource} unavailable: {source}")]
    ResourceUnavailable {
        resource: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("sample storage unavailable: {0}")]
    Storage(#[source] anyhow::Error),
}

impl TrackingError {
    pub fn invalid(message: impl Into<String>) -> Self {
        TrackingError::InvalidConfiguration(message.into())
    }

    /// Short text suitable for a transient user notification.
    pub fn user_message(&self) -> &'static str {
        match self {
            TrackingError::InvalidConfiguration(_) => "Check the alarm time and tracking settings",
            TrackingError::ResourceUnavailable { resource, .. } => match *resource {
                "microphone" => "Microphone is not available",
                _ => "Motion sensor is not available",
            },
            TrackingError::Storage(_) => "Sleep data cannot be saved right now",
        }
    }
}
