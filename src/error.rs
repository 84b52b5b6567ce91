//! Error types for Discord Export.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors talking to the Discord REST API.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DiscordError {
    /// HTTP status code, if the API answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) => None,
        }
    }

    /// Human-readable explanation suitable for showing to the client.
    pub fn user_message(&self) -> String {
        match self.status() {
            Some(401) => "Invalid Discord token or unauthorized. Make sure you have access to the channel and your token is valid.".to_string(),
            Some(403) => "Access forbidden. You may not have permission to read messages in this channel.".to_string(),
            Some(404) => "Channel not found or not accessible. Check your Channel ID and make sure you have access to this channel.".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Export-related errors. Every variant is fatal to the export it occurs in.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Missing Channel ID or Discord Token")]
    InvalidRequest,

    #[error("Failed to get channel info: {}", .0.user_message())]
    ChannelLookup(DiscordError),

    #[error("Error in batch {set}: {}", .source.user_message())]
    Batch { set: u32, source: DiscordError },

    #[error("Failed to list forum posts: {}", .0.user_message())]
    ThreadListing(DiscordError),

    #[error("Export cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_map_to_guidance() {
        let err = DiscordError::Status {
            status: 401,
            body: "{\"message\": \"401: Unauthorized\"}".into(),
        };
        assert!(err.user_message().starts_with("Invalid Discord token"));

        let err = DiscordError::Status {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.user_message(), "API request failed with status 500: boom");
    }

    #[test]
    fn batch_error_names_the_batch() {
        let err = ExportError::Batch {
            set: 3,
            source: DiscordError::Status {
                status: 404,
                body: String::new(),
            },
        };
        let text = err.to_string();
        assert!(text.starts_with("Error in batch 3: Channel not found"));
    }
}
