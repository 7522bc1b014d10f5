use thiserror::Error;

use crate::arc::{ApiError, ErrorKind};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("No stories to process. Pass --csv, --csv-dir or --ids-file with at least one id.")]
    NoItems,

    #[error("Input error in {path}: {message}")]
    Input { path: String, message: String },

    #[error("Arc API error: {0}")]
    Api(#[from] ApiError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AppError {
    /// True when the platform rejected our credentials; callers stop instead of skipping.
    pub fn is_authentication(&self) -> bool {
        matches!(self, AppError::Api(err) if err.kind() == ErrorKind::Authentication)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_is_detected_through_api_variant() {
        let err = AppError::from(ApiError::Authentication {
            status: 401,
            message: "bad token".into(),
        });
        assert!(err.is_authentication());
        assert!(!AppError::from(ApiError::Transient("reset".into())).is_authentication());
        assert!(!AppError::NoItems.is_authentication());
    }

    #[test]
    fn messages_name_the_source() {
        let err = AppError::Input {
            path: "ids.txt".into(),
            message: "missing story_id column".into(),
        };
        assert_eq!(err.to_string(), "Input error in ids.txt: missing story_id column");
        assert_eq!(
            AppError::MissingEnv("ORG_ID").to_string(),
            "Missing environment variable: ORG_ID"
        );
    }
}
