use std::fmt;

use crate::error::AppError;

/// A `scheme://bucket/key` address of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub scheme: String,
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn s3(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scheme: "s3".to_string(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parses `scheme://bucket/key`. The key is taken verbatim (no percent-decoding),
    /// leading slashes stripped.
    pub fn parse(uri: &str) -> Result<Self, AppError> {
        let uri = uri.trim();
        let (scheme, rest) = uri.split_once("://").ok_or_else(|| {
            AppError::Validation(format!("'{uri}' is not a scheme://bucket/key location"))
        })?;

        let valid_scheme = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(AppError::Validation(format!(
                "'{uri}' has an invalid scheme"
            )));
        }

        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        let key = key.trim_start_matches('/');

        if bucket.is_empty() {
            return Err(AppError::Validation(format!("'{uri}' is missing a bucket")));
        }
        if key.is_empty() {
            return Err(AppError::Validation(format!("'{uri}' is missing an object key")));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}
