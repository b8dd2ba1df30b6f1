// src/models/error_kind.rs

//! Classified failure kinds counted by the error aggregator.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Closed taxonomy of recoverable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    HttpRequest,
    ParseTitle,
    ParseDescription,
    ParseLink,
    ParseDate,
    ParsePrice,
}

impl ErrorKind {
    /// Every kind, in alert message order.
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::HttpRequest,
        ErrorKind::ParseTitle,
        ErrorKind::ParseDescription,
        ErrorKind::ParseLink,
        ErrorKind::ParseDate,
        ErrorKind::ParsePrice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::HttpRequest => "http-request",
            ErrorKind::ParseTitle => "parse-title",
            ErrorKind::ParseDescription => "parse-description",
            ErrorKind::ParseLink => "parse-link",
            ErrorKind::ParseDate => "parse-date",
            ErrorKind::ParsePrice => "parse-price",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified failure.
#[derive(Debug, Clone, Copy)]
pub struct ErrorRecord {
    pub timestamp: Instant,
    pub kind: ErrorKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde_name() {
        for kind in ErrorKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }
}
