//! Upload progress reporting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes sent so far out of the payload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    /// Bytes sent.
    pub sent: u64,
    /// Payload size.
    pub total: u64,
}

impl UploadProgress {
    /// Creates a progress snapshot.
    #[must_use]
    pub fn new(sent: u64, total: u64) -> Self {
        Self { sent, total }
    }

    /// Completed fraction in `[0, 1]`. An empty payload counts as complete.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.sent as f64 / self.total as f64).min(1.0)
    }

    /// Whether every byte was sent.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.sent >= self.total
    }
}

impl fmt::Display for UploadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Upload Progress: {:.2} ({} B / {} B)",
            self.fraction(),
            self.sent,
            self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_display() {
        assert_eq!(
            UploadProgress::new(512, 2048).to_string(),
            "Upload Progress: 0.25 (512 B / 2048 B)"
        );
    }

    #[test]
    fn test_fraction_is_clamped() {
        // Multipart framing can push the sent count past the payload size.
        let progress = UploadProgress::new(2100, 2048);
        assert!((progress.fraction() - 1.0).abs() < f64::EPSILON);
        assert!(progress.is_complete());
        assert!((UploadProgress::new(0, 0).fraction() - 1.0).abs() < f64::EPSILON);
    }
}
