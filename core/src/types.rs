//! Domain values shared by the client operations.
//!
//! # Design
//! Payloads for accounts, agreements and document batches are opaque to the
//! client: the service owns their schema and validation. They travel as JSON
//! objects so new server fields never require a client release.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifier of a company, account, agreement or billing document.
/// Zero means "not supplied".
pub type ResourceId = u64;

/// Request body for create/update style operations.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// A local file sent with the settlement-return ingestion. The file is read
/// when the request is executed and is not retained afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAttachment {
    pub path: PathBuf,
    pub media_type: String,
    pub file_name: String,
}

impl UploadAttachment {
    pub fn new(
        path: impl Into<PathBuf>,
        media_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            media_type: media_type.into(),
            file_name: file_name.into(),
        }
    }

    /// True when path, media type and file name are all non-empty.
    pub fn is_complete(&self) -> bool {
        !self.path.as_os_str().is_empty() && !self.media_type.is_empty() && !self.file_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_with_all_fields_is_complete() {
        let file = UploadAttachment::new("/tmp/ret.txt", "text/plain", "ret.txt");
        assert!(file.is_complete());
    }

    #[test]
    fn attachment_missing_any_field_is_incomplete() {
        assert!(!UploadAttachment::new("", "text/plain", "ret.txt").is_complete());
        assert!(!UploadAttachment::new("/tmp/ret.txt", "", "ret.txt").is_complete());
        assert!(!UploadAttachment::new("/tmp/ret.txt", "text/plain", "").is_complete());
    }
}
