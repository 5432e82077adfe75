//! Attachment allow-lists for job-card submissions.
//!
//! Every uploaded file is checked against its category's type and size
//! limits before anything touches storage or the database; one bad file
//! rejects the whole submission.

use service_core::error::AppError;
use uuid::Uuid;

pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_VOICE_NOTE_BYTES: usize = 25 * 1024 * 1024;

const PHOTO_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];
const VOICE_NOTE_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/wav",
    "audio/webm",
    "audio/ogg",
    "audio/mp4",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Photo,
    Document,
    VoiceNote,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Photo => "photos",
            AttachmentKind::Document => "documents",
            AttachmentKind::VoiceNote => "voice_note",
        }
    }

    fn max_bytes(&self) -> usize {
        match self {
            AttachmentKind::Photo => MAX_PHOTO_BYTES,
            AttachmentKind::Document => MAX_DOCUMENT_BYTES,
            AttachmentKind::VoiceNote => MAX_VOICE_NOTE_BYTES,
        }
    }

    fn allowed_types(&self) -> &'static [&'static str] {
        match self {
            AttachmentKind::Photo => PHOTO_TYPES,
            AttachmentKind::Document => DOCUMENT_TYPES,
            AttachmentKind::VoiceNote => VOICE_NOTE_TYPES,
        }
    }
}

/// One file pulled out of the multipart body, not yet accepted.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub kind: AttachmentKind,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    /// Storage key scoped to the owning job card.
    pub fn storage_key(&self, job_card_id: i64) -> String {
        let extension = std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("bin");
        format!(
            "{}/{}/{}.{}",
            job_card_id,
            self.kind.as_str(),
            Uuid::new_v4(),
            extension
        )
    }
}

/// Check one file against its category allow-list, naming the offender
/// on failure.
pub fn validate(file: &UploadedFile) -> Result<(), AppError> {
    let allowed = file.kind.allowed_types();
    let content_type = file.content_type.to_ascii_lowercase();
    // Content types may carry parameters, e.g. "audio/webm;codecs=opus".
    let bare_type = content_type.split(';').next().unwrap_or("").trim();

    if !allowed.contains(&bare_type) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "file `{}` has unsupported type `{}` for {} (allowed: {})",
            file.file_name,
            file.content_type,
            file.kind.as_str(),
            allowed.join(", ")
        )));
    }

    if file.data.len() > file.kind.max_bytes() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "file `{}` is {} bytes, over the {} byte limit for {}",
            file.file_name,
            file.data.len(),
            file.kind.max_bytes(),
            file.kind.as_str()
        )));
    }

    Ok(())
}

/// Validate a whole submission's attachments up front (fail-fast,
/// all-or-nothing).
pub fn validate_all(files: &[UploadedFile]) -> Result<(), AppError> {
    for file in files {
        validate(file)?;
    }
    Ok(())
}
