//! Field rules gating every mutation. All lengths are UTF-8 byte counts.

use crate::error::{RegistryError, Result};

pub const MAX_TITLE_LEN: usize = 64;
pub const MAX_DESCRIPTION_LEN: usize = 128;
/// Exclusive upper bound on `file_size`.
pub const MAX_FILE_SIZE: u64 = 1_000_000_000;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LEN: usize = 32;
/// Tag appended by `archive`.
pub const ARCHIVED_TAG: &str = "ARCHIVED";

pub fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty() && tag.len() <= MAX_TAG_LEN
}

/// True iff there are 1..=10 tags and every one of them is valid.
pub fn validate_tag_format<S: AsRef<str>>(tags: &[S]) -> bool {
    !tags.is_empty() && tags.len() <= MAX_TAGS && tags.iter().all(|t| is_valid_tag(t.as_ref()))
}

fn text_within(text: &str, max: usize) -> bool {
    !text.is_empty() && text.len() <= max
}

/// Checks shared by `register` and `update`, in order: title, description,
/// file size, tags.
pub fn check_fields(title: &str, file_size: u64, description: &str, tags: &[String]) -> Result<()> {
    if !text_within(title, MAX_TITLE_LEN) || !text_within(description, MAX_DESCRIPTION_LEN) {
        return Err(RegistryError::InvalidTitle);
    }
    if file_size == 0 || file_size >= MAX_FILE_SIZE {
        return Err(RegistryError::InvalidDocumentSize);
    }
    if !validate_tag_format(tags) {
        return Err(RegistryError::TagValidationFailed);
    }
    Ok(())
}
