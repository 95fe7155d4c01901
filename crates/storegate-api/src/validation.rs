//! Request validation

use crate::error::ApiError;

/// Longest accepted object id
pub const MAX_OBJECT_ID_LEN: usize = 32;

/// Accept ids matching `^[A-Za-z0-9_]{1,32}$`
pub fn validate_object_id(id: &str) -> Result<(), ApiError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_OBJECT_ID_LEN
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');

    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Invalid object id '{}': expected 1-{} characters of [A-Za-z0-9_]",
            id, MAX_OBJECT_ID_LEN
        )))
    }
}
