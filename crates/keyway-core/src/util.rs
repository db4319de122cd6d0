//! Small helpers shared by the pipeline components.

use crate::error::{AuthError, AuthResult};
use rand::Rng;

/// Fail with a configuration error when `value` is missing or blank.
pub fn assert_not_blank(name: &str, value: Option<&str>) -> AuthResult<()> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(AuthError::Configuration(format!("{name} cannot be blank"))),
    }
}

/// Append `name=value` to `url`, URL-encoding the value.
pub fn add_parameter(url: &str, name: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{name}={}", urlencoding::encode(value))
}

/// Random alphanumeric string of `size` characters.
pub fn random_string(size: usize) -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(size)
        .map(char::from)
        .collect()
}
