//! Plugin directory names
//!
//! Turns a display name like "My Plugin" into a directory name like "my-plugin".

use lazy_regex::regex_is_match;

use crate::error::AtkError;

/// Check a directory name against the plugin directory grammar
///
/// Lowercase, starts with a letter, ends with a letter or digit, single hyphens
/// only, at least two characters.
pub fn validate_directory(name: &str) -> Result<(), String> {
    if name.len() < 2 {
        return Err("directory must be at least 2 characters".to_string());
    }
    if !regex_is_match!(r"^[a-z][a-z0-9]*(-[a-z0-9]+)*$", name) {
        return Err("directory must be lowercase, start with a letter, end with alphanumeric, \
             and contain only letters, numbers, and single hyphens"
            .to_string());
    }
    Ok(())
}

/// Derive a directory name from a display name
pub fn sanitize(display_name: &str) -> Result<String, AtkError> {
    let invalid = |reason: &str| AtkError::InvalidName {
        name: display_name.to_string(),
        reason: reason.to_string(),
    };

    let mut name = String::with_capacity(display_name.len());
    let mut pending_hyphen = false;

    for ch in display_name.trim().to_lowercase().chars() {
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_hyphen = true;
        } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !name.is_empty() {
                name.push('-');
            }
            pending_hyphen = false;
            name.push(ch);
        }
    }

    match name.len() {
        0 => Err(invalid("empty after removing unsupported characters")),
        1 => Err(invalid("result is a single character")),
        _ => {
            validate_directory(&name).map_err(|reason| invalid(&reason))?;
            Ok(name)
        }
    }
}
