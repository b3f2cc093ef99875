use crate::error::{Error, Result};

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 64;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 150;

fn is_valid_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

pub fn validate_username(username: &str) -> Result<()> {
    if username.len() < MIN_USERNAME_LEN {
        return Err(Error::Validation(format!(
            "Username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(Error::Validation(format!(
            "Username cannot exceed {MAX_USERNAME_LEN} characters"
        )));
    }
    if !username.chars().all(is_valid_username_char) {
        return Err(Error::Validation(
            "Username can only contain alphanumeric characters, hyphens, and underscores"
                .to_string(),
        ));
    }
    if username.starts_with('-') || username.starts_with('_') {
        return Err(Error::Validation(
            "Username cannot start with a hyphen or underscore".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Shared check for client names and record titles.
pub fn validate_display_name(name: &str, entity: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation(format!("{entity} name cannot be empty")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::Validation(format!(
            "{entity} name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}
