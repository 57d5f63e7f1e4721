use crate::appresult::{AppError, AppResult};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 6;
pub const MESSAGE_MAX: usize = 2000;

pub fn validate_username(username: &str) -> AppResult<()> {
    let len = username.chars().count();
    if len < USERNAME_MIN {
        return Err(AppError::Validation(
            "Username must be at least 3 characters long".to_owned(),
        ));
    }
    if len > USERNAME_MAX {
        return Err(AppError::Validation(
            "Username must be at most 50 characters long".to_owned(),
        ));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(
            "Username must not contain whitespace".to_owned(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> AppResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
                && email.len() <= 255
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AppError::Validation("A valid email is required".to_owned()))
    }
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(AppError::Validation(
            "Password must be at least 6 characters long".to_owned(),
        ));
    }
    Ok(())
}

pub fn validate_message_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_owned()));
    }
    if content.chars().count() > MESSAGE_MAX {
        return Err(AppError::Validation(
            "Message must be at most 2000 characters long".to_owned(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_bounds() {
        assert!(validate_username("al").is_err());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username(&"x".repeat(50)).is_ok());
        assert!(validate_username(&"x".repeat(51)).is_err());
        assert!(validate_username("no spaces").is_err());
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("alice@x.com").is_ok());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("alice@nodot").is_err());
        assert!(validate_email("@x.com").is_err());
        assert!(validate_email("alice@x.").is_err());
        assert!(validate_email("a b@x.com").is_err());
    }

    #[test]
    fn password_minimum() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("secret1").is_ok());
    }

    #[test]
    fn message_bounds() {
        assert!(validate_message_content("hi").is_ok());
        assert!(validate_message_content("   ").is_err());
        assert!(validate_message_content(&"x".repeat(2000)).is_ok());
        assert!(validate_message_content(&"x".repeat(2001)).is_err());
    }
}
