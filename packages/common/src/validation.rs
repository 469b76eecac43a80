use std::sync::LazyLock;

use regex::Regex;

/// Minimum password length accepted at sign-in and sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Minimum length for a password set from the profile page.
pub const MIN_NEW_PASSWORD_LEN: usize = 8;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Shape check only: something@something.tld, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn validate_credentials(email: &str, password: &str) -> Result<(), String> {
    if !is_valid_email(email.trim()) {
        return Err("Enter a valid email address".into());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    Ok(())
}

pub fn validate_new_password(password: &str, confirm: &str, min_len: usize) -> Result<(), String> {
    if password != confirm {
        return Err("Passwords do not match".into());
    }
    if password.chars().count() < min_len {
        return Err(format!("Password must be at least {min_len} characters"));
    }
    Ok(())
}

/// Trimmed value of a required text field.
pub fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(format!("{field} is required")),
    }
}
