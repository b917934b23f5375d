//! Email and password policy validation (§4.3).
//!
//! Kept as free functions rather than methods so [`super::core::AuthCore`] can validate
//! before it ever touches the store, and so the policy is independently unit-testable.

use crate::error::AuthError;

const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Lowercase and validate an email address. Returns the lowercased form on success.
///
/// Rules: length <= 254, contains exactly one `@` with a non-empty local part, and a
/// domain part containing at least one `.` with a non-empty label on either side.
pub fn validate_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return Err(AuthError::InvalidEmail);
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidEmail);
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(AuthError::InvalidEmail);
    }
    if !domain.contains('.') {
        return Err(AuthError::InvalidEmail);
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(AuthError::InvalidEmail);
    }
    if !local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
    {
        return Err(AuthError::InvalidEmail);
    }
    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(AuthError::InvalidEmail);
    }
    Ok(email)
}

/// Validate a password against the policy, collecting every violated rule into a single
/// joined reason string rather than failing on the first one — callers surface the full
/// list to help the user fix the password in one pass.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let mut reasons = Vec::new();

    if password.len() < MIN_PASSWORD_LEN {
        reasons.push(format!("must be at least {MIN_PASSWORD_LEN} characters"));
    }
    if password.len() > MAX_PASSWORD_LEN {
        reasons.push(format!("must be at most {MAX_PASSWORD_LEN} characters"));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        reasons.push("must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        reasons.push("must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        reasons.push("must contain at least one digit".to_string());
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        reasons.push(format!(
            "must contain at least one special character from {SPECIAL_CHARS}"
        ));
    }
    if has_triple_repeat(password) {
        reasons.push("must not repeat the same character three or more times in a row".to_string());
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(AuthError::InvalidPassword(reasons.join("; ")))
    }
}

fn has_triple_repeat(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_accepts_valid_email() {
        assert_eq!(validate_email("User@Example.COM").unwrap(), "user@example.com");
    }

    #[test]
    fn rejects_missing_at_sign() {
        assert!(validate_email("userexample.com").is_err());
    }

    #[test]
    fn rejects_domain_without_dot() {
        assert!(validate_email("user@localhost").is_err());
    }

    #[test]
    fn rejects_too_long_email() {
        let long_local = "a".repeat(250);
        assert!(validate_email(&format!("{long_local}@b.co")).is_err());
    }

    #[test]
    fn accepts_strong_password() {
        assert!(validate_password("Str0ng!Pass").is_ok());
    }

    #[test]
    fn rejects_password_missing_classes() {
        let err = validate_password("alllowercase1!").unwrap_err();
        assert!(matches!(err, AuthError::InvalidPassword(_)));
    }

    #[test]
    fn rejects_triple_repeat() {
        let err = validate_password("Aaa111!!!Bbb").unwrap_err();
        let AuthError::InvalidPassword(reason) = err else {
            panic!("expected InvalidPassword");
        };
        assert!(reason.contains("three or more times"));
    }

    #[test]
    fn rejects_out_of_range_length() {
        assert!(validate_password("Sh0rt!").is_err());
        let too_long = format!("Aa1!{}", "a".repeat(130));
        assert!(validate_password(&too_long).is_err());
    }
}
