//! Client-side checks run before any login or registration request is sent.

use thiserror::Error;

use crate::models::NewAccount;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LENGTH: usize = 9;

/// Characters that satisfy the "special character" rule
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Password does not meet requirements: {}", .0.join(", "))]
    WeakPassword(Vec<&'static str>),
}

/// Every password rule `password` fails, in display order
pub fn password_problems(password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push("At least 9 characters");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("At least one number");
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        problems.push("At least one special character (!@#$%^&*)");
    }
    problems
}

pub fn validate_login(identifier: &str, password: &str) -> Result<(), ValidationError> {
    if identifier.trim().is_empty() {
        return Err(ValidationError::Missing("Email or username"));
    }
    if password.is_empty() {
        return Err(ValidationError::Missing("Password"));
    }
    Ok(())
}

pub fn validate_new_account(account: &NewAccount) -> Result<(), ValidationError> {
    if account.username.trim().is_empty() {
        return Err(ValidationError::Missing("Username"));
    }
    if account.email.trim().is_empty() {
        return Err(ValidationError::Missing("Email"));
    }
    // Password reset trusts the security answer, so an account may not go without one
    if is_blank(&account.security_question) {
        return Err(ValidationError::Missing("Security question"));
    }
    if is_blank(&account.security_answer) {
        return Err(ValidationError::Missing("Security answer"));
    }
    validate_password(&account.password)
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let problems = password_problems(password);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword(problems))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(password: &str) -> NewAccount {
        NewAccount {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: password.to_string(),
            security_question: Some("What is your favorite book?".to_string()),
            security_answer: Some("Dune".to_string()),
        }
    }

    #[test]
    fn test_password_rules() {
        assert!(password_problems("hunter2!xyz").is_empty());
        assert_eq!(
            password_problems("short"),
            vec![
                "At least 9 characters",
                "At least one number",
                "At least one special character (!@#$%^&*)"
            ]
        );
        assert_eq!(password_problems("longenough1"), vec!["At least one special character (!@#$%^&*)"]);
        assert_eq!(password_problems("longenough{"), vec!["At least one number"]);
    }

    #[test]
    fn test_validate_login() {
        assert!(validate_login("alice", "pw").is_ok());
        assert_eq!(validate_login("  ", "pw"), Err(ValidationError::Missing("Email or username")));
        assert_eq!(validate_login("alice", ""), Err(ValidationError::Missing("Password")));
    }

    #[test]
    fn test_validate_new_account() {
        assert!(validate_new_account(&account("s3cure!pass")).is_ok());
        let err = validate_new_account(&account("weak")).unwrap_err();
        assert!(err.to_string().starts_with("Password does not meet requirements"));

        let mut missing = account("s3cure!pass");
        missing.username.clear();
        assert_eq!(validate_new_account(&missing), Err(ValidationError::Missing("Username")));
    }

    #[test]
    fn test_security_question_and_answer_required() {
        let mut no_question = account("s3cure!pass");
        no_question.security_question = None;
        no_question.security_answer = None;
        assert_eq!(
            validate_new_account(&no_question),
            Err(ValidationError::Missing("Security question"))
        );

        let mut no_answer = account("s3cure!pass");
        no_answer.security_answer = None;
        assert_eq!(
            validate_new_account(&no_answer),
            Err(ValidationError::Missing("Security answer"))
        );

        let mut blank_answer = account("s3cure!pass");
        blank_answer.security_answer = Some("   ".to_string());
        assert_eq!(
            validate_new_account(&blank_answer),
            Err(ValidationError::Missing("Security answer"))
        );
    }
}
