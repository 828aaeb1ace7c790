use serde::{Deserialize, Serialize};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Typist")
    }
}

/// Answers who, if anyone, is signed in.
pub trait AuthProvider {
    fn current_user(&self) -> Option<User>;
}

/// Nobody is signed in; results are never submitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl AuthProvider for Anonymous {
    fn current_user(&self) -> Option<User> {
        None
    }
}

/// A fixed signed-in user for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct SignedIn(pub User);

impl AuthProvider for SignedIn {
    fn current_user(&self) -> Option<User> {
        Some(self.0.clone())
    }
}

impl<A: AuthProvider + ?Sized> AuthProvider for Box<A> {
    fn current_user(&self) -> Option<User> {
        (**self).current_user()
    }
}

/// Checks the fields the registration form collects.
pub fn validate_registration(email: &str, name: &str) -> Result<(), String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {}
        _ => return Err(format!("invalid email address: {email:?}")),
    }

    let name_len = name.trim().chars().count();
    if !(1..=60).contains(&name_len) {
        return Err("name must be between 1 and 60 characters".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 1,
            email: "ada@example.com".into(),
            name: Some("Ada".into()),
        }
    }

    #[test]
    fn test_anonymous_has_no_user() {
        assert_eq!(Anonymous.current_user(), None);
    }

    #[test]
    fn test_signed_in_returns_user() {
        assert_eq!(SignedIn(user()).current_user(), Some(user()));
        let boxed: Box<dyn AuthProvider> = Box::new(SignedIn(user()));
        assert_eq!(boxed.current_user(), Some(user()));
    }

    #[test]
    fn test_display_name_fallback() {
        let mut u = user();
        assert_eq!(u.display_name(), "Ada");
        u.name = None;
        assert_eq!(u.display_name(), "Typist");
    }

    #[test]
    fn test_validate_registration() {
        assert!(validate_registration("ada@example.com", "Ada").is_ok());
        assert!(validate_registration("ada.example.com", "Ada").is_err());
        assert!(validate_registration("@example.com", "Ada").is_err());
        assert!(validate_registration("ada@", "Ada").is_err());
        assert!(validate_registration("a@b@c", "Ada").is_err());
        assert!(validate_registration("ada@example.com", "  ").is_err());
        assert!(validate_registration("ada@example.com", &"x".repeat(61)).is_err());
        assert!(validate_registration("ada@example.com", &"x".repeat(60)).is_ok());
    }
}
