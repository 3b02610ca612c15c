//! The user model and its validation.
//!
//! Users are part of the store contract but no route exposes them yet.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    database_id::DatabaseId,
    validation::{ValidationErrors, required},
};

/// The minimum number of characters in a username.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// The minimum number of characters in a password.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct UserId(DatabaseId);

impl UserId {
    /// Create a new user ID.
    pub fn new(id: DatabaseId) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
///
/// The password is stored as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID.
    pub id: UserId,
    /// The user's unique name.
    pub username: String,
    /// The user's password.
    pub password: String,
}

/// A validated user that has not been assigned an ID yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUser {
    /// At least [MIN_USERNAME_LENGTH] characters.
    pub username: String,
    /// At least [MIN_PASSWORD_LENGTH] characters.
    pub password: String,
}

impl NewUser {
    /// Attach an ID, producing the stored record.
    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            username: self.username,
            password: self.password,
        }
    }
}

/// The raw JSON body for creating a user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPayload {
    /// Must be at least [MIN_USERNAME_LENGTH] characters.
    pub username: Option<String>,
    /// Must be at least [MIN_PASSWORD_LENGTH] characters.
    pub password: Option<String>,
}

impl UserPayload {
    /// Validate a payload for a new user.
    ///
    /// # Errors
    /// Returns every field that is missing or too short.
    pub fn validate(self) -> Result<NewUser, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let username = required(self.username, "username", &mut errors).filter(|username| {
            let long_enough = username.chars().count() >= MIN_USERNAME_LENGTH;
            if !long_enough {
                errors.push("username", "Username must be at least 3 characters");
            }
            long_enough
        });
        let password = required(self.password, "password", &mut errors).filter(|password| {
            let long_enough = password.chars().count() >= MIN_PASSWORD_LENGTH;
            if !long_enough {
                errors.push("password", "Password must be at least 6 characters");
            }
            long_enough
        });

        match (username, password) {
            (Some(username), Some(password)) => {
                errors.into_result(NewUser { username, password })
            }
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod user_payload_tests {
    use crate::user::{NewUser, UserPayload};

    #[test]
    fn accepts_valid_user() {
        let payload = UserPayload {
            username: Some("alice".to_owned()),
            password: Some("hunter2".to_owned()),
        };

        assert_eq!(
            payload.validate(),
            Ok(NewUser {
                username: "alice".to_owned(),
                password: "hunter2".to_owned(),
            })
        );
    }

    #[test]
    fn rejects_short_username_and_password() {
        let payload = UserPayload {
            username: Some("al".to_owned()),
            password: Some("12345".to_owned()),
        };

        let errors = payload.validate().unwrap_err();

        assert_eq!(
            errors.to_string(),
            "Validation error: Username must be at least 3 characters at \"username\"; \
            Password must be at least 6 characters at \"password\""
        );
    }

    #[test]
    fn rejects_missing_fields() {
        let errors = UserPayload::default().validate().unwrap_err();

        assert_eq!(errors.fields().len(), 2);
    }
}
