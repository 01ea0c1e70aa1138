//! Form validation
//!
//! Input forms checked before any backend call. Rules are declared with
//! `validator` derives; failures become [`AppError::Validation`] with a
//! message per field.

use validator::Validate;

use crate::data::{ImageFile, NewUser};
use crate::error::AppError;

/// Validate a form, mapping failures to field messages
pub fn check<T: Validate>(form: &T) -> Result<(), AppError> {
    form.validate().map_err(AppError::from)
}

#[derive(Debug, Clone, Default, Validate)]
pub struct SignupForm {
    #[validate(length(min = 2, message = "Name must be at least 2 characters."))]
    pub name: String,
    #[validate(length(min = 2, message = "Username must be at least 2 characters."))]
    pub username: String,
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    pub password: String,
}

impl From<SignupForm> for NewUser {
    fn from(form: SignupForm) -> Self {
        NewUser {
            name: form.name,
            username: form.username,
            email: form.email,
            password: form.password,
        }
    }
}

#[derive(Debug, Clone, Default, Validate)]
pub struct SigninForm {
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    pub password: String,
}

/// Profile edit form
#[derive(Debug, Clone, Default, Validate)]
pub struct ProfileForm {
    /// New avatar, if one was picked
    pub file: Option<ImageFile>,
    #[validate(length(min = 2, message = "Name must be at least 2 characters."))]
    pub name: String,
    #[validate(length(min = 2, message = "Username must be at least 2 characters."))]
    pub username: String,
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    pub bio: String,
}

/// Post create/edit form
#[derive(Debug, Clone, Default, Validate)]
pub struct PostForm {
    #[validate(length(min = 5, max = 2200, message = "Caption must be 5 to 2,200 characters."))]
    pub caption: String,
    /// Required when creating; replaces the image when editing
    pub file: Option<ImageFile>,
    #[validate(length(min = 1, max = 1000, message = "Location must be 1 to 1,000 characters."))]
    pub location: String,
    /// Comma-separated
    pub tags: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_form(caption: &str) -> PostForm {
        PostForm {
            caption: caption.to_string(),
            file: None,
            location: "Lisbon".to_string(),
            tags: "sun".to_string(),
        }
    }

    #[test]
    fn short_caption_is_rejected() {
        let error = check(&post_form("Hi")).unwrap_err();
        let AppError::Validation(fields) = error else {
            panic!("expected validation error");
        };
        assert_eq!(fields.get("caption"), ["Caption must be 5 to 2,200 characters."]);
        assert!(!fields.contains("location"));
    }

    #[test]
    fn caption_bounds_are_inclusive() {
        assert!(check(&post_form("Hello")).is_ok());
        assert!(check(&post_form(&"x".repeat(2200))).is_ok());
        assert!(check(&post_form(&"x".repeat(2201))).is_err());
    }

    #[test]
    fn signup_reports_every_failing_field() {
        let form = SignupForm {
            name: "A".to_string(),
            username: "ada".to_string(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
        };
        let AppError::Validation(fields) = check(&form).unwrap_err() else {
            panic!("expected validation error");
        };
        let failed: Vec<_> = fields.fields().collect();
        assert_eq!(failed, vec!["email", "name", "password"]);
    }

    #[test]
    fn valid_signin_passes() {
        let form = SigninForm {
            email: "ada@example.com".to_string(),
            password: "analytical".to_string(),
        };
        assert!(check(&form).is_ok());
    }
}
