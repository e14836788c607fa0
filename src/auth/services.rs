use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    auth::{
        dto::{RegisterRequest, UpdateProfileRequest},
        password::is_long_enough,
        repo_types::DEFAULT_TIMEZONE,
    },
    error::ApiError,
    tz,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validated registration input.
#[derive(Debug, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub timezone: String,
}

fn clean_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidInput("name is required".into()));
    }
    Ok(name.to_string())
}

fn clean_timezone(timezone: &str) -> Result<String, ApiError> {
    Ok(tz::parse_zone(timezone)?.name().to_string())
}

pub fn validate_registration(req: &RegisterRequest) -> Result<NewUser, ApiError> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        return Err(ApiError::InvalidInput("Invalid email".into()));
    }
    if !is_long_enough(&req.password) {
        return Err(ApiError::InvalidInput("Password too short".into()));
    }
    let timezone = match req.timezone.as_deref() {
        Some(t) if !t.trim().is_empty() => clean_timezone(t)?,
        _ => DEFAULT_TIMEZONE.to_string(),
    };
    Ok(NewUser {
        email,
        name: clean_name(&req.name)?,
        timezone,
    })
}

/// Returns the `(name, timezone)` changes to apply.
pub fn validate_profile_update(
    req: &UpdateProfileRequest,
) -> Result<(Option<String>, Option<String>), ApiError> {
    let name = req.name.as_deref().map(clean_name).transpose()?;
    let timezone = req.timezone.as_deref().map(clean_timezone).transpose()?;
    if name.is_none() && timezone.is_none() {
        return Err(ApiError::InvalidInput("nothing to update".into()));
    }
    Ok((name, timezone))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str, password: &str, timezone: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            name: "Ada".into(),
            password: password.into(),
            timezone: timezone.map(String::from),
        }
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn registration_normalizes_and_defaults_zone() {
        let u = validate_registration(&register("  Ada@Example.COM ", "longenough", None)).unwrap();
        assert_eq!(
            u,
            NewUser {
                email: "ada@example.com".into(),
                name: "Ada".into(),
                timezone: "UTC".into(),
            }
        );
        let u = validate_registration(&register("a@b.co", "longenough", Some("America/Toronto")))
            .unwrap();
        assert_eq!(u.timezone, "America/Toronto");
    }

    #[test]
    fn registration_rejects_bad_input() {
        assert!(matches!(
            validate_registration(&register("nope", "longenough", None)),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_registration(&register("a@b.co", "short", None)),
            Err(ApiError::InvalidInput(_))
        ));
        let err = validate_registration(&register("a@b.co", "longenough", Some("Moon/Base")))
            .unwrap_err();
        assert_eq!(err.kind(), "UnknownTimezone");
    }

    #[test]
    fn profile_update_checks_zone_and_requires_a_change() {
        let (name, zone) = validate_profile_update(&UpdateProfileRequest {
            name: None,
            timezone: Some("Europe/Berlin".into()),
        })
        .unwrap();
        assert_eq!((name, zone.as_deref()), (None, Some("Europe/Berlin")));

        assert!(validate_profile_update(&UpdateProfileRequest::default()).is_err());
        assert!(validate_profile_update(&UpdateProfileRequest {
            name: Some("   ".into()),
            timezone: None,
        })
        .is_err());
        assert!(validate_profile_update(&UpdateProfileRequest {
            name: None,
            timezone: Some("Atlantis/Capital".into()),
        })
        .is_err());
    }
}
