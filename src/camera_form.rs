use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static SOURCE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[-A-Za-z0-9_.]+(:[0-9]+)?(/([A-Za-z0-9_/.]*(\?\S+)?)?)?$")
        .expect("source URL pattern")
});
static WHOLE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("whole number pattern"));
static POSITIVE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9][0-9]*$").expect("positive number pattern"));
static POSITIVE_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9][0-9]*(\.[0-9]+)?$").expect("positive decimal pattern"));

const NAME_MIN: usize = 3;
const NAME_MAX: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraField {
    Name,
    Url,
    Enabled,
    PollMaxFps,
    AlertMaxFps,
    NumSecsAfter,
}

/// First failing field of a camera dialog, with the tip shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FormError {
    pub field: CameraField,
    pub message: String,
}

impl FormError {
    fn new(field: CameraField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Raw camera dialog fields as posted by the browser
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraForm {
    /// Empty when adding a new camera
    pub key: String,
    pub name: String,
    pub url: String,
    pub enabled: String,
    pub poll_max_fps: String,
    pub alert_max_fps: String,
    pub num_secs_after: String,
}

/// Camera settings that passed validation. Numeric fields keep the text the
/// user typed; the camera server does its own parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub poll_max_fps: String,
    pub alert_max_fps: String,
    pub num_secs_after: String,
}

impl CameraSettings {
    /// Form fields in the order the camera server expects them
    pub fn form_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("url", self.url.clone()),
            ("enabled", if self.enabled { "1" } else { "0" }.to_string()),
            ("poll_max_fps", self.poll_max_fps.clone()),
            ("alert_max_fps", self.alert_max_fps.clone()),
            ("num_secs_after", self.num_secs_after.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CameraRequest {
    Add(CameraSettings),
    Save { key: String, settings: CameraSettings },
}

fn check_length(value: &str, field: CameraField, label: &str, min: usize, max: usize) -> Result<(), FormError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(FormError::new(
            field,
            format!("Length of {} must be between {} and {}.", label, min, max),
        ));
    }
    Ok(())
}

fn check_regex(value: &str, regex: &Regex, field: CameraField, message: &str) -> Result<(), FormError> {
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(FormError::new(field, message))
    }
}

fn parse_enabled(value: &str) -> Result<bool, FormError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" | "" => Ok(false),
        _ => Err(FormError::new(CameraField::Enabled, "Enabled must be on or off.")),
    }
}

impl CameraForm {
    /// Checks the fields in dialog order and stops at the first failure.
    pub fn validate(&self) -> Result<CameraRequest, FormError> {
        check_length(&self.name, CameraField::Name, "name", NAME_MIN, NAME_MAX)?;
        check_regex(&self.url, &SOURCE_URL, CameraField::Url, "Source URL is invalid.")?;
        check_regex(
            &self.poll_max_fps,
            &WHOLE_NUMBER,
            CameraField::PollMaxFps,
            "Max frame rate (normal) must be an integer.",
        )?;
        check_regex(
            &self.alert_max_fps,
            &POSITIVE_NUMBER,
            CameraField::AlertMaxFps,
            "Max frame rate (alert) must be an integer.",
        )?;
        check_regex(
            &self.num_secs_after,
            &POSITIVE_DECIMAL,
            CameraField::NumSecsAfter,
            "Number of seconds after alert must be a decimal.",
        )?;

        let settings = CameraSettings {
            name: self.name.clone(),
            url: self.url.clone(),
            enabled: parse_enabled(&self.enabled)?,
            poll_max_fps: self.poll_max_fps.clone(),
            alert_max_fps: self.alert_max_fps.clone(),
            num_secs_after: self.num_secs_after.clone(),
        };

        if self.key.is_empty() {
            Ok(CameraRequest::Add(settings))
        } else {
            Ok(CameraRequest::Save {
                key: self.key.clone(),
                settings,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> CameraForm {
        CameraForm {
            key: String::new(),
            name: "Front door".to_string(),
            url: "http://192.168.1.20:8080/snapshot.jpg?res=hi".to_string(),
            enabled: "1".to_string(),
            poll_max_fps: "0".to_string(),
            alert_max_fps: "10".to_string(),
            num_secs_after: "2.5".to_string(),
        }
    }

    fn field_error(form: &CameraForm) -> CameraField {
        form.validate().unwrap_err().field
    }

    #[test]
    fn test_valid_form_becomes_add() {
        let request = valid_form().validate().unwrap();
        let CameraRequest::Add(settings) = request else {
            panic!("expected add request");
        };
        assert!(settings.enabled);
        assert_eq!(settings.poll_max_fps, "0");
        assert_eq!(settings.alert_max_fps, "10");
        assert_eq!(settings.num_secs_after, "2.5");
    }

    #[test]
    fn test_numbers_are_forwarded_as_typed() {
        let form = CameraForm {
            poll_max_fps: "4294967296".to_string(),
            alert_max_fps: "12345678901234567890".to_string(),
            num_secs_after: "1.10".to_string(),
            ..valid_form()
        };
        let CameraRequest::Add(settings) = form.validate().unwrap() else {
            panic!("expected add request");
        };
        let pairs = settings.form_pairs();
        assert_eq!(pairs[3], ("poll_max_fps", "4294967296".to_string()));
        assert_eq!(pairs[4], ("alert_max_fps", "12345678901234567890".to_string()));
        assert_eq!(pairs[5], ("num_secs_after", "1.10".to_string()));

        let form = CameraForm {
            num_secs_after: "12345678901234567890.123".to_string(),
            ..valid_form()
        };
        let CameraRequest::Add(settings) = form.validate().unwrap() else {
            panic!("expected add request");
        };
        assert_eq!(settings.num_secs_after, "12345678901234567890.123");
    }

    #[test]
    fn test_key_makes_save() {
        let form = CameraForm {
            key: "agxjYW13YXRjaHIRCxIM".to_string(),
            ..valid_form()
        };
        match form.validate().unwrap() {
            CameraRequest::Save { key, .. } => assert_eq!(key, "agxjYW13YXRjaHIRCxIM"),
            other => panic!("expected save, got {:?}", other),
        }
    }

    #[test]
    fn test_name_length() {
        let mut form = valid_form();
        form.name = "ab".to_string();
        let err = form.validate().unwrap_err();
        assert_eq!(err.field, CameraField::Name);
        assert_eq!(err.to_string(), "Length of name must be between 3 and 100.");

        form.name = "x".repeat(101);
        assert_eq!(field_error(&form), CameraField::Name);

        form.name = "x".repeat(100);
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_source_urls() {
        let accepted = [
            "http://cam",
            "https://cam.example.com/",
            "http://10.0.0.5:81/img/snap.jpg",
            "http://cam/video.cgi?user=admin&pwd=x",
        ];
        for url in accepted {
            let form = CameraForm { url: url.to_string(), ..valid_form() };
            assert!(form.validate().is_ok(), "{} should be accepted", url);
        }

        let rejected = ["ftp://cam/x.jpg", "http://", "cam.local/x.jpg", "http://cam/a b.jpg"];
        for url in rejected {
            let form = CameraForm { url: url.to_string(), ..valid_form() };
            let err = form.validate().unwrap_err();
            assert_eq!(err.field, CameraField::Url, "{} should be rejected", url);
            assert_eq!(err.message, "Source URL is invalid.");
        }
    }

    #[test]
    fn test_frame_rates() {
        let form = CameraForm { poll_max_fps: "1.5".to_string(), ..valid_form() };
        assert_eq!(field_error(&form), CameraField::PollMaxFps);

        let form = CameraForm { alert_max_fps: "0".to_string(), ..valid_form() };
        assert_eq!(
            form.validate().unwrap_err().message,
            "Max frame rate (alert) must be an integer."
        );

        let form = CameraForm { alert_max_fps: "007".to_string(), ..valid_form() };
        assert_eq!(field_error(&form), CameraField::AlertMaxFps);
    }

    #[test]
    fn test_seconds_after() {
        for bad in ["0.5", ".5", "2.", "-1", ""] {
            let form = CameraForm { num_secs_after: bad.to_string(), ..valid_form() };
            assert_eq!(field_error(&form), CameraField::NumSecsAfter, "{:?}", bad);
        }
        let form = CameraForm { num_secs_after: "30".to_string(), ..valid_form() };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_first_failure_wins() {
        let form = CameraForm {
            name: "x".to_string(),
            url: "nope".to_string(),
            poll_max_fps: "nope".to_string(),
            ..valid_form()
        };
        assert_eq!(field_error(&form), CameraField::Name);
    }

    #[test]
    fn test_enabled_values() {
        for (raw, expected) in [("1", true), ("on", true), ("0", false), ("", false)] {
            let form = CameraForm { enabled: raw.to_string(), ..valid_form() };
            let CameraRequest::Add(settings) = form.validate().unwrap() else {
                panic!("expected add request");
            };
            assert_eq!(settings.enabled, expected);
        }
        let form = CameraForm { enabled: "maybe".to_string(), ..valid_form() };
        assert_eq!(field_error(&form), CameraField::Enabled);
    }

    #[test]
    fn test_form_pairs() {
        let CameraRequest::Add(settings) = valid_form().validate().unwrap() else {
            panic!("expected add request");
        };
        let pairs = settings.form_pairs();
        assert_eq!(pairs[2], ("enabled", "1".to_string()));
        assert_eq!(pairs[5], ("num_secs_after", "2.5".to_string()));
    }
}
