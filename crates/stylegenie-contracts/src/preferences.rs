use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::{resolve_option, OptionKind, UnknownOption};
use crate::validation::{is_blank, FieldError, ValidationError};

pub const DEFAULT_COUNTRY: &str = "global";
pub const DEFAULT_AGE_RANGE: &str = "adult";

pub const OCCASION_REQUIRED: &str = "Please select an occasion for your outfit";
pub const BODY_TYPE_REQUIRED: &str =
    "Please select your body type to get personalized recommendations";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceField {
    Occasion,
    BodyType,
    Gender,
    Country,
    AgeRange,
    ExtraDetails,
}

impl PreferenceField {
    pub const ALL: [PreferenceField; 6] = [
        PreferenceField::Occasion,
        PreferenceField::BodyType,
        PreferenceField::Gender,
        PreferenceField::Country,
        PreferenceField::AgeRange,
        PreferenceField::ExtraDetails,
    ];

    /// Wire name, also used as the field key in validation errors.
    pub fn name(self) -> &'static str {
        match self {
            PreferenceField::Occasion => "occasion",
            PreferenceField::BodyType => "body_type",
            PreferenceField::Gender => "gender",
            PreferenceField::Country => "country",
            PreferenceField::AgeRange => "age_range",
            PreferenceField::ExtraDetails => "extra_details",
        }
    }

    pub fn option_kind(self) -> Option<OptionKind> {
        match self {
            PreferenceField::Occasion => Some(OptionKind::Occasion),
            PreferenceField::BodyType => Some(OptionKind::BodyType),
            PreferenceField::Gender => Some(OptionKind::Gender),
            PreferenceField::AgeRange => Some(OptionKind::AgeRange),
            PreferenceField::Country | PreferenceField::ExtraDetails => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StylePreferences {
    pub occasion: String,
    pub body_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_details: Option<String>,
    /// A data-URL preview or a remote object-storage URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_reference: Option<String>,
}

impl StylePreferences {
    pub fn new(occasion: impl Into<String>, body_type: impl Into<String>) -> Self {
        Self {
            occasion: occasion.into(),
            body_type: body_type.into(),
            ..Self::default()
        }
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn country(&self) -> &str {
        non_blank(self.country.as_deref()).unwrap_or(DEFAULT_COUNTRY)
    }

    pub fn age_range(&self) -> &str {
        non_blank(self.age_range.as_deref()).unwrap_or(DEFAULT_AGE_RANGE)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut fields = Vec::new();
        if is_blank(Some(&self.occasion)) {
            fields.push(FieldError::new(
                PreferenceField::Occasion.name(),
                OCCASION_REQUIRED,
            ));
        }
        if is_blank(Some(&self.body_type)) {
            fields.push(FieldError::new(
                PreferenceField::BodyType.name(),
                BODY_TYPE_REQUIRED,
            ));
        }
        if fields.is_empty() {
            return Ok(());
        }
        Err(ValidationError { fields })
    }

    /// Sets a field from user input. Enumerated fields must match the
    /// catalog and are stored in their canonical spelling; blank input
    /// clears the field.
    pub fn set_field(&mut self, field: PreferenceField, raw: &str) -> Result<(), UnknownOption> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.clear_field(field);
            return Ok(());
        }
        let value = match field.option_kind() {
            Some(kind) => resolve_option(kind, trimmed)?.value.to_string(),
            None => trimmed.to_string(),
        };
        match field {
            PreferenceField::Occasion => self.occasion = value,
            PreferenceField::BodyType => self.body_type = value,
            PreferenceField::Gender => self.gender = Some(value),
            PreferenceField::Country => self.country = Some(value),
            PreferenceField::AgeRange => self.age_range = Some(value),
            PreferenceField::ExtraDetails => self.extra_details = Some(value),
        }
        Ok(())
    }

    pub fn clear_field(&mut self, field: PreferenceField) {
        match field {
            PreferenceField::Occasion => self.occasion.clear(),
            PreferenceField::BodyType => self.body_type.clear(),
            PreferenceField::Gender => self.gender = None,
            PreferenceField::Country => self.country = None,
            PreferenceField::AgeRange => self.age_range = None,
            PreferenceField::ExtraDetails => self.extra_details = None,
        }
    }

    pub fn field_value(&self, field: PreferenceField) -> Option<&str> {
        match field {
            PreferenceField::Occasion => non_blank(Some(&self.occasion)),
            PreferenceField::BodyType => non_blank(Some(&self.body_type)),
            PreferenceField::Gender => non_blank(self.gender.as_deref()),
            PreferenceField::Country => Some(self.country()),
            PreferenceField::AgeRange => Some(self.age_range()),
            PreferenceField::ExtraDetails => non_blank(self.extra_details.as_deref()),
        }
    }

    /// JSON body for the styling endpoint. Enumerated values are
    /// lower-cased; the photo reference and free-text details are sent
    /// verbatim.
    pub fn request_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        let mut put = |key: &str, value: &str| {
            payload.insert(key.to_string(), Value::String(value.to_string()));
        };
        put("occasion", &self.occasion.trim().to_lowercase());
        put("body_type", &self.body_type.trim().to_lowercase());
        if let Some(gender) = non_blank(self.gender.as_deref()) {
            put("gender", &gender.to_lowercase());
        }
        put("country", &self.country().to_lowercase());
        put("age_range", &self.age_range().to_lowercase());
        if let Some(details) = non_blank(self.extra_details.as_deref()) {
            put("extra_details", details);
        }
        if let Some(photo) = non_blank(self.photo_reference.as_deref()) {
            put("photo", photo);
        }
        payload
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{PreferenceField, StylePreferences, BODY_TYPE_REQUIRED, OCCASION_REQUIRED};

    #[test]
    fn validate_reports_each_missing_field() {
        let err = StylePreferences::new("", "  ").validate().unwrap_err();
        assert_eq!(err.fields.len(), 2);
        assert_eq!(err.message_for("occasion"), Some(OCCASION_REQUIRED));
        assert_eq!(err.message_for("body_type"), Some(BODY_TYPE_REQUIRED));

        let err = StylePreferences::new("wedding", "").validate().unwrap_err();
        assert_eq!(err.fields.len(), 1);
        assert_eq!(err.message_for("occasion"), None);
    }

    #[test]
    fn payload_lowercases_enumerated_fields_and_fills_defaults() {
        let mut prefs = StylePreferences::new("Wedding", "Hourglass").with_gender("Female");
        prefs.photo_reference = Some("https://Bucket.s3.amazonaws.com/Key.JPG".to_string());
        prefs.extra_details = Some("Prefer Navy".to_string());
        let payload = Value::Object(prefs.request_payload());
        assert_eq!(
            payload,
            json!({
                "occasion": "wedding",
                "body_type": "hourglass",
                "gender": "female",
                "country": "global",
                "age_range": "adult",
                "extra_details": "Prefer Navy",
                "photo": "https://Bucket.s3.amazonaws.com/Key.JPG",
            })
        );
    }

    #[test]
    fn payload_omits_absent_optional_fields() {
        let payload = StylePreferences::new("party", "athletic").request_payload();
        assert!(!payload.contains_key("gender"));
        assert!(!payload.contains_key("photo"));
        assert!(!payload.contains_key("extra_details"));
        assert_eq!(payload["country"], json!("global"));
    }

    #[test]
    fn set_field_resolves_catalog_values() {
        let mut prefs = StylePreferences::default();
        prefs.set_field(PreferenceField::BodyType, "Plus_Size").unwrap();
        assert_eq!(prefs.body_type, "plus size");
        prefs.set_field(PreferenceField::Country, " Japan ").unwrap();
        assert_eq!(prefs.country(), "Japan");
        assert!(prefs.set_field(PreferenceField::Occasion, "picnic").is_err());
        assert_eq!(prefs.occasion, "");

        prefs.set_field(PreferenceField::Country, "").unwrap();
        assert_eq!(prefs.country(), "global");
    }
}
