use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const PLACEHOLDER_IMAGE_BASE: &str = "https://placehold.co/600x400/png";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutfitSuggestion {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalFashionItem {
    pub year: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    SuggestionList,
    SingleOutfit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedOutfits {
    pub shape: ResponseShape,
    pub suggestions: Vec<OutfitSuggestion>,
    pub historical_fashion: Vec<HistoricalFashionItem>,
}

impl ParsedOutfits {
    /// Fills absent or blank image URLs with position-based placeholders.
    /// Present URLs are left untouched.
    pub fn normalized(mut self) -> Self {
        for (idx, suggestion) in self.suggestions.iter_mut().enumerate() {
            if is_blank(suggestion.image_url.as_deref()) {
                suggestion.image_url = Some(outfit_placeholder_url(idx));
            }
        }
        for item in &mut self.historical_fashion {
            if is_blank(item.image_url.as_deref()) {
                item.image_url = Some(historical_placeholder_url(&item.year));
            }
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutfitParseError {
    #[error("response body is empty")]
    EmptyBody,
    #[error("response body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("unrecognized response shape: {found}")]
    UnrecognizedShape { found: String },
}

/// The upstream contract has shipped two payload shapes; both are accepted.
/// Variants are tried in declaration order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OutfitResponse {
    List {
        outfit_suggestions: Vec<OutfitSuggestion>,
        #[serde(default)]
        historical_fashion: Value,
    },
    Single {
        outfit_description: String,
        #[serde(default)]
        image_url: Option<String>,
    },
}

pub fn parse_outfit_response(body: &str) -> Result<ParsedOutfits, OutfitParseError> {
    if body.trim().is_empty() {
        return Err(OutfitParseError::EmptyBody);
    }
    let value: Value = serde_json::from_str(body)
        .map_err(|err| OutfitParseError::InvalidJson(err.to_string()))?;
    let found = describe_value(&value);
    let response = serde_json::from_value::<OutfitResponse>(value)
        .map_err(|_| OutfitParseError::UnrecognizedShape { found })?;

    Ok(match response {
        OutfitResponse::List {
            outfit_suggestions,
            historical_fashion,
        } => ParsedOutfits {
            shape: ResponseShape::SuggestionList,
            suggestions: outfit_suggestions,
            historical_fashion: historical_items(historical_fashion),
        },
        OutfitResponse::Single {
            outfit_description,
            image_url,
        } => ParsedOutfits {
            shape: ResponseShape::SingleOutfit,
            suggestions: vec![OutfitSuggestion {
                description: outfit_description,
                image_url,
            }],
            historical_fashion: Vec::new(),
        },
    })
}

pub fn outfit_placeholder_url(index: usize) -> String {
    format!(
        "{PLACEHOLDER_IMAGE_BASE}?text=Outfit+Suggestion+{}",
        index + 1
    )
}

pub fn historical_placeholder_url(year: &str) -> String {
    format!(
        "{PLACEHOLDER_IMAGE_BASE}?text={}+Fashion",
        urlencoding::encode(year.trim())
    )
}

// Historical entries are decorative; malformed rows are dropped rather than
// failing the whole response.
fn historical_items(value: Value) -> Vec<HistoricalFashionItem> {
    let Value::Array(rows) = value else {
        return Vec::new();
    };
    rows.into_iter()
        .filter_map(|row| serde_json::from_value::<HistoricalFashionItem>(row).ok())
        .collect()
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Object(obj) if obj.is_empty() => "empty object".to_string(),
        Value::Object(obj) => format!(
            "object with keys [{}]",
            obj.keys().cloned().collect::<Vec<String>>().join(", ")
        ),
        Value::Array(_) => "array".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Null => "null".to_string(),
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(str::trim).map(str::is_empty).unwrap_or(true)
}
