use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub value: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

const fn option(value: &'static str, label: &'static str, description: &'static str) -> OptionSpec {
    OptionSpec {
        value,
        label,
        description,
    }
}

pub const OCCASIONS: &[OptionSpec] = &[
    option("wedding", "Wedding", ""),
    option("party", "Party", ""),
    option("casual", "Casual", ""),
    option("business", "Business", ""),
    option("formal", "Formal", ""),
    option("interview", "Interview", ""),
    option("date night", "Date Night", ""),
];

pub const BODY_TYPES: &[OptionSpec] = &[
    option("athletic", "Athletic", "Muscular build with broad shoulders."),
    option("petite", "Petite", "Shorter frame with small proportions."),
    option("curvy", "Curvy", "Fuller bust and hips with a defined waist."),
    option("tall", "Tall", "Long torso and legs."),
    option("plus size", "Plus Size", "Fuller figure throughout."),
    option("slim", "Slim", "Narrow frame with little curvature."),
    option("average", "Average", "Balanced proportions without a strong emphasis."),
    option(
        "hourglass",
        "Hourglass",
        "Well-proportioned shoulders and hips with a defined waist.",
    ),
    option(
        "pear",
        "Pear",
        "Hips wider than shoulders with a narrower upper body.",
    ),
    option("apple", "Apple", "Fuller mid-section with slimmer legs and shoulders."),
    option(
        "rectangle",
        "Rectangle",
        "Shoulders and hips roughly the same width with a less defined waist.",
    ),
    option(
        "inverted triangle",
        "Inverted Triangle",
        "Shoulders wider than hips with an athletic upper body.",
    ),
];

pub const GENDERS: &[OptionSpec] = &[
    option("female", "Female", ""),
    option("male", "Male", ""),
    option("non-binary", "Non-binary", ""),
];

pub const AGE_RANGES: &[OptionSpec] = &[
    option("teen", "Teen", "13-19 years"),
    option("young-adult", "Young Adult", "20-29 years"),
    option("adult", "Adult", "30-45 years"),
    option("mature", "Mature", "46-60 years"),
    option("senior", "Senior", "60+ years"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Occasion,
    BodyType,
    Gender,
    AgeRange,
}

impl OptionKind {
    pub const ALL: [OptionKind; 4] = [
        OptionKind::Occasion,
        OptionKind::BodyType,
        OptionKind::Gender,
        OptionKind::AgeRange,
    ];

    pub fn label(self) -> &'static str {
        match self {
            OptionKind::Occasion => "occasion",
            OptionKind::BodyType => "body type",
            OptionKind::Gender => "gender",
            OptionKind::AgeRange => "age range",
        }
    }

    pub fn options(self) -> &'static [OptionSpec] {
        match self {
            OptionKind::Occasion => OCCASIONS,
            OptionKind::BodyType => BODY_TYPES,
            OptionKind::Gender => GENDERS,
            OptionKind::AgeRange => AGE_RANGES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind_label} '{value}'{}", hint(.suggestion))]
pub struct UnknownOption {
    pub kind_label: &'static str,
    pub value: String,
    pub suggestion: Option<&'static str>,
}

fn hint(suggestion: &Option<&'static str>) -> String {
    suggestion
        .map(|value| format!("; did you mean '{value}'?"))
        .unwrap_or_default()
}

/// Folds case and treats `-`, `_` and runs of spaces alike, so
/// "Plus-Size", "plus_size" and "plus size" compare equal.
fn comparison_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

pub fn resolve_option(kind: OptionKind, raw: &str) -> Result<&'static OptionSpec, UnknownOption> {
    let key = comparison_key(raw);
    if let Some(spec) = kind
        .options()
        .iter()
        .find(|spec| comparison_key(spec.value) == key)
    {
        return Ok(spec);
    }

    let keys: Vec<String> = kind
        .options()
        .iter()
        .map(|spec| comparison_key(spec.value))
        .collect();
    let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    let suggestion = similar::get_close_matches(key.as_str(), key_refs.as_slice(), 1, 0.6)
        .first()
        .and_then(|matched| {
            kind.options()
                .iter()
                .find(|spec| comparison_key(spec.value) == *matched)
        })
        .map(|spec| spec.value);

    Err(UnknownOption {
        kind_label: kind.label(),
        value: raw.trim().to_string(),
        suggestion,
    })
}
