use super::command_registry::{
    known_commands, DETAILS_COMMAND, FIELD_COMMANDS, NO_ARG_COMMANDS, PHOTO_COMMAND,
};
use crate::preferences::PreferenceField;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormAction {
    Noop,
    SetField {
        field: PreferenceField,
        value: String,
    },
    ClearField(PreferenceField),
    SetDetails(String),
    SetPhoto(String),
    ClearPhoto,
    Submit,
    Retry,
    Status,
    Reload,
    Options,
    Help,
    Quit,
    Unknown {
        command: String,
        arg: String,
        suggestion: Option<&'static str>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormIntent {
    pub action: FormAction,
    pub raw: String,
}

impl FormIntent {
    fn new(action: FormAction, raw: &str) -> Self {
        Self {
            action,
            raw: raw.to_string(),
        }
    }
}

fn find_field(command: &str) -> Option<PreferenceField> {
    FIELD_COMMANDS
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.field)
}

fn parse_path_arg(arg: &str) -> String {
    if arg.trim().is_empty() {
        return String::new();
    }
    let parts: Vec<String> = match shell_words::split(arg) {
        Ok(parts) => parts.into_iter().filter(|value| !value.is_empty()).collect(),
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    };
    parts.join(" ")
}

fn no_arg_action(command: &str) -> Option<FormAction> {
    if !NO_ARG_COMMANDS.contains(&command) {
        return None;
    }
    Some(match command {
        "clear_photo" => FormAction::ClearPhoto,
        "submit" => FormAction::Submit,
        "retry" => FormAction::Retry,
        "status" => FormAction::Status,
        "reload" => FormAction::Reload,
        "options" => FormAction::Options,
        "help" => FormAction::Help,
        _ => FormAction::Quit,
    })
}

fn suggest_command(command: &str) -> Option<&'static str> {
    let known = known_commands();
    similar::get_close_matches(command, known.as_slice(), 1, 0.6)
        .first()
        .copied()
}

/// Maps one line of session input to a form action. Lines without a leading
/// slash are free-text style details.
pub fn parse_form_intent(text: &str) -> FormIntent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return FormIntent::new(FormAction::Noop, text);
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return FormIntent::new(FormAction::SetDetails(raw_trimmed.to_string()), text);
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return FormIntent::new(FormAction::SetDetails(raw_trimmed.to_string()), text);
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if let Some(field) = find_field(&command) {
        let action = if arg.is_empty() {
            FormAction::ClearField(field)
        } else {
            FormAction::SetField {
                field,
                value: arg.to_string(),
            }
        };
        return FormIntent::new(action, text);
    }

    if command == DETAILS_COMMAND {
        let action = if arg.is_empty() {
            FormAction::ClearField(PreferenceField::ExtraDetails)
        } else {
            FormAction::SetDetails(arg.to_string())
        };
        return FormIntent::new(action, text);
    }

    if command == PHOTO_COMMAND {
        let path = parse_path_arg(arg);
        let action = if path.is_empty() {
            FormAction::ClearPhoto
        } else {
            FormAction::SetPhoto(path)
        };
        return FormIntent::new(action, text);
    }

    if let Some(action) = no_arg_action(&command) {
        return FormIntent::new(action, text);
    }

    let suggestion = suggest_command(&command);
    FormIntent::new(
        FormAction::Unknown {
            command,
            arg: arg.to_string(),
            suggestion,
        },
        text,
    )
}

#[cfg(test)]
mod tests {
    use super::{parse_form_intent, FormAction};
    use crate::preferences::PreferenceField;

    #[test]
    fn parse_field_commands() {
        let intent = parse_form_intent("/body_type Plus Size");
        assert_eq!(
            intent.action,
            FormAction::SetField {
                field: PreferenceField::BodyType,
                value: "Plus Size".to_string(),
            }
        );

        let intent = parse_form_intent("  /OCCASION   wedding ");
        assert_eq!(
            intent.action,
            FormAction::SetField {
                field: PreferenceField::Occasion,
                value: "wedding".to_string(),
            }
        );
        assert_eq!(intent.raw, "  /OCCASION   wedding ");
    }

    #[test]
    fn field_command_without_arg_clears() {
        assert_eq!(
            parse_form_intent("/gender").action,
            FormAction::ClearField(PreferenceField::Gender)
        );
        assert_eq!(
            parse_form_intent("/details").action,
            FormAction::ClearField(PreferenceField::ExtraDetails)
        );
    }

    #[test]
    fn plain_text_becomes_details() {
        assert_eq!(
            parse_form_intent("prefer earth tones, no heels").action,
            FormAction::SetDetails("prefer earth tones, no heels".to_string())
        );
        assert_eq!(parse_form_intent("   ").action, FormAction::Noop);
    }

    #[test]
    fn parse_photo_quoted_path() {
        assert_eq!(
            parse_form_intent("/photo \"/tmp/me at beach.jpg\"").action,
            FormAction::SetPhoto("/tmp/me at beach.jpg".to_string())
        );
        assert_eq!(
            parse_form_intent("/photo me.png").action,
            FormAction::SetPhoto("me.png".to_string())
        );
        assert_eq!(parse_form_intent("/photo").action, FormAction::ClearPhoto);
        assert_eq!(
            parse_form_intent("/clear_photo").action,
            FormAction::ClearPhoto
        );
    }

    #[test]
    fn parse_no_arg_commands() {
        assert_eq!(parse_form_intent("/submit").action, FormAction::Submit);
        assert_eq!(parse_form_intent("/retry").action, FormAction::Retry);
        assert_eq!(parse_form_intent("/status").action, FormAction::Status);
        assert_eq!(parse_form_intent("/reload").action, FormAction::Reload);
        assert_eq!(parse_form_intent("/options").action, FormAction::Options);
        assert_eq!(parse_form_intent("/help").action, FormAction::Help);
        assert_eq!(parse_form_intent("/quit").action, FormAction::Quit);
        assert_eq!(parse_form_intent("/exit").action, FormAction::Quit);
    }

    #[test]
    fn parse_unknown_command_with_hint() {
        assert_eq!(
            parse_form_intent("/submitt now").action,
            FormAction::Unknown {
                command: "submitt".to_string(),
                arg: "now".to_string(),
                suggestion: Some("submit"),
            }
        );
        assert!(matches!(
            parse_form_intent("/zzz").action,
            FormAction::Unknown {
                suggestion: None,
                ..
            }
        ));
    }
}
