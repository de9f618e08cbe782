use crate::preferences::PreferenceField;

#[derive(Clone, Copy, Debug)]
pub(crate) struct FieldCommand {
    pub command: &'static str,
    pub field: PreferenceField,
}

pub(crate) const FIELD_COMMANDS: &[FieldCommand] = &[
    FieldCommand {
        command: "occasion",
        field: PreferenceField::Occasion,
    },
    FieldCommand {
        command: "body_type",
        field: PreferenceField::BodyType,
    },
    FieldCommand {
        command: "gender",
        field: PreferenceField::Gender,
    },
    FieldCommand {
        command: "country",
        field: PreferenceField::Country,
    },
    FieldCommand {
        command: "age_range",
        field: PreferenceField::AgeRange,
    },
];

pub(crate) const DETAILS_COMMAND: &str = "details";
pub(crate) const PHOTO_COMMAND: &str = "photo";

pub(crate) const NO_ARG_COMMANDS: &[&str] = &[
    "clear_photo",
    "submit",
    "retry",
    "status",
    "reload",
    "options",
    "help",
    "quit",
    "exit",
];

pub const SESSION_HELP_COMMANDS: &[&str] = &[
    "/occasion",
    "/body_type",
    "/gender",
    "/country",
    "/age_range",
    "/details",
    "/photo",
    "/clear_photo",
    "/submit",
    "/retry",
    "/status",
    "/reload",
    "/options",
    "/help",
    "/quit",
];

pub(crate) fn known_commands() -> Vec<&'static str> {
    FIELD_COMMANDS
        .iter()
        .map(|spec| spec.command)
        .chain([DETAILS_COMMAND, PHOTO_COMMAND])
        .chain(NO_ARG_COMMANDS.iter().copied())
        .collect()
}
