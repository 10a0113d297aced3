// Command-line definitions: the clap parser and the typed values it accepts.
pub mod cmd_enums;
pub mod type_enums;
