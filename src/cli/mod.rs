// Command-line definitions.

// The `clap` parser and its subcommands.
pub mod cmd_enums;
// Value parsing for typed flags.
pub mod type_enums;
