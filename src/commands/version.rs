// This file handles the `version` command.
// The version is baked in at compile time from `Cargo.toml`.

use crate::libs::utilities::platform::{detect_architecture, detect_os};

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prints the name, version and the platform this binary detects.
pub fn run() -> i32 {
    println!("{NAME} {VERSION} ({}/{})", detect_os(), detect_architecture());
    0
}
