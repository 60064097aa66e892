use crate::libs::preflight::CheckKind;
use std::str::FromStr;

/// Implementation of string parsing for CheckKind enum.
/// Allows `--skip-preflight privilege,disk` to be parsed into strongly-typed values.
impl FromStr for CheckKind {
    type Err = String;

    /// Parses a string into a CheckKind enum variant.
    ///
    /// # Arguments
    /// * `s` - The string to parse (case-insensitive)
    ///
    /// # Returns
    /// * `Ok(CheckKind)` if the string names a preflight check
    /// * `Err(String)` with error message if no match found
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "privilege" | "root" => Ok(CheckKind::Privilege),
            "connectivity" | "network" => Ok(CheckKind::Connectivity),
            "disk" | "storage" => Ok(CheckKind::Disk),
            _ => {
                let valid_checks = ["privilege", "connectivity", "disk"].join(", ");
                Err(format!(
                    "Invalid preflight check '{s}'. Must be one of: {valid_checks}",
                ))
            }
        }
    }
}
