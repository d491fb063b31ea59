//! Utility functions for identifiers, timestamps and name validation.

mod naming;

pub use naming::{validate_resource_name, validate_tag};

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Generates a new time-ordered run identifier.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::now_v7()
}

/// Returns the current time as an RFC 3339 timestamp with microseconds.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_run_id_is_v7() {
        let id = generate_run_id();
        assert_eq!(id.get_version_num(), 7);
    }

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with("+00:00"));
    }
}
