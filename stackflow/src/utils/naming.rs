//! Name and tag validation.

use crate::errors::{DefinitionCode, DefinitionError};
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static RESOURCE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.\-]{0,99}$").expect("valid regex"));

// Characters accepted in cloud tag keys and values.
#[allow(clippy::expect_used)]
static TAG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}\s_.:/=+\-@]*$").expect("valid regex"));

const MAX_TAG_KEY_LEN: usize = 128;
const MAX_TAG_VALUE_LEN: usize = 256;
const RESERVED_TAG_PREFIX: &str = "aws:";

/// Validates a resource name (pipelines, actions, stacks, subnets).
///
/// Names start with a letter and contain letters, digits, `_`, `.` or `-`.
pub fn validate_resource_name(kind: &str, name: &str) -> Result<(), DefinitionError> {
    if RESOURCE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(DefinitionError::new(
            DefinitionCode::NAME_INVALID,
            format!("Invalid {kind} name '{name}'"),
        )
        .with_resources([name])
        .with_fix_hint("Start with a letter and use only letters, digits, '_', '.' or '-'."))
    }
}

/// Validates one tag key/value pair.
pub fn validate_tag(key: &str, value: &str) -> Result<(), DefinitionError> {
    let invalid = |reason: &str| {
        Err(DefinitionError::new(
            DefinitionCode::TAG_INVALID,
            format!("Invalid tag '{key}={value}': {reason}"),
        )
        .with_resources([key]))
    };

    if key.is_empty() || key.chars().count() > MAX_TAG_KEY_LEN {
        return invalid("key must be 1-128 characters");
    }
    if value.chars().count() > MAX_TAG_VALUE_LEN {
        return invalid("value must be at most 256 characters");
    }
    if key.to_ascii_lowercase().starts_with(RESERVED_TAG_PREFIX) {
        return invalid("the 'aws:' prefix is reserved");
    }
    if !TAG_CHARS.is_match(key) || !TAG_CHARS.is_match(value) {
        return invalid("unsupported characters");
    }
    Ok(())
}
