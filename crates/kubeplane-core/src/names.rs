//! Resource name validation.
//!
//! Cluster and node pool names end up in provider resource names, tags and
//! Kubernetes labels, so they are restricted to the intersection of what all
//! three providers accept.

use crate::error::{CoreError, Result};

const MAX_NAME_LEN: usize = 63;

/// Validate a cluster or node pool name.
///
/// Names must be 1-63 characters of lowercase ASCII letters, digits and
/// hyphens, start with a letter and not end with a hyphen.
///
/// # Errors
///
/// Returns `CoreError::InvalidName` describing the first rule violated.
pub fn validate_name(kind: &'static str, name: &str) -> Result<()> {
    let invalid = |reason| {
        Err(CoreError::InvalidName {
            kind,
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return invalid("must be 1-63 characters");
    }
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return invalid("must start with a lowercase letter");
    }
    if name.ends_with('-') {
        return invalid("must not end with a hyphen");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return invalid("must contain only lowercase letters, digits, or hyphens");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_names() {
        assert!(validate_name("cluster", "c1").is_ok());
        assert!(validate_name("cluster", "prod-gpu-2").is_ok());
        assert!(validate_name("node pool", &"a".repeat(63)).is_ok());
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(validate_name("cluster", "").is_err());
        assert!(validate_name("cluster", "1abc").is_err());
        assert!(validate_name("cluster", "abc-").is_err());
        assert!(validate_name("cluster", "Abc").is_err());
        assert!(validate_name("cluster", "a_b").is_err());
        assert!(validate_name("cluster", &"a".repeat(64)).is_err());
    }

    #[test]
    fn error_names_the_kind() {
        let err = validate_name("node pool", "bad_name").unwrap_err();
        assert!(err.to_string().contains("node pool"));
    }
}
