//! Storage key derivation
//!
//! A storage key is the domain's labels in reverse order, joined with `.`,
//! followed by `_` and the decimal record type:
//!
//! ```text
//! a.example.com  + A (1)     ->  com.example.a_1
//! a.example.com. + AAAA (28) ->  com.example.a_28
//! ```
//!
//! Reversing puts the top-level label first, so keys for one zone share a
//! common prefix and sort together. The type suffix follows the last `_`
//! and is all digits, so a key always splits back into exactly one
//! (name, type) pair.
//!
//! Label case is preserved: `A.Example.com` and `a.example.com` produce
//! different keys.

use crate::{Error, Result};

/// Maximum length of a domain name in presentation form, without the root dot
pub const MAX_NAME_LEN: usize = 253;

/// Maximum length of a single label
pub const MAX_LABEL_LEN: usize = 63;

/// Maximum number of labels a name may carry
pub const MAX_LABELS: usize = 127;

/// Derive the storage key for a (name, record type) pair
///
/// Fails with [`Error::InvalidDomain`] when `name` is not a syntactically
/// valid domain name.
pub fn derive_key(name: &str, rtype: u16) -> Result<String> {
    let mut labels = split_labels(name)?;
    labels.reverse();
    Ok(format!("{}_{}", labels.join("."), rtype))
}

/// Validate a domain name and return its labels in written order
///
/// A single trailing dot (fully qualified form) is accepted and ignored.
/// The root name `.` has no labels and is rejected.
pub fn split_labels(name: &str) -> Result<Vec<&str>> {
    let relative = name.strip_suffix('.').unwrap_or(name);

    if relative.is_empty() {
        return Err(Error::invalid_domain(format!("'{}' has no labels", name)));
    }

    if relative.len() > MAX_NAME_LEN {
        return Err(Error::invalid_domain(format!(
            "{} chars (max {})",
            relative.len(),
            MAX_NAME_LEN
        )));
    }

    let labels: Vec<&str> = relative.split('.').collect();
    if labels.len() > MAX_LABELS {
        return Err(Error::invalid_domain(format!(
            "{} labels (max {})",
            labels.len(),
            MAX_LABELS
        )));
    }

    for label in &labels {
        validate_label(name, label)?;
    }

    Ok(labels)
}

/// Check whether `name` is a syntactically valid domain name
pub fn is_domain_name(name: &str) -> bool {
    split_labels(name).is_ok()
}

fn validate_label(name: &str, label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(Error::invalid_domain(format!("'{}' has an empty label", name)));
    }

    if label.len() > MAX_LABEL_LEN {
        return Err(Error::invalid_domain(format!(
            "label '{}' is {} chars (max {})",
            label,
            label.len(),
            MAX_LABEL_LEN
        )));
    }

    // Underscore is allowed for service labels such as `_acme-challenge`
    if !label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::invalid_domain(format!(
            "label '{}' in '{}' contains invalid characters",
            label, name
        )));
    }

    if label.starts_with('-') || label.ends_with('-') {
        return Err(Error::invalid_domain(format!(
            "label '{}' cannot start or end with a hyphen",
            label
        )));
    }

    Ok(())
}
