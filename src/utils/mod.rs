//! Naming helpers shared by the graph builder and the template compiler.
//!
//! The external DAG engine requires DNS-1123 label-safe identifiers, so every
//! task, template and chart name funnels through these functions. The same
//! normalization must be applied at generation time and at status-lookup time.

use crate::constants::{DNS1123_NAME_MAX_LEN, SUBCHART_NAME_MAX_LEN};
use sha2::{Digest, Sha256};

/// Normalize a name into a DNS-1123 compatible label.
pub fn to_dns1123(input: &str) -> String {
    input.replace('_', "-").to_lowercase()
}

/// Normalize every entry of a slice into DNS-1123 compatible labels.
pub fn slice_to_dns1123(input: &[String]) -> Vec<String> {
    input.iter().map(|s| to_dns1123(s)).collect()
}

/// Truncate a string to at most `max_len` characters.
pub fn truncate(input: &str, max_len: usize) -> String {
    input.chars().take(max_len).collect()
}

/// Hex-encoded SHA-256 of the input.
pub fn get_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derive the staged chart name for a subchart of an application.
///
/// The application name is hashed so that two applications embedding a
/// subchart of the same name stage distinct charts. The subchart name is
/// truncated first and the hash fills the remaining DNS-1123 budget, so the
/// result never exceeds 63 characters for any input lengths.
pub fn get_subchart_name(app_name: &str, subchart_name: &str) -> String {
    let subchart_name = truncate(subchart_name, SUBCHART_NAME_MAX_LEN);
    let hashed = truncate(
        &get_hash(app_name),
        DNS1123_NAME_MAX_LEN - subchart_name.chars().count() - 1,
    );
    to_dns1123(&format!("{hashed}-{subchart_name}"))
}

/// Task node name for a chart deployed within an application.
pub fn get_task_name(app_name: &str, task_name: &str) -> String {
    format!("{app_name}-{task_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_to_dns1123() {
        assert_eq!(to_dns1123("my_chart_name"), "my-chart-name");
        assert_eq!(to_dns1123("MixedCase_Name"), "mixedcase-name");
        assert_eq!(to_dns1123("already-safe"), "already-safe");
    }

    #[test]
    fn test_get_subchart_name_empty_inputs() {
        let name = get_subchart_name("", "");
        assert_eq!(name, format!("{}-", truncate(&get_hash(""), 62)));
        assert_eq!(name.chars().count(), 63);
    }

    #[test]
    fn test_get_subchart_name_short_subchart() {
        let name = get_subchart_name("app", "mychart");
        assert_eq!(name, format!("{}-mychart", truncate(&get_hash("app"), 55)));
    }

    #[test]
    fn test_get_subchart_name_long_subchart_is_truncated() {
        let long = "thisismychart-withbigname-greaterthan53chars0987654321abcde";
        let name = get_subchart_name("app", long);
        assert!(name.ends_with(&truncate(long, SUBCHART_NAME_MAX_LEN)));
        assert_eq!(name.chars().count(), DNS1123_NAME_MAX_LEN);
    }

    #[test]
    fn test_get_subchart_name_is_deterministic() {
        assert_eq!(
            get_subchart_name("bookinfo", "reviews"),
            get_subchart_name("bookinfo", "reviews")
        );
        assert_ne!(
            get_subchart_name("bookinfo", "reviews"),
            get_subchart_name("other", "reviews")
        );
    }

    proptest! {
        #[test]
        fn prop_subchart_name_is_bounded_and_label_safe(
            app in ".{0,100}",
            sub in "[a-z0-9_-]{0,100}",
        ) {
            let name = get_subchart_name(&app, &sub);
            prop_assert!(name.chars().count() <= DNS1123_NAME_MAX_LEN);
            prop_assert!(!name.contains('_'));
            prop_assert_eq!(name.clone(), name.to_lowercase());
        }
    }
}
