//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a project identifier as developers write them
    pub fn project_id() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 _.-]{0,24}"
    }

    /// Generate a resource instance name
    pub fn resource_name() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9_-]{0,31}"
    }

    /// Generate a display name that may carry `§` color codes
    pub fn display_name() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                "[A-Za-z0-9 ]{1,8}",
                "[0-9a-fk-or]".prop_map(|code| format!("§{code}")),
            ],
            1..6,
        )
        .prop_map(|parts| parts.concat())
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_project_id_generator(id in project_id()) {
            prop_assert!(!id.is_empty());
            prop_assert!(id.chars().next().is_some_and(|c| c.is_ascii_alphabetic()));
        }

        #[test]
        fn test_resource_name_generator(name in resource_name()) {
            prop_assert!(!name.is_empty());
            prop_assert!(name.len() <= 32);
        }

        #[test]
        fn test_display_name_generator(name in display_name()) {
            prop_assert!(!name.is_empty());
        }
    }
}
