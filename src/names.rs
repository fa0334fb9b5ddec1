//! Random resource names that satisfy Azure naming rules.
//!
//! Storage account names are the strictest constraint (3-24 lower-case
//! alphanumerics), so every generated suffix is lower-case hex.

use uuid::Uuid;

/// Number of random characters appended to a prefix.
pub const RANDOM_SUFFIX_LEN: usize = 10;

/// Longest name accepted for a storage account.
pub const STORAGE_ACCOUNT_MAX_LEN: usize = 24;

/// Returns `prefix` followed by [`RANDOM_SUFFIX_LEN`] random hex characters.
///
/// The prefix is lower-cased and stripped of anything that is not an ASCII
/// letter or digit.
#[must_use]
pub fn random_name(prefix: &str) -> String {
    let mut name: String = prefix
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_lowercase())
        .collect();
    name.extend(
        Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(RANDOM_SUFFIX_LEN),
    );
    name
}

/// Random storage account name, truncated to the provider limit.
#[must_use]
pub fn random_storage_account_name(prefix: &str) -> String {
    random_name(prefix)
        .chars()
        .take(STORAGE_ACCOUNT_MAX_LEN)
        .collect()
}

/// Checks the storage account naming rule.
#[must_use]
pub fn is_valid_storage_account_name(name: &str) -> bool {
    (3..=STORAGE_ACCOUNT_MAX_LEN).contains(&name.len())
        && name
            .chars()
            .all(|ch| ch.is_ascii_digit() || ch.is_ascii_lowercase())
}

/// Checks the Event Hubs namespace naming rule: 6-50 characters, letters,
/// digits and hyphens, starting with a letter and ending with a letter or
/// digit.
#[must_use]
pub fn is_valid_namespace_name(name: &str) -> bool {
    let starts_with_letter = name.chars().next().is_some_and(|ch| ch.is_ascii_alphabetic());
    let ends_alphanumeric = name
        .chars()
        .next_back()
        .is_some_and(|ch| ch.is_ascii_alphanumeric());
    (6..=50).contains(&name.len())
        && starts_with_letter
        && ends_alphanumeric
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
}

/// Checks the resource group naming rule: 1-90 characters drawn from
/// letters, digits, underscores, hyphens, periods and parentheses, not
/// ending in a period.
#[must_use]
pub fn is_valid_resource_group_name(name: &str) -> bool {
    (1..=90).contains(&name.chars().count())
        && !name.ends_with('.')
        && name
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '(' | ')'))
}
