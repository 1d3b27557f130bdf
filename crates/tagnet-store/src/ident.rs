//! Table name resolution for tag keys.
//!
//! Every SQL identifier derived from a caller-supplied key goes through
//! [`table_name_for`], which folds the key to a canonical lowercase form and
//! replaces every non-alphanumeric byte with `_`. No other code path may
//! interpolate keys into DDL or queries.

/// Shared table for environment records, which have no owning tag.
pub const ENVIRONMENT_TABLE: &str = "environment_log";

/// Prefix applied to every per-tag table so names never collide with the
/// bookkeeping tables and never start with a digit.
const TABLE_PREFIX: &str = "tag_";

/// Resolve the table name for a tag key.
///
/// Pure and deterministic: equivalent spellings of the same key (case or
/// separator variations, e.g. `AA:BB:CC` vs `aa-bb-cc`) resolve to the same
/// name, and the result contains only `[a-z0-9_]`.
///
/// # Examples
///
/// ```
/// use tagnet_store::table_name_for;
///
/// assert_eq!(table_name_for("AA:BB:CC:DD:EE:FF"), "tag_aa_bb_cc_dd_ee_ff");
/// assert_eq!(table_name_for("aa-bb-cc-dd-ee-ff"), "tag_aa_bb_cc_dd_ee_ff");
/// ```
#[must_use]
pub fn table_name_for(key: &str) -> String {
    let mut name = String::with_capacity(TABLE_PREFIX.len() + key.len());
    name.push_str(TABLE_PREFIX);
    for c in key.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else {
            name.push('_');
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_keys_distinct_names() {
        let a = table_name_for("AA:BB:CC:DD:EE:01");
        let b = table_name_for("AA:BB:CC:DD:EE:02");
        assert_ne!(a, b);
    }

    #[test]
    fn test_idempotent_and_case_insensitive() {
        let variants = ["AA:BB:CC:DD:EE:FF", "aa:bb:cc:dd:ee:ff", "AA-BB-CC-DD-EE-FF"];
        for v in variants {
            assert_eq!(table_name_for(v), "tag_aa_bb_cc_dd_ee_ff");
        }
        // Applying the normalization to an already-normalized key is a no-op
        assert_eq!(
            table_name_for("aa_bb_cc_dd_ee_ff"),
            table_name_for("AA:BB:CC:DD:EE:FF")
        );
    }

    #[test]
    fn test_whitelist_enforced() {
        let name = table_name_for("x'; DROP TABLE tags;--");
        assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
    }

    #[test]
    fn test_non_ascii_is_normalized() {
        let name = table_name_for("tag\u{00e9}42");
        assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        assert!(name.contains("42"));
    }

    #[test]
    fn test_prefix_keeps_names_out_of_bookkeeping_space() {
        assert!(table_name_for("metadata").starts_with("tag_"));
        assert_ne!(table_name_for("environment_log"), ENVIRONMENT_TABLE);
    }
}
