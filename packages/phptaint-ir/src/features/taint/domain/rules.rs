//! Closed rule tables for the taint analysis.
//!
//! All classifiers are exact string sets over identifier names; there is no
//! pattern matching. The sets are fixed at compile time.

use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;

/// Symbolic names carried by superglobal reads.
pub static TAINTED_SYMBOLIC_NAMES: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "globalgets",
        "globalposts",
        "globalrequest",
        "globalfiles",
        "globalcookie",
        "globalservers",
    ]
    .into_iter()
    .collect()
});

/// The superglobal variables themselves, as written in source.
pub static SUPERGLOBAL_VARS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    ["$_GET", "$_POST", "$_REQUEST", "$_FILES", "$_COOKIE", "$_SERVERS"]
        .into_iter()
        .collect()
});

/// Calls whose return value drops taint.
pub static SANITIZER_FUNCTIONS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "intval",
        "floatval",
        "boolval",
        "doubleval",
        "rawurlencode",
        "urlencode",
        "json_encode",
    ]
    .into_iter()
    .collect()
});

/// `filter_var` / `filter_input` filters that count as sanitizing.
pub static SANITIZING_FILTERS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    ["FILTER_SANITIZE_NUMBER_INT", "FILTER_SANITIZE_NUMBER_FLOAT"]
        .into_iter()
        .collect()
});

/// `htmlentities` / `htmlspecialchars` quote-style constants that sanitize.
pub static SANITIZING_ENT_FLAGS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    ["ENT_COMPAT", "ENT_QUOTES", "ENT_NOQUOTES"].into_iter().collect()
});

/// Type assertions that neutralize taint.
pub static SANITIZING_TYPE_ASSERTS: Lazy<FxHashSet<&'static str>> =
    Lazy::new(|| ["int", "float", "bool", "null"].into_iter().collect());

/// Calls that read the full request header set.
pub static HEADER_SOURCE_FUNCTIONS: Lazy<FxHashSet<&'static str>> =
    Lazy::new(|| ["getallheaders", "apache_request_headers"].into_iter().collect());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superglobals_are_always_sources() {
        for var in ["$_GET", "$_POST", "$_REQUEST", "$_FILES", "$_COOKIE", "$_SERVERS"] {
            assert!(SUPERGLOBAL_VARS.contains(var));
        }
    }

    #[test]
    fn classifier_sets_are_closed() {
        assert!(!SANITIZER_FUNCTIONS.contains("htmlspecialchars"));
        assert!(!SANITIZING_FILTERS.contains("FILTER_VALIDATE_EMAIL"));
        assert!(!SANITIZING_TYPE_ASSERTS.contains("string"));
    }
}
