//! Namespace context: current namespace plus alias tables.
//!
//! Aliases live in three tables keyed by the use type (`""` for classes,
//! `"const"`, `"function"`). Lookup is case-insensitive except for
//! constants.

use rustc_hash::FxHashMap;

use crate::features::parsing::domain::NameForm;

/// Single-part names that resolve to themselves in const position.
const CONST_PASSTHROUGH: &[&str] = &[
    "INPUT_GET",
    "INPUT_POST",
    "INPUT_COOKIE",
    "INPUT_SERVER",
    "INPUT_ENV",
    "INPUT_SESSION",
    "INPUT_REQUEST",
];

/// Single-part names that resolve to themselves in function position.
const FUNCTION_PASSTHROUGH: &[&str] = &[
    "define",
    "defined",
    "settype",
    "gettype",
    "is_array",
    "is_null",
    "is_bool",
    "is_float",
    "is_int",
    "is_string",
    "is_object",
    "is_resource",
    "var_dump",
    "boolval",
    "intval",
    "floatval",
    "strval",
    "is_numeric",
    "filter_input",
    "filter_input_array",
];

/// Single-part names that resolve to themselves in class/type position.
const CLASS_PASSTHROUGH: &[&str] = &[
    "self", "static", "parent", "int", "float", "bool", "string", "void", "iterable", "mixed",
    "object", "define",
];

pub struct Namespace {
    pub namespace: String,
    aliases: FxHashMap<&'static str, FxHashMap<String, String>>,
}

impl Namespace {
    pub fn new(namespace: impl Into<String>) -> Self {
        let mut aliases = FxHashMap::default();
        aliases.insert("", FxHashMap::default());
        aliases.insert("const", FxHashMap::default());
        aliases.insert("function", FxHashMap::default());
        Self {
            namespace: namespace.into(),
            aliases,
        }
    }

    fn table_key(alias_type: &str) -> &'static str {
        match alias_type.to_lowercase().as_str() {
            "const" => "const",
            "function" => "function",
            _ => "",
        }
    }

    pub fn add_alias(&mut self, alias_type: &str, alias_name: &str, alias: &str) {
        let key = Self::table_key(alias_type);
        let alias = if key == "const" {
            alias.to_string()
        } else {
            alias.to_lowercase()
        };
        if let Some(table) = self.aliases.get_mut(key) {
            table.insert(alias, alias_name.to_string());
        }
    }

    /// Fully qualify a name written as `parts` in the given form.
    pub fn resolve_name(&self, parts: &[String], form: NameForm, alias_type: &str) -> String {
        let joined = parts.join("\\");
        match form {
            NameForm::FullyQualified => joined,
            NameForm::Relative => self.prefixed(&joined),
            NameForm::Normal => {
                if parts.len() == 1 {
                    let part = parts[0].as_str();
                    let lower = part.to_lowercase();
                    if alias_type == "const" {
                        if matches!(lower.as_str(), "true" | "false" | "null")
                            || CONST_PASSTHROUGH.contains(&part)
                        {
                            return part.to_string();
                        }
                    }
                    if alias_type == "function" && FUNCTION_PASSTHROUGH.contains(&lower.as_str()) {
                        return lower;
                    }
                    if alias_type.is_empty() && CLASS_PASSTHROUGH.contains(&lower.as_str()) {
                        return lower;
                    }
                }

                match self.resolve_alias(parts, alias_type) {
                    Some(alias_name) if parts.len() > 1 => {
                        format!("{}\\{}", alias_name, parts[1..].join("\\"))
                    }
                    Some(alias_name) => alias_name,
                    None => self.prefixed(&joined),
                }
            }
        }
    }

    fn prefixed(&self, joined: &str) -> String {
        if self.namespace.is_empty() {
            joined.to_string()
        } else {
            format!("{}\\{}", self.namespace, joined)
        }
    }

    /// Qualified names always resolve their first part against the class
    /// table; constants keep their case.
    fn resolve_alias(&self, parts: &[String], alias_type: &str) -> Option<String> {
        let (key, first) = if parts.len() > 1 {
            ("", parts[0].to_lowercase())
        } else if Self::table_key(alias_type) == "const" {
            ("const", parts[0].clone())
        } else {
            (Self::table_key(alias_type), parts[0].to_lowercase())
        };
        self.aliases.get(key)?.get(&first).cloned()
    }

    /// Namespaced form of a declaration name (`Ns\Decl`).
    pub fn qualify(&self, name: &str) -> String {
        self.prefixed(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_lookup_is_case_insensitive_for_classes() {
        let mut ns = Namespace::new("App");
        ns.add_alias("", "Vendor\\Lib\\Client", "Client");
        let got = ns.resolve_name(&["CLIENT".into()], NameForm::Normal, "");
        assert_eq!(got, "Vendor\\Lib\\Client");
    }

    #[test]
    fn const_aliases_keep_case() {
        let mut ns = Namespace::new("");
        ns.add_alias("const", "Vendor\\FOO", "FOO");
        assert_eq!(
            ns.resolve_name(&["FOO".into()], NameForm::Normal, "const"),
            "Vendor\\FOO"
        );
        // different case: falls back to namespace-relative resolution
        assert_eq!(
            ns.resolve_name(&["foo".into()], NameForm::Normal, "const"),
            "foo"
        );
    }

    #[test]
    fn filter_input_passes_through_unqualified() {
        let ns = Namespace::new("Deep\\Ns");
        assert_eq!(
            ns.resolve_name(&["filter_input".into()], NameForm::Normal, "function"),
            "filter_input"
        );
        assert_eq!(
            ns.resolve_name(&["INPUT_GET".into()], NameForm::Normal, "const"),
            "INPUT_GET"
        );
    }

    #[test]
    fn unknown_names_become_namespace_relative() {
        let ns = Namespace::new("App");
        assert_eq!(
            ns.resolve_name(&["helper".into()], NameForm::Normal, "function"),
            "App\\helper"
        );
        assert_eq!(
            ns.resolve_name(&["X".into(), "Y".into()], NameForm::Normal, ""),
            "App\\X\\Y"
        );
    }
}
