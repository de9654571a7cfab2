//! Known macro values used to fold conditions.

use std::collections::HashMap;
use std::collections::hash_map;

/// Default bound on alias chains followed while substituting identifiers
pub const DEFAULT_RECURSION_LIMIT: usize = 128;

/// What is known about a macro when folding conditions
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MacroValue {
    /// The macro is known not to be defined
    Undefined,
    /// The macro expands to this text: an integer folds, anything else is an alias
    Value(String),
}

impl MacroValue {
    /// Create a value
    pub fn value<S: Into<String>>(text: S) -> Self {
        MacroValue::Value(text.into())
    }

    /// Integer the value stands for, if it is an integer constant
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            MacroValue::Undefined => None,
            MacroValue::Value(text) => parse_integer(text),
        }
    }
}

/// Parse a decimal or `0x` hexadecimal integer, with an optional sign
fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse().ok()?
        }
        None => return None,
    };
    Some(if negative { -value } else { value })
}

/// Known macro definitions used to fold `#if` conditions
///
/// Besides explicit entries, a table can carry name prefixes whose macros are
/// always treated as undefined when tested with `defined` (the kernel's
/// `CONFIG_` options, for instance).
#[derive(Clone, Debug)]
pub struct MacroTable {
    values: HashMap<String, MacroValue>,
    removed_prefixes: Vec<String>,
    recursion_limit: usize,
}

impl Default for MacroTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            removed_prefixes: Vec::new(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Treat every macro starting with `prefix` as undefined
    #[must_use]
    pub fn with_removed_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.removed_prefixes.push(prefix.into());
        self
    }

    /// Bound the number of alias substitutions applied to one identifier
    #[must_use]
    pub const fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Record that `name` expands to `value`
    pub fn define<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.values.insert(name.into(), MacroValue::value(value));
    }

    /// Record that `name` is known to be undefined
    pub fn undefine<N: Into<String>>(&mut self, name: N) {
        self.values.insert(name.into(), MacroValue::Undefined);
    }

    /// Insert an entry, returning the previous one
    pub fn insert<N: Into<String>>(&mut self, name: N, value: MacroValue) -> Option<MacroValue> {
        self.values.insert(name.into(), value)
    }

    /// Look up a macro
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MacroValue> {
        self.values.get(name)
    }

    /// Whether `name` falls under a removed prefix
    #[must_use]
    pub fn is_removed(&self, name: &str) -> bool {
        self.removed_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Removed prefixes, in insertion order
    #[must_use]
    pub fn removed_prefixes(&self) -> &[String] {
        &self.removed_prefixes
    }

    /// Maximum alias chain length followed during substitution
    #[must_use]
    pub const fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    /// Number of explicit entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table has no explicit entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the explicit entries in arbitrary order
    pub fn iter(&self) -> hash_map::Iter<'_, String, MacroValue> {
        self.values.iter()
    }
}

impl<N: Into<String>> FromIterator<(N, MacroValue)> for MacroTable {
    fn from_iter<I: IntoIterator<Item = (N, MacroValue)>>(iter: I) -> Self {
        let mut table = MacroTable::new();
        table.extend(iter);
        table
    }
}

impl<N: Into<String>> Extend<(N, MacroValue)> for MacroTable {
    fn extend<I: IntoIterator<Item = (N, MacroValue)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.values.insert(name.into(), value);
        }
    }
}

impl<'a> IntoIterator for &'a MacroTable {
    type Item = (&'a String, &'a MacroValue);
    type IntoIter = hash_map::Iter<'a, String, MacroValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_values() {
        assert_eq!(MacroValue::value("1").as_int(), Some(1));
        assert_eq!(MacroValue::value("-12").as_int(), Some(-12));
        assert_eq!(MacroValue::value("0x1F").as_int(), Some(31));
        assert_eq!(MacroValue::value("__LP64__").as_int(), None);
        assert_eq!(MacroValue::value("").as_int(), None);
        assert_eq!(MacroValue::Undefined.as_int(), None);
    }

    #[test]
    fn define_and_undefine_overwrite() {
        let mut table = MacroTable::new();
        table.define("A", "1");
        table.undefine("A");
        assert_eq!(table.get("A"), Some(&MacroValue::Undefined));
        assert_eq!(table.len(), 1);
        assert!(table.get("B").is_none());
    }

    #[test]
    fn insert_returns_previous_entry() {
        let mut table = MacroTable::new();
        assert_eq!(table.insert("A", MacroValue::value("1")), None);
        assert_eq!(
            table.insert("A", MacroValue::Undefined),
            Some(MacroValue::value("1"))
        );
        table.define("B", "__LP64__");

        let mut entries: Vec<_> = table.iter().map(|(name, _)| name.as_str()).collect();
        entries.sort_unstable();
        assert_eq!(entries, ["A", "B"]);

        let undefined: Vec<&String> = (&table)
            .into_iter()
            .filter(|(_, value)| **value == MacroValue::Undefined)
            .map(|(name, _)| name)
            .collect();
        assert_eq!(undefined, ["A"]);
    }

    #[test]
    fn removed_prefixes_match_by_prefix() {
        let table = MacroTable::new().with_removed_prefix("CONFIG_");
        assert!(table.is_removed("CONFIG_SMP"));
        assert!(!table.is_removed("MY_CONFIG_SMP"));
    }

    #[test]
    fn collects_from_pairs() {
        let table: MacroTable = [("A", MacroValue::value("1")), ("B", MacroValue::Undefined)]
            .into_iter()
            .collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table.recursion_limit(), DEFAULT_RECURSION_LIMIT);
    }
}
