//! Area classification of tagged chains.
//!
//! Whether a closed chain is an area (a building footprint) or a ring-shaped
//! line (a roundabout) is decided by its tags against a reference table of
//! key rules. The table ships embedded and is parsed once per process.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use thiserror::Error;

/// Classification rule for one tag key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AreaRule {
    /// Every value of this key marks an area.
    All,
    /// Only the listed values mark an area.
    Whitelist(HashSet<String>),
    /// Every value except the listed ones marks an area.
    Blacklist(HashSet<String>),
}

impl AreaRule {
    fn matches(&self, value: &str) -> bool {
        match self {
            AreaRule::All => true,
            AreaRule::Whitelist(values) => values.contains(value),
            AreaRule::Blacklist(values) => !values.contains(value),
        }
    }
}

/// A malformed classification table resource.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("area table line {line}: expected `key;rule[;values]`, got {got:?}")]
    Malformed { line: usize, got: String },
    #[error("area table line {line}: unknown rule {rule:?}")]
    UnknownRule { line: usize, rule: String },
}

/// Tag key → classification rule, loaded once at startup.
#[derive(Clone, Debug, Default)]
pub struct AreaTable {
    rules: HashMap<String, AreaRule>,
}

impl AreaTable {
    /// Parse a `key;rule;comma,separated,values` table. The first line is a
    /// header and skipped; keys and values are lower-cased.
    pub fn parse(table: &str) -> Result<Self, TableError> {
        let mut rules = HashMap::new();
        for (ix, line) in table.lines().enumerate().skip(1) {
            let line_no = ix + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let fields: Vec<&str> = trimmed.split(';').collect();
            if fields.len() < 2 || fields.len() > 3 {
                return Err(TableError::Malformed { line: line_no, got: trimmed.to_string() });
            }
            let key = fields[0].trim().to_lowercase();
            let rule_name = fields[1].trim().to_lowercase();
            let values: HashSet<String> = fields
                .get(2)
                .map(|field| {
                    field
                        .split(',')
                        .map(|v| v.trim().to_lowercase())
                        .filter(|v| !v.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let rule = match rule_name.as_str() {
                "all" => AreaRule::All,
                "whitelist" => AreaRule::Whitelist(values),
                "blacklist" => AreaRule::Blacklist(values),
                _ => return Err(TableError::UnknownRule { line: line_no, rule: rule_name }),
            };
            rules.insert(key, rule);
        }
        Ok(Self { rules })
    }

    /// True when the tag pair `key=value` marks a chain as an area.
    /// Unknown keys never match.
    pub fn matches(&self, key: &str, value: &str) -> bool {
        self.rules.get(key).is_some_and(|rule| rule.matches(value))
    }

    /// The embedded reference table.
    pub fn builtin() -> &'static AreaTable {
        static BUILTIN: LazyLock<AreaTable> = LazyLock::new(|| {
            AreaTable::parse(include_str!("../resources/area_features.csv"))
                .expect("embedded area feature table is well-formed")
        });
        &BUILTIN
    }
}
