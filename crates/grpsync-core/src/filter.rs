//! Attribute filter tree.
//!
//! Both store boundaries accept the same bounded filter language: AND/OR/NOT
//! combinators over leaf predicates on named properties. The in-memory
//! evaluator here backs the fake remote store and duplicate-suppression
//! queries; SQL-backed stores are free to translate the tree instead.

use chrono::{DateTime, Utc};

use crate::value::Value;

/// Comparison operator for a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
}

/// A filter tree over named properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches everything.
    All,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Leaf comparison against a property value.
    Cmp {
        property: String,
        op: Cmp,
        value: Value,
    },
    /// Property is absent or NULL.
    IsNull(String),
}

impl Filter {
    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Cmp {
            property: property.into(),
            op: Cmp::Eq,
            value: value.into(),
        }
    }

    pub fn ne(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Cmp {
            property: property.into(),
            op: Cmp::Ne,
            value: value.into(),
        }
    }

    pub fn ge(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Cmp {
            property: property.into(),
            op: Cmp::Ge,
            value: value.into(),
        }
    }

    pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Cmp {
            property: property.into(),
            op: Cmp::Lt,
            value: value.into(),
        }
    }

    pub fn contains(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Cmp {
            property: property.into(),
            op: Cmp::Contains,
            value: value.into(),
        }
    }

    pub fn is_null(property: impl Into<String>) -> Self {
        Filter::IsNull(property.into())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Incremental-enumeration predicate: modified since the watermark.
    pub fn modified_since(watermark: DateTime<Utc>) -> Self {
        Filter::ge("last_modified", watermark)
    }

    /// Evaluate against a property lookup.
    pub fn matches<'a, F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<Value> + 'a,
    {
        match self {
            Filter::All => true,
            Filter::And(fs) => fs.iter().all(|f| f.matches(lookup)),
            Filter::Or(fs) => fs.iter().any(|f| f.matches(lookup)),
            Filter::Not(f) => !f.matches(lookup),
            Filter::IsNull(prop) => lookup(prop).map_or(true, |v| v.is_null()),
            Filter::Cmp {
                property,
                op,
                value,
            } => {
                let Some(actual) = lookup(property) else {
                    return false;
                };
                compare(&actual, *op, value)
            }
        }
    }
}

fn compare(actual: &Value, op: Cmp, expected: &Value) -> bool {
    match op {
        Cmp::Eq => actual == expected,
        Cmp::Ne => actual != expected,
        Cmp::Contains => match (actual, expected) {
            (Value::Text(a), Value::Text(b)) => a.contains(b.as_str()),
            _ => false,
        },
        Cmp::Gt | Cmp::Ge | Cmp::Lt | Cmp::Le => {
            let Some(ord) = partial_order(actual, expected) else {
                return false;
            };
            match op {
                Cmp::Gt => ord.is_gt(),
                Cmp::Ge => ord.is_ge(),
                Cmp::Lt => ord.is_lt(),
                Cmp::Le => ord.is_le(),
                _ => unreachable!(),
            }
        }
    }
}

fn partial_order(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
        (Value::Date(a), Value::Date(b)) => a.partial_cmp(b),
        (Value::DateTime(a), Value::DateTime(b)) => a.partial_cmp(b),
        (Value::DateTime(a), Value::Date(b)) => a.date_naive().partial_cmp(b),
        (Value::Date(a), Value::DateTime(b)) => a.partial_cmp(&b.date_naive()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn props(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn lookup(map: &BTreeMap<String, Value>) -> impl Fn(&str) -> Option<Value> + '_ {
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_and_or_not() {
        let map = props(&[("a", Value::Int(1)), ("b", Value::Text("x".into()))]);
        let f = Filter::and(vec![
            Filter::eq("a", 1i64),
            Filter::or(vec![Filter::eq("b", "y"), Filter::eq("b", "x")]),
        ]);
        assert!(f.matches(&lookup(&map)));
        assert!(!Filter::not(f).matches(&lookup(&map)));
    }

    #[test]
    fn test_is_null_matches_absent_and_null() {
        let map = props(&[("a", Value::Null)]);
        let l = lookup(&map);
        assert!(Filter::is_null("a").matches(&l));
        assert!(Filter::is_null("missing").matches(&l));
    }

    #[test]
    fn test_modified_since() {
        let wm = Utc::now();
        let map = props(&[("last_modified", Value::DateTime(wm + chrono::Duration::hours(1)))]);
        assert!(Filter::modified_since(wm).matches(&lookup(&map)));

        let stale = props(&[("last_modified", Value::DateTime(wm - chrono::Duration::hours(1)))]);
        assert!(!Filter::modified_since(wm).matches(&lookup(&stale)));
    }

    #[test]
    fn test_contains() {
        let map = props(&[("subject", Value::Text("weekly standup".into()))]);
        assert!(Filter::contains("subject", "standup").matches(&lookup(&map)));
        assert!(!Filter::contains("subject", "review").matches(&lookup(&map)));
    }

    #[test]
    fn test_missing_property_fails_comparison() {
        let map = props(&[]);
        assert!(!Filter::eq("a", 1i64).matches(&lookup(&map)));
    }
}
