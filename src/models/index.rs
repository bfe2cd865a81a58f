//! Index and ordering types
//!
//! An [`Index`] is one secondary lookup path: an ordered list of
//! field/value pairs. [`OrderBys`] only order results and never take part
//! in key derivation.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Partial field map used by `update`. Keys may be dotted paths
/// (`"addr.country"`, `"tags.0.name"`).
pub type Fields = serde_json::Map<String, Value>;

// == Index ==
/// Ordered mapping of field name to value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Index(Vec<(String, Value)>);

impl Index {
    /// Creates a single-field index.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self(vec![(field.into(), value.into())])
    }

    /// Appends another field, keeping declaration order.
    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.0.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.0.push((field, value)),
        }
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(f, v)| (f.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the field names, in order, are exactly `shape`.
    pub fn has_shape(&self, shape: &[&str]) -> bool {
        self.0.len() == shape.len() && self.0.iter().zip(shape).all(|((f, _), s)| f == s)
    }

    /// True when every field of the index holds its value in `doc`.
    pub fn matches(&self, doc: &Value) -> bool {
        self.fields()
            .all(|(field, value)| lookup_path(doc, field) == Some(value))
    }
}

/// Renders an index value the way it appears inside a cache key.
///
/// Strings are written raw, everything else as its JSON text.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// == Indexes ==
/// The set of indexes an entity declares.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Indexes(Vec<Index>);

impl Indexes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, index: Index) {
        if !self.0.contains(&index) {
            self.0.push(index);
        }
    }

    /// Union of two index sets, first-seen order, duplicates dropped.
    pub fn merge(mut self, other: Indexes) -> Self {
        for index in other.0 {
            self.push(index);
        }
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Index> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Index> for Indexes {
    fn from_iter<I: IntoIterator<Item = Index>>(iter: I) -> Self {
        let mut indexes = Indexes::new();
        for index in iter {
            indexes.push(index);
        }
        indexes
    }
}

impl<'a> IntoIterator for &'a Indexes {
    type Item = &'a Index;
    type IntoIter = std::slice::Iter<'a, Index>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// == Ordering ==
/// One sort criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub asc: bool,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            asc: true,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            asc: false,
        }
    }
}

/// Ordered list of sort criteria, most significant first.
pub type OrderBys = Vec<OrderBy>;

/// Resolves a dotted path (`"addr.country"`, `"tags.0.name"`) inside a JSON value.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Total order over JSON values: missing/null < bool < number < string.
/// Arrays and objects compare by their JSON text.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) if rank(a) == rank(b) && rank(a) >= 4 => {
            x.to_string().cmp(&y.to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Compares two JSON documents under a list of sort criteria.
pub fn compare_by(a: &Value, b: &Value, order_bys: &[OrderBy]) -> Ordering {
    for order in order_bys {
        let ord = compare_values(lookup_path(a, &order.field), lookup_path(b, &order.field));
        let ord = if order.asc { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_shape_is_order_sensitive() {
        let index = Index::new("a", 1).and("b", 2);
        assert!(index.has_shape(&["a", "b"]));
        assert!(!index.has_shape(&["b", "a"]));
        assert!(!index.has_shape(&["a"]));
    }

    #[test]
    fn test_index_matches_document() {
        let doc = json!({"name": "a", "addr": {"city": "paris"}, "age": 30});
        assert!(Index::new("name", "a").and("addr.city", "paris").matches(&doc));
        assert!(!Index::new("age", 31).matches(&doc));
        assert!(!Index::new("missing", "x").matches(&doc));
    }

    #[test]
    fn test_index_keeps_declaration_order() {
        let index = Index::new("org", "acme").and("email", "a@b.c");
        let fields: Vec<&str> = index.fields().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["org", "email"]);
    }

    #[test]
    fn test_index_and_overwrites_same_field() {
        let index = Index::new("name", "a").and("name", "b");
        assert_eq!(index.len(), 1);
        assert_eq!(index.fields().next().unwrap().1, &json!("b"));
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("Alice")), "Alice");
        assert_eq!(render_value(&json!(42)), "42");
        assert_eq!(render_value(&json!(true)), "true");
        assert_eq!(render_value(&Value::Null), "null");
    }

    #[test]
    fn test_indexes_merge_dedupes() {
        let old: Indexes = vec![Index::new("name", "a"), Index::new("email", "x")]
            .into_iter()
            .collect();
        let new: Indexes = vec![Index::new("email", "x"), Index::new("name", "b")]
            .into_iter()
            .collect();

        let merged = old.merge(new);
        assert_eq!(merged.len(), 3);
        let names: Vec<String> = merged
            .iter()
            .map(|i| render_value(i.fields().next().unwrap().1))
            .collect();
        assert_eq!(names, vec!["a", "x", "b"]);
    }

    #[test]
    fn test_lookup_path_nested() {
        let doc = json!({"addr": {"country": "uae"}, "tags": [{"name": "gg"}]});
        assert_eq!(lookup_path(&doc, "addr.country"), Some(&json!("uae")));
        assert_eq!(lookup_path(&doc, "tags.0.name"), Some(&json!("gg")));
        assert_eq!(lookup_path(&doc, "tags.3.name"), None);
        assert_eq!(lookup_path(&doc, "missing"), None);
    }

    #[test]
    fn test_compare_values_ranks() {
        assert_eq!(compare_values(None, Some(&json!(false))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(1.5)), Some(&json!(1))), Ordering::Greater);
        assert_eq!(compare_values(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
        assert_eq!(compare_values(Some(&json!(99)), Some(&json!("0"))), Ordering::Less);
    }

    #[test]
    fn test_compare_by_multiple_criteria() {
        let a = json!({"org": "acme", "age": 30});
        let b = json!({"org": "acme", "age": 40});
        let order = vec![OrderBy::asc("org"), OrderBy::desc("age")];
        assert_eq!(compare_by(&a, &b, &order), Ordering::Greater);
        assert_eq!(compare_by(&a, &a, &order), Ordering::Equal);
    }
}
