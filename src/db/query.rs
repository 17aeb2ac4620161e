//! Query builder contract and the backend-neutral state behind it.

use std::cmp::Ordering;

use serde_json::Value;

use crate::db::criteria::{self, CriteriaComponent, CriteriaGroupLogic, Matcher};
use crate::error::Result;

/// A criteria builder scoped to one model type and bound to the storage that
/// created it.
///
/// Builder methods consume and return `self`, so queries chain:
///
/// ```rust,ignore
/// let adults = dao.q()
///     .filter("age >=", &[json!(18)])?
///     .order_by("-age name")
///     .limit(10)
///     .fetch()?;
/// ```
pub trait Query: Sized + Send {
    type Model;

    /// The root predicate group of this query.
    fn criteria(&self) -> &CriteriaComponent;

    /// Adds `component` with AND.
    fn and(self, component: CriteriaComponent) -> Self;

    /// Adds `component` with OR against everything collected so far.
    fn or(self, component: CriteriaComponent) -> Self;

    /// Parses a criteria expression and ANDs every resulting criterion.
    fn filter(self, expression: &str, values: &[Value]) -> Result<Self> {
        Ok(criteria::parse(expression, values)?
            .into_iter()
            .fold(self, |q, c| q.and(c)))
    }

    /// Sort order: fields separated by commas or whitespace, `-field` for
    /// descending.
    fn order_by(self, spec: &str) -> Self;

    fn offset(self, n: usize) -> Self;

    fn limit(self, n: usize) -> Self;

    fn fetch(&self) -> Result<Vec<Self::Model>>;

    fn first(&self) -> Result<Option<Self::Model>>;

    fn count(&self) -> Result<u64>;
}

// ── Sort order ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

pub(crate) fn parse_order(spec: &str) -> Vec<SortKey> {
    spec.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| match t.strip_prefix('-') {
            Some(field) => SortKey { field: field.to_owned(), descending: true },
            None => SortKey { field: t.trim_start_matches('+').to_owned(), descending: false },
        })
        .filter(|k| !k.field.is_empty())
        .collect()
}

// ── QuerySpec ─────────────────────────────────────────────────────────────────

/// Backend-neutral query state: the predicate tree, sort keys and paging.
///
/// Backends embed a `QuerySpec` in their query type and translate it into
/// their own execution (a scan, SQL, a document-store filter).
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySpec {
    pub root: CriteriaComponent,
    pub order: Vec<SortKey>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self::new(CriteriaGroupLogic::And)
    }
}

impl QuerySpec {
    pub fn new(logic: CriteriaGroupLogic) -> Self {
        Self {
            root: CriteriaComponent::Group { logic, components: Vec::new() },
            order: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    /// Starts from `components` joined by `logic`.
    pub fn seeded(logic: CriteriaGroupLogic, components: Vec<CriteriaComponent>) -> Self {
        Self { root: CriteriaComponent::Group { logic, components }, ..Self::new(logic) }
    }

    pub fn push(&mut self, logic: CriteriaGroupLogic, component: CriteriaComponent) {
        match &mut self.root {
            CriteriaComponent::Group { logic: current, components } if *current == logic => {
                components.push(component);
            }
            CriteriaComponent::Group { components, .. } if components.is_empty() => {
                self.root = CriteriaComponent::Group { logic, components: vec![component] };
            }
            _ => {
                let previous = std::mem::replace(&mut self.root, CriteriaComponent::and(Vec::new()));
                self.root = CriteriaComponent::Group { logic, components: vec![previous, component] };
            }
        }
    }

    pub fn set_order(&mut self, spec: &str) {
        self.order = parse_order(spec);
    }

    pub fn matcher(&self) -> Result<Matcher<'_>> {
        self.root.matcher()
    }

    pub fn matches(&self, doc: &Value) -> Result<bool> {
        self.root.matches(doc)
    }

    /// Orders `rows` by the sort keys, then applies offset and limit.
    ///
    /// Values that do not compare (missing field, mixed types) sort last.
    pub fn window<T>(&self, mut rows: Vec<(Value, T)>) -> Vec<T> {
        if !self.order.is_empty() {
            rows.sort_by(|(a, _), (b, _)| {
                for key in &self.order {
                    let ord = sort_values(
                        criteria::lookup(a, &key.field),
                        criteria::lookup(b, &key.field),
                        key.descending,
                    );
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }
        rows.into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .map(|(_, item)| item)
            .collect()
    }
}

fn sort_values(a: Option<&Value>, b: Option<&Value>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = criteria::compare(a, b).unwrap_or(Ordering::Equal);
            if descending { ord.reverse() } else { ord }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_spec_parsing() {
        assert_eq!(parse_order("-age, name +score"), vec![
            SortKey { field: "age".into(), descending: true },
            SortKey { field: "name".into(), descending: false },
            SortKey { field: "score".into(), descending: false },
        ]);
        assert!(parse_order(" - ,").is_empty());
    }

    #[test]
    fn and_then_or_nests_the_previous_root() {
        let mut spec = QuerySpec::default();
        spec.push(CriteriaGroupLogic::And, CriteriaComponent::eq("a", 1));
        spec.push(CriteriaGroupLogic::And, CriteriaComponent::eq("b", 2));
        spec.push(CriteriaGroupLogic::Or, CriteriaComponent::eq("c", 3));

        assert_eq!(spec.root.to_string(), "((a = 1 AND b = 2) OR c = 3)");
        assert!(spec.matches(&json!({ "c": 3 })).unwrap());
        assert!(spec.matches(&json!({ "a": 1, "b": 2 })).unwrap());
        assert!(!spec.matches(&json!({ "a": 1 })).unwrap());
    }

    #[test]
    fn or_on_empty_root_replaces_it() {
        let mut spec = QuerySpec::default();
        spec.push(CriteriaGroupLogic::Or, CriteriaComponent::eq("a", 1));
        assert_eq!(spec.root.to_string(), "(a = 1)");
        assert!(!spec.matches(&json!({ "a": 2 })).unwrap());
    }

    #[test]
    fn window_sorts_then_pages() {
        let mut spec = QuerySpec::default();
        spec.set_order("-age");
        spec.offset = 1;
        spec.limit = Some(2);

        let rows = vec![
            (json!({ "age": 20 }), 'a'),
            (json!({ "age": 40 }), 'b'),
            (json!({}), 'c'),
            (json!({ "age": 30 }), 'd'),
        ];
        assert_eq!(spec.window(rows), vec!['d', 'a']);
    }
}
