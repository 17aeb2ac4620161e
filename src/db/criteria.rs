//! Criteria predicates and the field-list expression language.
//!
//! A criteria expression names the fields to filter on. Values are supplied
//! positionally, one per field:
//!
//! ```rust
//! use actio::db::criteria;
//! use serde_json::json;
//!
//! let parsed = criteria::parse("name, age >=", &[json!("alice"), json!(30)]).unwrap();
//! assert_eq!(parsed.len(), 2);
//! ```
//!
//! Fields are separated by any run of `,`, whitespace, `;` or `:`. An operator
//! may be attached to the field (`age>=`) or follow it as its own token
//! (`age >=`, `name like`). A field with no operator means equality.

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};

// ── Operator ──────────────────────────────────────────────────────────────────

/// Comparison applied between a document field and a criteria value.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    /// SQL-style pattern match: `%` any run, `_` any single char.
    Like,
    /// Field value is one of the values in an array.
    In,
    NotIn,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq    => "=",
            Self::Ne    => "!=",
            Self::Lt    => "<",
            Self::Lte   => "<=",
            Self::Gt    => ">",
            Self::Gte   => ">=",
            Self::Like  => "LIKE",
            Self::In    => "IN",
            Self::NotIn => "NOT IN",
        }
    }

    fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "=" | "==" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Ne),
            "<"  => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            ">"  => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "~"  => Some(Self::Like),
            _    => None,
        }
    }

    fn from_word(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eq"             => Some(Self::Eq),
            "ne"             => Some(Self::Ne),
            "lt"             => Some(Self::Lt),
            "lte"            => Some(Self::Lte),
            "gt"             => Some(Self::Gt),
            "gte"            => Some(Self::Gte),
            "like"           => Some(Self::Like),
            "in"             => Some(Self::In),
            "nin" | "notin"  => Some(Self::NotIn),
            _                => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Group logic ───────────────────────────────────────────────────────────────

/// How the members of a [`CriteriaComponent::Group`] combine.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CriteriaGroupLogic {
    And,
    Or,
}

impl fmt::Display for CriteriaGroupLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "AND",
            Self::Or  => "OR",
        })
    }
}

// ── CriteriaComponent ─────────────────────────────────────────────────────────

/// A node of the predicate tree: either a single field comparison or a group
/// of components joined by AND / OR.
#[derive(Clone, Debug, PartialEq)]
pub enum CriteriaComponent {
    Criterion {
        field: String,
        operator: Operator,
        value: Value,
    },
    Group {
        logic: CriteriaGroupLogic,
        components: Vec<CriteriaComponent>,
    },
}

impl CriteriaComponent {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self::Criterion { field: field.into(), operator, value: value.into() }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gte, value)
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(field, Operator::Like, Value::String(pattern.into()))
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(field, Operator::In, Value::Array(values.into_iter().map(Into::into).collect()))
    }

    pub fn not_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(field, Operator::NotIn, Value::Array(values.into_iter().map(Into::into).collect()))
    }

    pub fn and(components: impl IntoIterator<Item = CriteriaComponent>) -> Self {
        Self::Group { logic: CriteriaGroupLogic::And, components: components.into_iter().collect() }
    }

    pub fn or(components: impl IntoIterator<Item = CriteriaComponent>) -> Self {
        Self::Group { logic: CriteriaGroupLogic::Or, components: components.into_iter().collect() }
    }

    /// Prepares this predicate for evaluation over many documents.
    ///
    /// Every LIKE pattern in the tree is compiled here, once. A pattern that
    /// does not compile is an [`Error::Expression`].
    pub fn matcher(&self) -> Result<Matcher<'_>> {
        Node::compile(self).map(Matcher)
    }

    /// Evaluates this predicate against a single JSON document.
    pub fn matches(&self, doc: &Value) -> Result<bool> {
        Ok(self.matcher()?.matches(doc))
    }
}

impl fmt::Display for CriteriaComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Criterion { field, operator, value } => write!(f, "{field} {operator} {value}"),
            Self::Group { logic, components } => {
                f.write_str("(")?;
                for (i, c) in components.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {logic} ")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str(")")
            }
        }
    }
}

// ── Matcher ───────────────────────────────────────────────────────────────────

/// A [`CriteriaComponent`] tree with its LIKE patterns compiled.
///
/// Fields may address nested objects with dots (`address.city`). An empty
/// AND group matches everything; an empty OR group matches nothing.
#[derive(Debug)]
pub struct Matcher<'a>(Node<'a>);

impl Matcher<'_> {
    pub fn matches(&self, doc: &Value) -> bool {
        self.0.matches(doc)
    }
}

#[derive(Debug)]
enum Node<'a> {
    Criterion {
        field: &'a str,
        operator: Operator,
        value: &'a Value,
        pattern: Option<Regex>,
    },
    All(Vec<Node<'a>>),
    Any(Vec<Node<'a>>),
}

impl<'a> Node<'a> {
    fn compile(component: &'a CriteriaComponent) -> Result<Self> {
        match component {
            CriteriaComponent::Criterion { field, operator, value } => {
                let pattern = match (operator, value) {
                    (Operator::Like, Value::String(p)) => Some(like_regex(p)?),
                    _ => None,
                };
                Ok(Self::Criterion { field, operator: *operator, value, pattern })
            }
            CriteriaComponent::Group { logic, components } => {
                let nodes = components.iter().map(Self::compile).collect::<Result<Vec<_>>>()?;
                Ok(match logic {
                    CriteriaGroupLogic::And => Self::All(nodes),
                    CriteriaGroupLogic::Or  => Self::Any(nodes),
                })
            }
        }
    }

    fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::Criterion { field, operator, value, pattern } => {
                evaluate(lookup(doc, field), *operator, value, pattern.as_ref())
            }
            Self::All(nodes) => nodes.iter().all(|n| n.matches(doc)),
            Self::Any(nodes) => nodes.iter().any(|n| n.matches(doc)),
        }
    }
}

// ── Expression parsing ────────────────────────────────────────────────────────

fn is_separator(c: char) -> bool {
    c == ',' || c == ';' || c == ':' || c.is_whitespace()
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '=' | '!' | '<' | '>' | '~')
}

fn field_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$")
            .expect("static field-name pattern")
    })
}

fn check_field(name: &str) -> Result<()> {
    if field_name_regex().is_match(name) {
        Ok(())
    } else {
        Err(Error::Expression(format!("`{name}` is not a valid field name")))
    }
}

fn symbol(token: &str) -> Result<Operator> {
    Operator::from_symbol(token)
        .ok_or_else(|| Error::Expression(format!("unknown operator `{token}`")))
}

/// Splits an expression into `(field, operator)` pairs without binding values.
pub fn fields(expression: &str) -> Result<Vec<(String, Operator)>> {
    let mut specs: Vec<(String, Option<Operator>)> = Vec::new();

    for token in expression.split(is_separator).filter(|t| !t.is_empty()) {
        if token.starts_with(is_operator_char) {
            let op = symbol(token)?;
            match specs.last_mut() {
                Some((_, slot @ None)) => *slot = Some(op),
                _ => {
                    return Err(Error::Expression(format!(
                        "operator `{token}` has no field before it"
                    )));
                }
            }
            continue;
        }

        if let Some(op) = Operator::from_word(token) {
            if let Some((_, slot @ None)) = specs.last_mut() {
                *slot = Some(op);
                continue;
            }
        }

        match token.find(is_operator_char) {
            Some(at) => {
                let (name, op) = token.split_at(at);
                check_field(name)?;
                specs.push((name.to_owned(), Some(symbol(op)?)));
            }
            None => {
                check_field(token)?;
                specs.push((token.to_owned(), None));
            }
        }
    }

    if specs.is_empty() {
        return Err(Error::Expression("no field specified".into()));
    }

    Ok(specs
        .into_iter()
        .map(|(field, op)| (field, op.unwrap_or(Operator::Eq)))
        .collect())
}

/// Parses `expression` and binds `values` positionally, one per field.
///
/// Fails with [`Error::Arity`] when the value count differs from the field
/// count.
pub fn parse(expression: &str, values: &[Value]) -> Result<Vec<CriteriaComponent>> {
    let specs = fields(expression)?;
    if specs.len() != values.len() {
        return Err(Error::Arity { expected: specs.len(), actual: values.len() });
    }
    Ok(specs
        .into_iter()
        .zip(values.iter().cloned())
        .map(|((field, operator), value)| CriteriaComponent::Criterion { field, operator, value })
        .collect())
}

/// Like [`parse`], wrapping the result in a single group.
pub fn parse_group(
    logic: CriteriaGroupLogic,
    expression: &str,
    values: &[Value],
) -> Result<CriteriaComponent> {
    Ok(CriteriaComponent::Group { logic, components: parse(expression, values)? })
}

// ── Evaluation ────────────────────────────────────────────────────────────────

pub(crate) fn lookup<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    field.split('.').try_fold(doc, |node, part| node.get(part))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn members(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}

fn evaluate(actual: Option<&Value>, op: Operator, expected: &Value, pattern: Option<&Regex>) -> bool {
    let Some(actual) = actual else {
        return matches!(op, Operator::Ne | Operator::NotIn);
    };
    match op {
        Operator::Eq    => values_equal(actual, expected),
        Operator::Ne    => !values_equal(actual, expected),
        Operator::Lt    => compare(actual, expected) == Some(Ordering::Less),
        Operator::Lte   => matches!(compare(actual, expected), Some(Ordering::Less | Ordering::Equal)),
        Operator::Gt    => compare(actual, expected) == Some(Ordering::Greater),
        Operator::Gte   => matches!(compare(actual, expected), Some(Ordering::Greater | Ordering::Equal)),
        Operator::In    => members(expected).iter().any(|v| values_equal(actual, v)),
        Operator::NotIn => !members(expected).iter().any(|v| values_equal(actual, v)),
        Operator::Like  => match (actual, pattern) {
            (Value::String(s), Some(re)) => re.is_match(s),
            _ => false,
        },
    }
}

/// Translates a SQL `LIKE` pattern into an anchored regex.
fn like_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push_str("(?s)^");
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            _ => re.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    re.push('$');
    Regex::new(&re)
        .map_err(|e| Error::Expression(format!("LIKE pattern `{pattern}` does not compile: {e}")))
}
