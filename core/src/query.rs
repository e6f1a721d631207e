use serde::{Deserialize, Serialize};

/// Comparison operator of a leaf [`QueryFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
}

/// Combinator of a [`LogicalGroup`]. `Not` groups always hold exactly one
/// condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A bound value for a [`QueryFilter`]. `Null` drives the `IS NULL`
/// translation for `Operator::Eq`; `List` is used with `Operator::In`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<QueryValue>),
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl QueryValue {
    /// Truthiness used when coercing a boolean filter's bound value:
    /// `true`, `"true"`, `1`, `"1"` are truthy, everything else is falsy.
    pub fn as_bool_lenient(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => n.as_i64() == Some(1) || n.as_f64() == Some(1.0),
            Self::String(s) => s == "true" || s == "1",
            Self::Null | Self::List(_) => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// A leaf predicate: `field operator value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryFilter {
    pub operator: Operator,
    pub field: String,
    pub value: QueryValue,
}

/// A nested group of conditions, combined with `AND`/`OR`, or a single
/// negated condition (`NOT`). Never emitted with an empty `conditions` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalGroup {
    pub operator: LogicalOperator,
    pub conditions: Vec<QueryCondition>,
}

/// A node of the query condition tree: either a leaf predicate or a nested
/// logical group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryCondition {
    Filter(QueryFilter),
    Group(LogicalGroup),
}

impl From<QueryFilter> for QueryCondition {
    fn from(filter: QueryFilter) -> Self {
        Self::Filter(filter)
    }
}

impl From<LogicalGroup> for QueryCondition {
    fn from(group: LogicalGroup) -> Self {
        Self::Group(group)
    }
}

/// Requested ordering on one field. Multiple sorts are applied in list
/// order, the first being primary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySort {
    pub field: String,
    pub direction: SortDirection,
}

/// Row limit: either a fixed count or explicitly unbounded (HTTP's `-1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limit {
    Count(u64),
    Unbounded,
}

/// The immutable result of composing a query: a top-level list of
/// conditions (implicitly ANDed), an ordering, and pagination.
///
/// Built by `supersave-query`'s `QueryBuilder`; consumed by the engine
/// repositories' SQL translators.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub conditions: Vec<QueryCondition>,
    pub sort: Vec<QuerySort>,
    pub limit: Option<Limit>,
    pub offset: u64,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }
}
