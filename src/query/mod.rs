//! Query Model: an immutable, composable query value
//!
//! Following the same pattern the rest of this codebase borrowed it from: each builder
//! method clones the internal state and returns a fresh value, so two divergent branches
//! built from a shared prefix never interfere with each other.

pub mod codec;
pub mod translator;

use serde_json::Value as Json;

/// Sort direction for `orderBy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One of the ten recognized filter operator tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    NotIn,
    ArrayContains,
    ArrayContainsAny,
}

impl FilterOperator {
    /// Parse one of the ten wire tokens (`==`, `!=`, `<`, `<=`, `>`, `>=`, `in`, `not-in`,
    /// `array-contains`, `array-contains-any`). Returns `None` for anything else.
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "==" => Self::Equal,
            "!=" => Self::NotEqual,
            "<" => Self::LessThan,
            "<=" => Self::LessThanOrEqual,
            ">" => Self::GreaterThan,
            ">=" => Self::GreaterThanOrEqual,
            "in" => Self::In,
            "not-in" => Self::NotIn,
            "array-contains" => Self::ArrayContains,
            "array-contains-any" => Self::ArrayContainsAny,
            _ => return None,
        })
    }

    /// The canonical wire token for this operator.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::In => "in",
            Self::NotIn => "not-in",
            Self::ArrayContains => "array-contains",
            Self::ArrayContainsAny => "array-contains-any",
        }
    }

    /// Whether this operator requires a numeric or timestamp value (the four range ops).
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Self::LessThan | Self::LessThanOrEqual | Self::GreaterThan | Self::GreaterThanOrEqual
        )
    }

    /// Whether this operator requires its value to be a JSON array.
    pub fn requires_array_value(&self) -> bool {
        matches!(self, Self::In | Self::NotIn | Self::ArrayContainsAny)
    }
}

/// One `(field, operator, value)` condition.
#[derive(Debug, Clone)]
pub struct Condition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Json,
}

/// Immutable query value: a filter set, an optional sort, and optional paging.
///
/// Building a query never mutates an existing value. `where_cond` and `order_by` return a
/// new `QueryModel`; the receiver is left untouched so a caller can branch a query in two
/// directions from a shared prefix.
#[derive(Debug, Clone, Default)]
pub struct QueryModel {
    conditions: Vec<Condition>,
    order_by: Option<(String, Direction)>,
    limit: Option<u32>,
    offset: Option<u32>,
}

/// Error raised when building or encoding a [`QueryModel`] invalid.
pub use crate::error::QueryError;

impl QueryModel {
    /// An empty query: matches everything, in store-native order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a condition. Fails with [`QueryError::InvalidQuery`] if `orderBy` has already
    /// been set — conditions must be added before ordering is fixed.
    pub fn where_cond(
        &self,
        field: impl Into<String>,
        operator: FilterOperator,
        value: Json,
    ) -> Result<Self, QueryError> {
        if self.order_by.is_some() {
            return Err(QueryError::InvalidQuery);
        }
        if operator.is_range() && !(value.is_number() || value.is_string()) {
            return Err(QueryError::InvalidArgument(format!(
                "operator {} requires a numeric or timestamp value",
                operator.token()
            )));
        }
        if operator.requires_array_value() && !value.is_array() {
            return Err(QueryError::InvalidArgument(format!(
                "operator {} requires an array value",
                operator.token()
            )));
        }
        let mut next = self.clone();
        next.conditions.push(Condition {
            field: field.into(),
            operator,
            value,
        });
        Ok(next)
    }

    /// Set (or replace) the sort order. Always legal regardless of prior state.
    pub fn order_by(&self, field: impl Into<String>, direction: Direction) -> Self {
        let mut next = self.clone();
        next.order_by = Some((field.into(), direction));
        next
    }

    /// Set (or replace) the result limit. Validated at encode/translate time, not here, so
    /// that a query under construction can temporarily hold an out-of-range value.
    pub fn limit(&self, n: u32) -> Self {
        let mut next = self.clone();
        next.limit = Some(n);
        next
    }

    /// Set (or replace) the result offset.
    pub fn offset(&self, n: u32) -> Self {
        let mut next = self.clone();
        next.offset = Some(n);
        next
    }

    /// Validate limit/offset bounds: `limit` in `[1, 1000]` if present, `offset`
    /// non-negative (guaranteed by the `u32` type, checked here for symmetry with the
    /// documented contract).
    pub fn validate(&self) -> Result<(), QueryError> {
        if let Some(limit) = self.limit {
            if !(1..=1000).contains(&limit) {
                return Err(QueryError::InvalidQueryParams(format!(
                    "limit must be between 1 and 1000, got {limit}"
                )));
            }
        }
        Ok(())
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn order(&self) -> Option<&(String, Direction)> {
        self.order_by.as_ref()
    }

    pub fn limit_value(&self) -> Option<u32> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u32> {
        self.offset
    }
}
