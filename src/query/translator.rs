//! Query Translator: lowers a [`QueryModel`] into the store adapter's native filter shape.
//!
//! Conditions are grouped by field. A field with exactly one condition lowers to
//! `{field: {nativeOp: value}}`; a field with two or more conditions lowers to an `AND`
//! group of per-condition fragments. Top-level fragments across distinct fields are
//! implicitly AND-ed by the caller iterating [`NativeFilter::And`].

use super::{Direction, FilterOperator, QueryModel};
use indexmap::IndexMap;
use serde_json::Value as Json;

/// A single native operator applied to a value, the innermost unit of a translated filter.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeOp {
    Eq(Json),
    Ne(Json),
    Lt(Json),
    Lte(Json),
    Gt(Json),
    Gte(Json),
    In(Vec<Json>),
    Nin(Vec<Json>),
    ElemMatchEq(Json),
    ElemMatchAny(Vec<Json>),
}

impl NativeOp {
    /// Evaluate this operator against an optional field value (`None` means the field is
    /// absent from the document). Used by the in-memory store and by live-query predicate
    /// matching, both of which evaluate filters in-process rather than delegating to a
    /// real database.
    pub fn matches(&self, value: Option<&Json>) -> bool {
        match self {
            Self::Eq(v) => value == Some(v),
            Self::Ne(v) => value != Some(v),
            Self::Lt(v) => compare_numeric(value, v, |a, b| a < b),
            Self::Lte(v) => compare_numeric(value, v, |a, b| a <= b),
            Self::Gt(v) => compare_numeric(value, v, |a, b| a > b),
            Self::Gte(v) => compare_numeric(value, v, |a, b| a >= b),
            Self::In(list) => value.map(|v| list.contains(v)).unwrap_or(false),
            Self::Nin(list) => value.map(|v| !list.contains(v)).unwrap_or(true),
            Self::ElemMatchEq(v) => value
                .and_then(Json::as_array)
                .map(|arr| arr.contains(v))
                .unwrap_or(false),
            Self::ElemMatchAny(list) => value
                .and_then(Json::as_array)
                .map(|arr| arr.iter().any(|item| list.contains(item)))
                .unwrap_or(false),
        }
    }
}

fn compare_numeric(value: Option<&Json>, rhs: &Json, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (value.and_then(Json::as_f64), rhs.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => match (value.and_then(Json::as_str), rhs.as_str()) {
            (Some(a), Some(b)) => cmp_str(a, b, &cmp),
            _ => false,
        },
    }
}

fn cmp_str(a: &str, b: &str, cmp: &impl Fn(f64, f64) -> bool) -> bool {
    // Timestamps compare lexicographically when ISO-8601 formatted; approximate the
    // numeric comparator's ordering by mapping string order onto -1/0/1.
    let ord = match a.cmp(b) {
        std::cmp::Ordering::Less => -1.0,
        std::cmp::Ordering::Equal => 0.0,
        std::cmp::Ordering::Greater => 1.0,
    };
    cmp(ord, 0.0)
}

/// A translated filter tree: either an AND group, a single field condition, or no
/// filtering at all (an empty query).
#[derive(Debug, Clone)]
pub enum NativeFilter {
    And(Vec<NativeFilter>),
    Field { field: String, op: NativeOp },
    Empty,
}

fn to_native_op(operator: FilterOperator, value: &Json) -> NativeOp {
    match operator {
        FilterOperator::Equal => NativeOp::Eq(value.clone()),
        FilterOperator::NotEqual => NativeOp::Ne(value.clone()),
        FilterOperator::LessThan => NativeOp::Lt(value.clone()),
        FilterOperator::LessThanOrEqual => NativeOp::Lte(value.clone()),
        FilterOperator::GreaterThan => NativeOp::Gt(value.clone()),
        FilterOperator::GreaterThanOrEqual => NativeOp::Gte(value.clone()),
        FilterOperator::In => NativeOp::In(value.as_array().cloned().unwrap_or_default()),
        FilterOperator::NotIn => NativeOp::Nin(value.as_array().cloned().unwrap_or_default()),
        FilterOperator::ArrayContains => NativeOp::ElemMatchEq(value.clone()),
        FilterOperator::ArrayContainsAny => {
            NativeOp::ElemMatchAny(value.as_array().cloned().unwrap_or_default())
        }
    }
}

/// Translate a validated [`QueryModel`] into a native filter plus sort/skip/limit triple.
pub fn translate(query: &QueryModel) -> (NativeFilter, Option<(String, i8)>, Option<u32>, Option<u32>) {
    let mut by_field: IndexMap<String, Vec<NativeOp>> = IndexMap::new();
    for cond in query.conditions() {
        by_field
            .entry(cond.field.clone())
            .or_default()
            .push(to_native_op(cond.operator, &cond.value));
    }

    let fragments: Vec<NativeFilter> = by_field
        .into_iter()
        .map(|(field, ops)| {
            if ops.len() == 1 {
                NativeFilter::Field {
                    field,
                    op: ops.into_iter().next().unwrap(),
                }
            } else {
                NativeFilter::And(
                    ops.into_iter()
                        .map(|op| NativeFilter::Field {
                            field: field.clone(),
                            op,
                        })
                        .collect(),
                )
            }
        })
        .collect();

    let filter = if fragments.is_empty() {
        NativeFilter::Empty
    } else if fragments.len() == 1 {
        fragments.into_iter().next().unwrap()
    } else {
        NativeFilter::And(fragments)
    };

    let sort = query.order().map(|(field, dir)| {
        let native = match dir {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        };
        (field.clone(), native)
    });

    (filter, sort, query.offset_value(), query.limit_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryModel;
    use serde_json::json;

    #[test]
    fn single_condition_on_field_is_not_wrapped_in_and() {
        let q = QueryModel::new()
            .where_cond("age", FilterOperator::GreaterThan, json!(25))
            .unwrap();
        let (filter, ..) = translate(&q);
        assert!(matches!(filter, NativeFilter::Field { .. }));
    }

    #[test]
    fn multiple_conditions_on_distinct_fields_and_together() {
        let q = QueryModel::new()
            .where_cond("age", FilterOperator::GreaterThanOrEqual, json!(25))
            .unwrap()
            .where_cond("tags", FilterOperator::ArrayContains, json!("developer"))
            .unwrap();
        let (filter, ..) = translate(&q);
        match filter {
            NativeFilter::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn repeated_conditions_on_same_field_group_under_and() {
        let q = QueryModel::new()
            .where_cond("age", FilterOperator::GreaterThanOrEqual, json!(18))
            .unwrap()
            .where_cond("age", FilterOperator::LessThan, json!(65))
            .unwrap();
        let (filter, ..) = translate(&q);
        match filter {
            NativeFilter::And(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(parts
                    .iter()
                    .all(|p| matches!(p, NativeFilter::Field { field, .. } if field == "age")));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn sort_direction_maps_to_plus_minus_one() {
        let q = QueryModel::new().order_by("age", crate::query::Direction::Descending);
        let (_, sort, ..) = translate(&q);
        assert_eq!(sort, Some(("age".to_string(), -1)));
    }

    #[test]
    fn empty_query_translates_to_empty_filter() {
        let q = QueryModel::new();
        let (filter, sort, offset, limit) = translate(&q);
        assert!(matches!(filter, NativeFilter::Empty));
        assert!(sort.is_none());
        assert!(offset.is_none());
        assert!(limit.is_none());
    }
}
