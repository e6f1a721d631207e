use supersave_core::{FieldKind, LogicalGroup, LogicalOperator, Operator, Query, QueryCondition, QueryFilter, QuerySort, QueryValue, SortDirection};

use crate::conn::EngineKind;
use crate::sql::SqlWriter;

/// A value coerced and ready to bind to a `?` placeholder, after
/// field-kind-aware coercion (booleans bind as 0/1, `LIKE` wildcards are
/// rewritten, `id`/string fields bind as text).
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Text(String),
    Int(i64),
    Bool(bool),
}

/// Looks up a field's kind: `id` is always an implicit string field.
fn field_kind(fields: &indexmap::IndexMap<String, FieldKind>, field: &str) -> FieldKind {
    if field == "id" {
        FieldKind::String
    } else {
        fields.get(field).copied().unwrap_or(FieldKind::String)
    }
}

fn coerce(kind: FieldKind, value: &QueryValue) -> BoundValue {
    match kind {
        FieldKind::Boolean => BoundValue::Bool(value.as_bool_lenient()),
        FieldKind::Number => match value {
            QueryValue::Number(n) => n
                .as_i64()
                .map(BoundValue::Int)
                .unwrap_or_else(|| BoundValue::Text(n.to_string())),
            QueryValue::String(s) => s
                .parse::<i64>()
                .map(BoundValue::Int)
                .unwrap_or_else(|_| BoundValue::Text(s.clone())),
            other => BoundValue::Text(render_scalar(other)),
        },
        FieldKind::String => BoundValue::Text(render_scalar(value)),
    }
}

fn render_scalar(value: &QueryValue) -> String {
    match value {
        QueryValue::String(s) => s.clone(),
        QueryValue::Number(n) => n.to_string(),
        QueryValue::Bool(b) => b.to_string(),
        QueryValue::Null => String::new(),
        QueryValue::List(_) => String::new(),
    }
}

/// Shell-style `*` wildcards become SQL `%` for `LIKE`.
fn like_pattern(value: &QueryValue) -> String {
    render_scalar(value).replace('*', "%")
}

/// Translates a top-level condition list (implicitly ANDed) into a `WHERE`
/// clause body plus the ordered bind values. Returns `None` when there are
/// no conditions at all (caller omits the `WHERE` keyword).
pub fn translate_conditions(
    writer: &mut SqlWriter,
    fields: &indexmap::IndexMap<String, FieldKind>,
    conditions: &[QueryCondition],
) -> Vec<BoundValue> {
    let mut params = Vec::new();
    join_conditions(writer, fields, conditions, " AND ", &mut params);
    params
}

fn join_conditions(
    writer: &mut SqlWriter,
    fields: &indexmap::IndexMap<String, FieldKind>,
    conditions: &[QueryCondition],
    joiner: &str,
    params: &mut Vec<BoundValue>,
) {
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            writer.write_str(joiner);
        }
        write_condition(writer, fields, condition, params);
    }
}

fn write_condition(
    writer: &mut SqlWriter,
    fields: &indexmap::IndexMap<String, FieldKind>,
    condition: &QueryCondition,
    params: &mut Vec<BoundValue>,
) {
    match condition {
        QueryCondition::Filter(filter) => write_filter(writer, fields, filter, params),
        QueryCondition::Group(group) => write_group(writer, fields, group, params),
    }
}

fn write_group(
    writer: &mut SqlWriter,
    fields: &indexmap::IndexMap<String, FieldKind>,
    group: &LogicalGroup,
    params: &mut Vec<BoundValue>,
) {
    match group.operator {
        LogicalOperator::Not => {
            writer.write_str("NOT (");
            // NOT groups always hold exactly one condition.
            if let Some(inner) = group.conditions.first() {
                write_condition(writer, fields, inner, params);
            }
            writer.write_str(")");
        }
        LogicalOperator::And | LogicalOperator::Or => {
            let joiner = if group.operator == LogicalOperator::And {
                " AND "
            } else {
                " OR "
            };
            writer.write_str("(");
            join_conditions(writer, fields, &group.conditions, joiner, params);
            writer.write_str(")");
        }
    }
}

fn write_filter(
    writer: &mut SqlWriter,
    fields: &indexmap::IndexMap<String, FieldKind>,
    filter: &QueryFilter,
    params: &mut Vec<BoundValue>,
) {
    let kind = field_kind(fields, &filter.field);

    if filter.operator == Operator::Eq && filter.value.is_null() {
        writer.write_ident(&filter.field);
        writer.write_str(" IS NULL");
        return;
    }

    if filter.operator == Operator::In {
        let QueryValue::List(items) = &filter.value else {
            unreachable!("IN filters always carry a QueryValue::List");
        };
        if items.is_empty() {
            // `in('field', [])` must match nothing, without emitting a
            // syntactically invalid `IN ()`.
            writer.write_str("1 = 0");
            return;
        }
        writer.write_ident(&filter.field);
        writer.write_str(" IN (");
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                writer.write_str(", ");
            }
            writer.write_param();
            params.push(coerce(kind, item));
        }
        writer.write_str(")");
        return;
    }

    writer.write_ident(&filter.field);
    writer.write_str(match filter.operator {
        Operator::Eq => " = ",
        Operator::Gt => " > ",
        Operator::Gte => " >= ",
        Operator::Lt => " < ",
        Operator::Lte => " <= ",
        Operator::Like => " LIKE ",
        Operator::In => unreachable!("handled above"),
    });
    writer.write_param();
    params.push(if filter.operator == Operator::Like {
        BoundValue::Text(like_pattern(&filter.value))
    } else {
        coerce(kind, &filter.value)
    });
}

/// Appends `ORDER BY` clauses. SQLite string-kind fields sort
/// case-insensitively (`COLLATE NOCASE`); MySQL uses its column's default
/// collation.
pub fn write_order_by(
    writer: &mut SqlWriter,
    fields: &indexmap::IndexMap<String, FieldKind>,
    sort: &[QuerySort],
    collate_nocase: bool,
) {
    if sort.is_empty() {
        return;
    }
    writer.write_str(" ORDER BY ");
    for (i, s) in sort.iter().enumerate() {
        if i > 0 {
            writer.write_str(", ");
        }
        writer.write_ident(&s.field);
        if collate_nocase && field_kind(fields, &s.field) == FieldKind::String {
            writer.write_str(" COLLATE NOCASE");
        }
        writer.write_str(if s.direction == SortDirection::Asc { " ASC" } else { " DESC" });
    }
}

/// Appends `LIMIT`/`OFFSET` per the query's pagination settings. An
/// explicit `Limit::Unbounded` omits `LIMIT` entirely; an unset limit with a
/// non-zero offset still needs an explicit "no limit" `LIMIT` to let
/// `OFFSET` apply, since neither backend accepts a bare `OFFSET` without a
/// preceding `LIMIT`. SQLite spells that `LIMIT -1`; MySQL/MariaDB rejects a
/// negative `LIMIT` outright and instead wants the largest unsigned
/// `BIGINT`, `18446744073709551615`.
pub fn write_limit_offset(writer: &mut SqlWriter, query: &Query) {
    use supersave_core::Limit;
    let unbounded_limit = match writer.engine() {
        EngineKind::Sqlite => "-1",
        EngineKind::MySql => "18446744073709551615",
    };
    let needs_limit_for_offset = query.limit.is_none() && query.offset > 0;
    match query.limit {
        Some(Limit::Count(n)) => {
            writer.write_fmt_args(format_args!(" LIMIT {n}"));
        }
        Some(Limit::Unbounded) => {
            if query.offset > 0 {
                writer.write_fmt_args(format_args!(" LIMIT {unbounded_limit}"));
            }
        }
        None if needs_limit_for_offset => {
            writer.write_fmt_args(format_args!(" LIMIT {unbounded_limit}"));
        }
        None => {}
    }
    if query.offset > 0 {
        writer.write_fmt_args(format_args!(" OFFSET {}", query.offset));
    }
}
