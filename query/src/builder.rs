use indexmap::IndexMap;
use supersave_core::{
    ConfigError, FieldKind, Limit, LogicalGroup, LogicalOperator, Operator, Query, QueryCondition,
    QueryFilter, QuerySort, QueryValue, SortDirection,
};

use crate::fields::FieldTable;

/// A group opened by a zero-arg `and()`/`or()`/`not()` call, accumulating
/// the conditions that follow until it is closed (by another group being
/// opened, by reaching its capacity, or by finalizing the builder).
struct PendingGroup {
    operator: LogicalOperator,
    conditions: Vec<QueryCondition>,
    /// `Some(1)` for a `NOT` group: it auto-closes after its first
    /// condition, since NOT is unary over "the next predicate".
    capacity: Option<usize>,
}

/// Fluent, backend-neutral composer for a [`Query`].
///
/// Created by a repository, which injects the entity's `filterSortFields`
/// (plus the implicit `id`) so that filtering or sorting on an unknown
/// field is rejected synchronously, per spec.
pub struct QueryBuilder {
    fields: FieldTable,
    top: Vec<QueryCondition>,
    pending: Option<PendingGroup>,
    sort: Vec<QuerySort>,
    limit: Option<Limit>,
    offset: u64,
}

impl QueryBuilder {
    pub fn new(filter_sort_fields: IndexMap<String, FieldKind>) -> Self {
        Self {
            fields: FieldTable::new(filter_sort_fields),
            top: Vec::new(),
            pending: None,
            sort: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    fn push(&mut self, condition: QueryCondition) {
        match &mut self.pending {
            Some(group) => {
                group.conditions.push(condition);
                if group.capacity == Some(group.conditions.len()) {
                    self.close_pending();
                }
            }
            None => self.top.push(condition),
        }
    }

    /// Finalizes any currently open group, appending it to the current
    /// level unless it ended up empty (an empty group contributes
    /// nothing to the emitted SQL).
    fn close_pending(&mut self) {
        if let Some(group) = self.pending.take() {
            if !group.conditions.is_empty() {
                self.top.push(
                    LogicalGroup {
                        operator: group.operator,
                        conditions: group.conditions,
                    }
                    .into(),
                );
            }
        }
    }

    fn filter(
        &mut self,
        operator: Operator,
        field: &str,
        value: impl Into<QueryValue>,
    ) -> Result<&mut Self, ConfigError> {
        self.fields.check(field)?;
        self.push(
            QueryFilter {
                operator,
                field: field.to_owned(),
                value: value.into(),
            }
            .into(),
        );
        Ok(self)
    }

    pub fn eq(&mut self, field: &str, value: impl Into<QueryValue>) -> Result<&mut Self, ConfigError> {
        self.filter(Operator::Eq, field, value)
    }

    pub fn gt(&mut self, field: &str, value: impl Into<QueryValue>) -> Result<&mut Self, ConfigError> {
        self.filter(Operator::Gt, field, value)
    }

    pub fn gte(&mut self, field: &str, value: impl Into<QueryValue>) -> Result<&mut Self, ConfigError> {
        self.filter(Operator::Gte, field, value)
    }

    pub fn lt(&mut self, field: &str, value: impl Into<QueryValue>) -> Result<&mut Self, ConfigError> {
        self.filter(Operator::Lt, field, value)
    }

    pub fn lte(&mut self, field: &str, value: impl Into<QueryValue>) -> Result<&mut Self, ConfigError> {
        self.filter(Operator::Lte, field, value)
    }

    pub fn like(&mut self, field: &str, value: impl Into<QueryValue>) -> Result<&mut Self, ConfigError> {
        self.filter(Operator::Like, field, value)
    }

    pub fn in_(
        &mut self,
        field: &str,
        values: Vec<impl Into<QueryValue>>,
    ) -> Result<&mut Self, ConfigError> {
        self.filter(Operator::In, field, values)
    }

    /// Opens a pending AND group at the current level; the following
    /// predicates join it until another group is opened or the builder is
    /// finalized.
    pub fn and(&mut self) -> &mut Self {
        self.close_pending();
        self.pending = Some(PendingGroup {
            operator: LogicalOperator::And,
            conditions: Vec::new(),
            capacity: None,
        });
        self
    }

    /// Opens a pending OR group. See [`Self::and`].
    pub fn or(&mut self) -> &mut Self {
        self.close_pending();
        self.pending = Some(PendingGroup {
            operator: LogicalOperator::Or,
            conditions: Vec::new(),
            capacity: None,
        });
        self
    }

    /// Opens a single-slot NOT group; the next predicate closes it.
    pub fn not(&mut self) -> &mut Self {
        self.close_pending();
        self.pending = Some(PendingGroup {
            operator: LogicalOperator::Not,
            conditions: Vec::new(),
            capacity: Some(1),
        });
        self
    }

    /// `and(q1, q2, …)`: creates a finalized AND group by flattening each
    /// sub-query's top-level conditions, rather than opening a pending
    /// group for predicates that follow.
    pub fn and_of(&mut self, subqueries: Vec<QueryBuilder>) -> &mut Self {
        self.finalize_group(LogicalOperator::And, subqueries)
    }

    /// `or(q1, q2, …)`: see [`Self::and_of`].
    pub fn or_of(&mut self, subqueries: Vec<QueryBuilder>) -> &mut Self {
        self.finalize_group(LogicalOperator::Or, subqueries)
    }

    /// `not(subquery)`: negates a composite sub-query wholesale instead of
    /// just the next predicate.
    pub fn not_of(&mut self, mut subquery: QueryBuilder) -> &mut Self {
        subquery.close_pending();
        let inner = if subquery.top.len() == 1 {
            subquery.top.into_iter().next().expect("checked len == 1")
        } else {
            LogicalGroup {
                operator: LogicalOperator::And,
                conditions: subquery.top,
            }
            .into()
        };
        self.push(
            LogicalGroup {
                operator: LogicalOperator::Not,
                conditions: vec![inner],
            }
            .into(),
        );
        self
    }

    /// Builds the finalized group and routes it through [`Self::push`] so
    /// it joins an already-open pending group instead of always landing at
    /// the top level.
    fn finalize_group(&mut self, operator: LogicalOperator, subqueries: Vec<QueryBuilder>) -> &mut Self {
        let mut conditions = Vec::new();
        for mut sub in subqueries {
            sub.close_pending();
            conditions.extend(sub.top);
        }
        if !conditions.is_empty() {
            self.push(LogicalGroup { operator, conditions }.into());
        }
        self
    }

    pub fn sort(&mut self, field: &str, direction: SortDirection) -> Result<&mut Self, ConfigError> {
        self.fields.check(field)?;
        self.sort.push(QuerySort {
            field: field.to_owned(),
            direction,
        });
        Ok(self)
    }

    pub fn limit(&mut self, count: u64) -> &mut Self {
        self.limit = Some(Limit::Count(count));
        self
    }

    pub fn unbounded(&mut self) -> &mut Self {
        self.limit = Some(Limit::Unbounded);
        self
    }

    pub fn offset(&mut self, count: u64) -> &mut Self {
        self.offset = count;
        self
    }

    /// Inspection accessor: conditions accumulated so far at the top
    /// level, not including an as-yet-unclosed pending group.
    pub fn conditions(&self) -> &[QueryCondition] {
        &self.top
    }

    pub fn current_sort(&self) -> &[QuerySort] {
        &self.sort
    }

    pub fn current_limit(&self) -> Option<Limit> {
        self.limit
    }

    pub fn current_offset(&self) -> u64 {
        self.offset
    }

    /// Finalizes any pending group and returns the immutable [`Query`].
    pub fn get_where(mut self) -> Query {
        self.close_pending();
        Query {
            conditions: self.top,
            sort: self.sort,
            limit: self.limit,
            offset: self.offset,
        }
    }
}
