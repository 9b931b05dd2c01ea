//! Structured catalog filters rendered into parameterized SQL
//!
//! A [`Filter`] is an ordered list of `(column, operator, value)`
//! predicates. Columns are static names chosen by the caller, values are
//! always bound, and rendering joins the predicates with `AND`.

use sqlx::{Postgres, QueryBuilder};

/// Comparison applied by a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gte,
    Lte,
}

impl Op {
    fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => " = ",
            Op::Gte => " >= ",
            Op::Lte => " <= ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub column: &'static str,
    pub op: Op,
    pub value: FilterValue,
}

/// Conjunction of predicates over one table
#[derive(Debug, Clone, Default)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality on a text column; blank or absent values add nothing
    pub fn eq(mut self, column: &'static str, value: Option<&str>) -> Self {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.predicates.push(Predicate {
                column,
                op: Op::Eq,
                value: FilterValue::Text(value.to_string()),
            });
        }
        self
    }

    /// Inclusive range on a numeric column; a zero or absent bound is open
    pub fn range(mut self, column: &'static str, min: Option<i64>, max: Option<i64>) -> Self {
        if let Some(min) = min.filter(|v| *v != 0) {
            self.predicates.push(Predicate {
                column,
                op: Op::Gte,
                value: FilterValue::Int(min),
            });
        }
        if let Some(max) = max.filter(|v| *v != 0) {
            self.predicates.push(Predicate {
                column,
                op: Op::Lte,
                value: FilterValue::Int(max),
            });
        }
        self
    }

    #[cfg(test)]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Append ` WHERE ...` with every value bound, or nothing when empty
    pub fn push_where(&self, query: &mut QueryBuilder<'_, Postgres>) {
        for (i, predicate) in self.predicates.iter().enumerate() {
            query.push(if i == 0 { " WHERE " } else { " AND " });
            query.push(predicate.column);
            query.push(predicate.op.as_sql());
            match &predicate.value {
                FilterValue::Text(text) => query.push_bind(text.clone()),
                FilterValue::Int(number) => query.push_bind(*number),
            };
        }
    }

    /// `<select> WHERE ... <tail>` as a ready query builder
    pub fn query<'args>(&self, select: &str, tail: &str) -> QueryBuilder<'args, Postgres> {
        let mut query = QueryBuilder::new(select);
        self.push_where(&mut query);
        query.push(tail);
        query
    }
}

/// Whether an optional range has both bounds set and inverted
pub fn is_inverted(min: Option<i64>, max: Option<i64>) -> bool {
    matches!((min, max), (Some(min), Some(max)) if min != 0 && max != 0 && min > max)
}
