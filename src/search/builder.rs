//! Parameterized query assembly.
//!
//! The builder keeps an ordered list of predicate clauses and their bound
//! values, with a running positional-parameter counter: each active filter
//! claims the next free `$n` slot(s) at the moment its clause is pushed, so
//! clause text and bind order can never drift apart.

use crate::search::ranges::IdRange;
use chrono::{DateTime, Utc};
use sqlx::Postgres;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;

/// A value bound to one positional parameter slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    Time(DateTime<Utc>),
    Num(f64),
    Int(i64),
    Text(String),
}

impl Bind {
    /// Attaches this value to a prepared statement's argument list.
    pub(crate) fn apply<'q>(
        &self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            Bind::Time(t) => query.bind(*t),
            Bind::Num(v) => query.bind(*v),
            Bind::Int(i) => query.bind(*i),
            Bind::Text(s) => query.bind(s.clone()),
        }
    }
}

#[derive(Debug, Default)]
pub struct QueryBuilder {
    clauses: Vec<String>,
    binds: Vec<Bind>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the next parameter slot for a value and returns its 1-based
    /// position.
    pub fn push_bind(&mut self, bind: Bind) -> usize {
        self.binds.push(bind);
        self.binds.len()
    }

    /// Appends a raw predicate whose binds were already pushed.
    pub fn push_clause(&mut self, clause: String) {
        self.clauses.push(clause);
    }

    /// Inclusive range predicate; consumes two slots even when min == max.
    pub fn range(&mut self, column: &str, range: IdRange) {
        let min_slot = self.push_bind(Bind::Num(range.min));
        let max_slot = self.push_bind(Bind::Num(range.max));
        self.clauses.push(format!("{column} >= ${min_slot} AND {column} <= ${max_slot}"));
    }

    /// Case-insensitive pattern predicate.
    pub fn pattern(&mut self, column: &str, value: &str) {
        let slot = self.push_bind(Bind::Text(value.to_string()));
        self.clauses.push(format!("{column} ILIKE ${slot}"));
    }

    /// Upper time bound predicate.
    pub fn at_most(&mut self, column: &str, bound: DateTime<Utc>) {
        let slot = self.push_bind(Bind::Time(bound));
        self.clauses.push(format!("{column} <= ${slot}"));
    }

    /// Lower time bound predicate.
    pub fn at_least(&mut self, column: &str, bound: DateTime<Utc>) {
        let slot = self.push_bind(Bind::Time(bound));
        self.clauses.push(format!("{column} >= ${slot}"));
    }

    /// Assembles the final query text. Limit and offset always take the two
    /// trailing parameter slots.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        columns: &str,
        table: &str,
        join: &str,
        group_by: &str,
        order_by: &str,
        limit: f64,
        offset: f64,
    ) -> String {
        let limit_slot = self.push_bind(Bind::Int(limit as i64));
        let offset_slot = self.push_bind(Bind::Int(offset as i64));

        let mut sql = format!("SELECT {columns} FROM {table} ");
        sql.push_str(join);
        if !self.clauses.is_empty() {
            sql.push_str("WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
            sql.push(' ');
        }
        sql.push_str(&format!(
            "GROUP BY {group_by} ORDER BY {order_by} LIMIT ${limit_slot} OFFSET ${offset_slot}"
        ));
        sql
    }

    /// Hands the ordered bind list over for execution.
    pub fn into_binds(self) -> Vec<Bind> {
        self.binds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_numbered_in_claim_order() {
        let mut qb = QueryBuilder::new();
        qb.pattern("t.name", "a%");
        qb.range("t.id", IdRange { min: 5.0, max: 5.0 });
        qb.pattern("t.status", "done");
        let sql = qb.render("t.id", "t", "", "t.id", "t.id ASC", 10.0, 0.0);
        assert!(sql.contains("t.name ILIKE $1"));
        assert!(sql.contains("t.id >= $2 AND t.id <= $3"));
        assert!(sql.contains("t.status ILIKE $4"));
        assert!(sql.contains("LIMIT $5 OFFSET $6"));
        let binds = qb.into_binds();
        assert_eq!(binds.len(), 6);
        assert_eq!(binds[4], Bind::Int(10));
        assert_eq!(binds[5], Bind::Int(0));
    }

    #[test]
    fn range_consumes_two_slots_even_for_point_ranges() {
        let mut qb = QueryBuilder::new();
        qb.range("t.id", IdRange { min: 42.0, max: 42.0 });
        let binds = qb.into_binds();
        assert_eq!(binds, vec![Bind::Num(42.0), Bind::Num(42.0)]);
    }

    #[test]
    fn where_is_omitted_without_predicates() {
        let mut qb = QueryBuilder::new();
        let sql = qb.render("t.id", "t", "", "t.id", "t.id ASC", 100.0, 0.0);
        assert_eq!(sql, "SELECT t.id FROM t GROUP BY t.id ORDER BY t.id ASC LIMIT $1 OFFSET $2");
    }

    #[test]
    fn fractional_pagination_values_truncate() {
        let mut qb = QueryBuilder::new();
        let _ = qb.render("t.id", "t", "", "t.id", "t.id ASC", 100.9, 10.2);
        let binds = qb.into_binds();
        assert_eq!(binds, vec![Bind::Int(100), Bind::Int(10)]);
    }

    #[test]
    fn push_clause_keeps_manual_slot_numbering() {
        let mut qb = QueryBuilder::new();
        let first = qb.push_bind(Bind::Text("success".to_string()));
        let second = qb.push_bind(Bind::Num(0.0));
        qb.push_clause(format!("t.status = ${first} AND t.id >= ${second}"));
        qb.pattern("t.name", "x%");
        let sql = qb.render("t.id", "t", "", "t.id", "t.id ASC", 1.0, 0.0);
        assert!(sql.contains("t.status = $1 AND t.id >= $2 AND t.name ILIKE $3"));
    }
}
