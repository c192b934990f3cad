//! Secondary enrichment lookups performed per hydrated record.
//!
//! The hydrator issues these sequentially, one record at a time. The trait
//! exists so a batch-capable implementation can replace the per-row one
//! without changing the hydrator's contract.

use crate::core::types::{ActionCounters, Investigator, status};
use crate::database::{client::Database, error::Error};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait ActionEnrichment: Send + Sync {
    /// Per-status command counts for an action. An action with no recorded
    /// commands yields zero counts, not an error.
    async fn action_counters(&self, action_id: i64) -> Result<ActionCounters, Error>;

    /// Investigators who signed an action, ordered by investigator id.
    async fn investigators_for_action(&self, action_id: i64) -> Result<Vec<Investigator>, Error>;
}

/// PostgreSQL implementation of the enrichment lookups
pub struct PgEnrichment {
    db: Arc<Database>,
}

impl PgEnrichment {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

/// Folds per-status command counts into the counter set. `sent` is the
/// grand total, `done` the sum of terminal statuses, `in_flight` the
/// remainder.
fn fold_counters(rows: &[(String, i64)]) -> ActionCounters {
    let mut counters = ActionCounters::default();
    for (cmd_status, count) in rows {
        match cmd_status.as_str() {
            status::SUCCESS => counters.success = *count,
            status::CANCELLED => counters.cancelled = *count,
            status::EXPIRED => counters.expired = *count,
            status::FAILED => counters.failed = *count,
            status::TIMEOUT => counters.timeout = *count,
            // dispatched-but-pending commands have no terminal bucket
            status::SENT => {},
            _ => {},
        }
        counters.sent += count;
    }
    counters.done = counters.success
        + counters.cancelled
        + counters.expired
        + counters.failed
        + counters.timeout;
    counters.in_flight = counters.sent - counters.done;
    counters
}

#[async_trait]
impl ActionEnrichment for PgEnrichment {
    async fn action_counters(&self, action_id: i64) -> Result<ActionCounters, Error> {
        let rows = sqlx::query("SELECT status, COUNT(id) FROM commands WHERE actionid = $1 GROUP BY status")
            .bind(action_id)
            .fetch_all(&self.db.pool)
            .await
            .map_err(|e| Error::Enrich { action_id, source: e })?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            let cmd_status: String = row.try_get(0).map_err(Error::Scan)?;
            let count: i64 = row.try_get(1).map_err(Error::Scan)?;
            pairs.push((cmd_status, count));
        }

        Ok(fold_counters(&pairs))
    }

    async fn investigators_for_action(&self, action_id: i64) -> Result<Vec<Investigator>, Error> {
        let rows = sqlx::query(
            "SELECT investigators.id, investigators.name, investigators.pgpfingerprint, \
             investigators.status, investigators.createdat, investigators.lastmodified \
             FROM investigators \
             INNER JOIN signatures ON ( signatures.investigatorid = investigators.id ) \
             WHERE signatures.actionid = $1 \
             ORDER BY investigators.id ASC",
        )
        .bind(action_id)
        .fetch_all(&self.db.pool)
        .await
        .map_err(|e| Error::Enrich { action_id, source: e })?;

        let mut investigators = Vec::with_capacity(rows.len());
        for row in rows {
            investigators.push(Investigator {
                id: row.try_get(0).map_err(Error::Scan)?,
                name: row.try_get(1).map_err(Error::Scan)?,
                pgp_fingerprint: row.try_get(2).map_err(Error::Scan)?,
                status: row.try_get(3).map_err(Error::Scan)?,
                created_at: row.try_get(4).map_err(Error::Scan)?,
                last_modified: row.try_get(5).map_err(Error::Scan)?,
            });
        }

        Ok(investigators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_commands_fold_to_zero_counters() {
        assert_eq!(fold_counters(&[]), ActionCounters::default());
    }

    #[test]
    fn mixed_statuses_split_into_total_done_and_in_flight() {
        let rows = vec![
            (status::SENT.to_string(), 4),
            (status::SUCCESS.to_string(), 10),
            (status::FAILED.to_string(), 2),
            (status::TIMEOUT.to_string(), 1),
        ];
        let counters = fold_counters(&rows);
        assert_eq!(counters.sent, 17);
        assert_eq!(counters.success, 10);
        assert_eq!(counters.failed, 2);
        assert_eq!(counters.timeout, 1);
        assert_eq!(counters.done, 13);
        assert_eq!(counters.in_flight, 4);
    }

    #[test]
    fn unrecognized_statuses_count_toward_the_total_only() {
        let rows = vec![("rescheduled".to_string(), 3), (status::SUCCESS.to_string(), 1)];
        let counters = fold_counters(&rows);
        assert_eq!(counters.sent, 4);
        assert_eq!(counters.done, 1);
        assert_eq!(counters.in_flight, 3);
    }

    struct FixedEnrichment {
        counters: ActionCounters,
    }

    #[async_trait]
    impl ActionEnrichment for FixedEnrichment {
        async fn action_counters(&self, _action_id: i64) -> Result<ActionCounters, Error> {
            Ok(self.counters)
        }

        async fn investigators_for_action(
            &self,
            _action_id: i64,
        ) -> Result<Vec<Investigator>, Error> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn lookups_can_be_substituted_behind_the_trait() {
        let counters = ActionCounters { sent: 2, in_flight: 2, ..ActionCounters::default() };
        let enrich: Box<dyn ActionEnrichment> = Box::new(FixedEnrichment { counters });
        assert_eq!(enrich.action_counters(7).await.unwrap().sent, 2);
        assert!(enrich.investigators_for_action(7).await.unwrap().is_empty());
    }
}
