use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::models::{SessionOverview, SessionRecord};

/// Tracks the earliest known start time per session id across polls.
///
/// The backing store rewrites `saved_at` on events unrelated to session
/// start, so the freshest record alone cannot answer "how long has this
/// task been running". The cache pins each id to the first timestamp it was
/// observed with and follows the store only when it reports an earlier one.
pub struct ElapsedReconciler {
    starts: HashMap<String, DateTime<Utc>>,
}

impl ElapsedReconciler {
    pub fn new() -> Self {
        Self {
            starts: HashMap::new(),
        }
    }

    /// Merge one poll's records against the cache and return display rows,
    /// longest-running first.
    pub fn reconcile(
        &mut self,
        fresh: Vec<SessionRecord>,
        now: DateTime<Utc>,
    ) -> Vec<SessionOverview> {
        for record in &fresh {
            self.starts
                .entry(record.id.clone())
                .and_modify(|start| {
                    // The store itself reported an earlier time (e.g. a
                    // restart correction); a start is never moved later.
                    if record.saved_at < *start {
                        *start = record.saved_at;
                    }
                })
                .or_insert(record.saved_at);
        }

        // Ids gone from the fresh set have ended; a later reappearance is a
        // brand-new session.
        let live: HashSet<&str> = fresh.iter().map(|record| record.id.as_str()).collect();
        self.starts.retain(|id, _| live.contains(id.as_str()));

        let mut rows: Vec<SessionOverview> = fresh
            .into_iter()
            .map(|record| {
                let started_at = self
                    .starts
                    .get(&record.id)
                    .copied()
                    .unwrap_or(record.saved_at);
                let elapsed_secs = (now - started_at).num_seconds().max(0);
                SessionOverview {
                    record,
                    started_at,
                    elapsed_secs,
                }
            })
            .collect();

        rows.sort_by(|a, b| b.elapsed_secs.cmp(&a.elapsed_secs));
        rows
    }

    #[cfg(test)]
    fn cached_start(&self, id: &str) -> Option<DateTime<Utc>> {
        self.starts.get(id).copied()
    }
}

impl Default for ElapsedReconciler {
    fn default() -> Self {
        Self::new()
    }
}
