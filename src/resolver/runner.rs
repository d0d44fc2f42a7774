//! Resolution runner
//!
//! Drains the queue of deferred references after primary import completes,
//! routes each record to its resolver, and aggregates per-kind outcome
//! counts. Individual record failures are counted, never escalated: an
//! import with unresolved library objects still finishes, flagged with a
//! non-zero failure count.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use crossbeam::channel::Receiver;

use super::ResolverRegistry;
use crate::link::{LinkKind, LinkRecord};
use crate::storage::SqliteStore;
use crate::Result;

/// Outcome counters for one link kind
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct KindCounts {
    pub resolved: usize,
    pub failed: usize,
}

/// Aggregate outcome of a resolution session
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ResolutionStats {
    counts: BTreeMap<LinkKind, KindCounts>,
    /// Errors collected while flushing and closing resolvers at session end;
    /// non-fatal to the resolution work already done
    pub teardown_errors: Vec<String>,
}

impl ResolutionStats {
    fn record(&mut self, kind: LinkKind, resolved: bool) {
        let counts = self.counts.entry(kind).or_default();
        if resolved {
            counts.resolved += 1;
        } else {
            counts.failed += 1;
        }
    }

    /// Counters for one kind
    pub fn for_kind(&self, kind: LinkKind) -> KindCounts {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    pub fn total_resolved(&self) -> usize {
        self.counts.values().map(|c| c.resolved).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.counts.values().map(|c| c.failed).sum()
    }

    /// True when every record resolved and teardown was clean
    pub fn is_clean(&self) -> bool {
        self.total_failed() == 0 && self.teardown_errors.is_empty()
    }
}

impl fmt::Display for ResolutionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Resolution Stats:")?;
        for (kind, counts) in &self.counts {
            writeln!(f, "  {}: {} resolved, {} failed", kind, counts.resolved, counts.failed)?;
        }
        for err in &self.teardown_errors {
            writeln!(f, "  teardown: {}", err)?;
        }
        writeln!(f, "  Total: {} resolved, {} failed", self.total_resolved(), self.total_failed())
    }
}

/// Drives a resolution session over a registry of resolvers.
///
/// One runner per import session: feed it records through any of the
/// `resolve_*` methods, then call [`ResolutionRunner::finish`] exactly once
/// to flush batched kinds, tear the resolvers down, and take the stats.
pub struct ResolutionRunner {
    registry: ResolverRegistry,
    stats: ResolutionStats,
    abort: Arc<AtomicBool>,
}

impl ResolutionRunner {
    pub fn new(registry: ResolverRegistry) -> Self {
        Self {
            registry,
            stats: ResolutionStats::default(),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag observed between records: once set, no further record is
    /// dispatched, but the record in flight finishes so no transaction is
    /// left half-open
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Counts accumulated so far
    pub fn stats(&self) -> &ResolutionStats {
        &self.stats
    }

    fn aborted(&self) -> bool {
        if self.abort.load(Ordering::Relaxed) {
            tracing::info!("Abort observed, leaving remaining links unresolved");
            return true;
        }
        false
    }

    fn dispatch(&mut self, record: &LinkRecord) -> bool {
        let resolved = self.registry.get_mut(record.kind).insert(record);
        self.stats.record(record.kind, resolved);
        resolved
    }

    /// Resolve a sequence of records
    pub fn resolve<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = LinkRecord>,
    {
        for record in records {
            if self.aborted() {
                break;
            }
            self.dispatch(&record);
        }
    }

    /// Resolve records arriving on a channel, until every sender hangs up
    pub fn resolve_channel(&mut self, records: &Receiver<LinkRecord>) {
        for record in records.iter() {
            if self.aborted() {
                break;
            }
            self.dispatch(&record);
        }
    }

    /// Drain the store's durable queue, deleting each entry that resolves.
    ///
    /// Failed entries stay queued, so a later run can retry them once the
    /// operator has fixed the source.
    pub fn resolve_pending(&mut self, store: &SqliteStore) -> Result<()> {
        for link in store.pending_links()? {
            if self.aborted() {
                break;
            }
            if self.dispatch(&link.record) {
                store.delete_pending_link(link.id)?;
            }
        }
        Ok(())
    }

    /// End the session: flush every batched resolver, close every resolver,
    /// and return the final stats.
    ///
    /// Teardown keeps going past individual failures; whatever goes wrong is
    /// collected into [`ResolutionStats::teardown_errors`] rather than
    /// discarding the counts of an otherwise finished run.
    pub fn finish(mut self) -> ResolutionStats {
        for (kind, resolver) in self.registry.resolvers_mut() {
            if let Err(e) = resolver.execute_batch() {
                tracing::error!("Failed to flush {} batch: {}", kind, e);
                self.stats.teardown_errors.push(format!("flush {}: {}", kind, e));
            }
            if let Err(e) = resolver.close() {
                tracing::error!("Failed to close {} resolver: {}", kind, e);
                self.stats.teardown_errors.push(format!("close {}: {}", kind, e));
            }
        }
        self.stats
    }
}
