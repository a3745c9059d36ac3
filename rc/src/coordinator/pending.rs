//! Pending table: bookkeeping for requests awaiting a reply

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::envelope::CorrelationId;

/// Stand-in deadline for budgets too large to add to an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// One in-flight request, kept verbatim so it can be reissued
#[derive(Debug, Clone)]
pub struct PendingRequest<P, M> {
    pub routing_key: String,
    pub payload: P,
    pub time_budget: Duration,
    pub metadata: M,
    pub deadline: Instant,
}

impl<P, M> PendingRequest<P, M> {
    pub fn new(routing_key: String, payload: P, time_budget: Duration, metadata: M, now: Instant) -> Self {
        Self {
            routing_key,
            payload,
            time_budget,
            metadata,
            deadline: now.checked_add(time_budget).unwrap_or_else(|| now + FAR_FUTURE),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline <= now
    }
}

/// Map from correlation id to the request it belongs to
#[derive(Debug)]
pub struct PendingTable<P, M> {
    entries: HashMap<CorrelationId, PendingRequest<P, M>>,
}

impl<P, M> Default for PendingTable<P, M> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<P, M> PendingTable<P, M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &CorrelationId) -> Option<&PendingRequest<P, M>> {
        self.entries.get(id)
    }

    pub fn insert(&mut self, id: CorrelationId, request: PendingRequest<P, M>) {
        self.entries.insert(id, request);
    }

    pub fn remove(&mut self, id: &CorrelationId) -> Option<PendingRequest<P, M>> {
        self.entries.remove(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &CorrelationId> {
        self.entries.keys()
    }

    /// Remove and return every entry whose deadline is at or before `now`
    pub fn take_expired(&mut self, now: Instant) -> Vec<(CorrelationId, PendingRequest<P, M>)> {
        let expired: Vec<CorrelationId> = self
            .entries
            .iter()
            .filter(|(_, request)| request.is_expired(now))
            .map(|(id, _)| *id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|request| (id, request)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(budget_ms: u64, now: Instant) -> PendingRequest<&'static str, u32> {
        PendingRequest::new("Echo".to_string(), "hello", Duration::from_millis(budget_ms), 1, now)
    }

    #[test]
    fn test_deadline_is_now_plus_budget() {
        let now = Instant::now();
        let entry = request(250, now);
        assert_eq!(entry.deadline, now + Duration::from_millis(250));
        assert!(!entry.is_expired(now));
        assert!(entry.is_expired(now + Duration::from_millis(250)));
    }

    #[test]
    fn test_huge_budget_does_not_overflow() {
        let now = Instant::now();
        let entry = PendingRequest::new("Echo".to_string(), "hello", Duration::MAX, 1, now);
        assert!(entry.deadline >= now + FAR_FUTURE);
        assert!(!entry.is_expired(now));
        assert!(!entry.is_expired(now + Duration::from_secs(86400)));
    }

    #[test]
    fn test_insert_remove() {
        let now = Instant::now();
        let mut table = PendingTable::new();
        let id = CorrelationId::generate();
        table.insert(id, request(100, now));

        assert_eq!(table.len(), 1);
        assert!(table.contains(&id));
        assert_eq!(table.get(&id).map(|r| r.metadata), Some(1));

        let removed = table.remove(&id).unwrap();
        assert_eq!(removed.payload, "hello");
        assert!(table.is_empty());
        assert!(table.remove(&id).is_none());
    }

    #[test]
    fn test_take_expired_only_takes_elapsed() {
        let now = Instant::now();
        let mut table = PendingTable::new();
        let short = CorrelationId::generate();
        let long = CorrelationId::generate();
        table.insert(short, request(10, now));
        table.insert(long, request(10_000, now));

        let expired = table.take_expired(now + Duration::from_millis(20));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, short);
        assert_eq!(table.len(), 1);
        assert!(table.contains(&long));
    }
}
