//! Throttle engine over a [`KvStore`].
//!
//! Every read-check-write sequence runs under one async mutex, so two
//! concurrent requests from the same identity cannot both pass the
//! pre-check before either records its attempt.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{BlockPolicy, ThrottleRecord};
use crate::clock::Clock;
use crate::store::{KvStore, StoreResult};
use gatehouse_common::constants::store_keys::THROTTLE_PREFIX;
use gatehouse_common::{Axis, ClientIdentity, GateError};

/// Outcome of a gated attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow { remaining_attempts: u32 },
    Deny { remaining_secs: u64, reason: DenyReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// An axis of this identity was already blocked
    Blocked,
    /// This attempt went over budget
    QuotaExceeded,
    /// The IP showed up with a different fingerprint mid-window
    FingerprintChanged,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    pub fn into_result(self) -> Result<u32, GateError> {
        match self {
            Self::Allow { remaining_attempts } => Ok(remaining_attempts),
            Self::Deny { remaining_secs, .. } => Err(GateError::RateLimited { remaining_secs }),
        }
    }
}

type RecordKey = (Axis, String);

/// Records touched during one throttle operation
#[derive(Default)]
struct Ledger {
    records: HashMap<RecordKey, ThrottleRecord>,
    dirty: HashSet<RecordKey>,
}

impl Ledger {
    fn peek(&self, key: &RecordKey) -> Option<&ThrottleRecord> {
        self.records.get(key)
    }

    fn touch(&mut self, key: &RecordKey, now: DateTime<Utc>) -> &mut ThrottleRecord {
        self.dirty.insert(key.clone());
        self.records
            .entry(key.clone())
            .or_insert_with(|| ThrottleRecord::new(now))
    }
}

/// Policy-driven throttle for one endpoint family
pub struct Throttle<S> {
    name: String,
    policy: BlockPolicy,
    store: S,
    clock: Arc<dyn Clock>,
    gate: Mutex<()>,
}

impl<S: KvStore> Throttle<S> {
    pub fn new(name: impl Into<String>, policy: BlockPolicy, store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            policy,
            store,
            clock,
            gate: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &BlockPolicy {
        &self.policy
    }

    /// Decide on an attempt and record it
    pub async fn check_and_record(&self, identity: &ClientIdentity) -> StoreResult<Decision> {
        let _guard = self.gate.lock().await;
        let now = self.clock.now();
        let window = self.policy.window_delta();
        let keys = self.identity_keys(identity);

        let mut ledger = Ledger::default();
        for key in &keys {
            self.load(&mut ledger, key, now).await?;
        }

        if self.policy.cross_axis {
            if let Some(decision) = self.fingerprint_switch(&mut ledger, identity, now) {
                self.persist(&ledger, now).await?;
                return Ok(decision);
            }
            associate(&mut ledger, identity, now);
        }

        let blocked: Vec<RecordKey> = keys
            .iter()
            .filter(|k| ledger.peek(k).is_some_and(|r| r.blocked))
            .cloned()
            .collect();

        if !blocked.is_empty() {
            let remaining_secs = max_remaining(&ledger, &blocked, now, window);
            for origin in blocked {
                self.spread(&mut ledger, origin, now).await?;
            }
            self.persist(&ledger, now).await?;

            tracing::debug!(
                throttle = %self.name,
                ip = %identity.ip_address,
                fingerprint = %identity.fingerprint,
                remaining_secs,
                "Attempt denied, identity blocked"
            );
            return Ok(Decision::Deny {
                remaining_secs,
                reason: DenyReason::Blocked,
            });
        }

        let mut exceeded = Vec::new();
        for key in &keys {
            let record = ledger.touch(key, now);
            record.attempts += 1;
            if record.attempts > self.policy.max_attempts {
                record.blocked = true;
                exceeded.push(key.clone());
            }
        }

        if !exceeded.is_empty() {
            let remaining_secs = max_remaining(&ledger, &exceeded, now, window);
            for origin in exceeded {
                self.spread(&mut ledger, origin, now).await?;
            }
            self.persist(&ledger, now).await?;

            tracing::warn!(
                throttle = %self.name,
                ip = %identity.ip_address,
                fingerprint = %identity.fingerprint,
                remaining_secs,
                "Attempt budget exceeded, identity blocked"
            );
            return Ok(Decision::Deny {
                remaining_secs,
                reason: DenyReason::QuotaExceeded,
            });
        }

        let used = keys
            .iter()
            .filter_map(|k| ledger.peek(k))
            .map(|r| r.attempts)
            .max()
            .unwrap_or(0);
        self.persist(&ledger, now).await?;

        Ok(Decision::Allow {
            remaining_attempts: self.policy.max_attempts.saturating_sub(used),
        })
    }

    /// Seconds until every blocked axis of this identity clears. Read-only.
    pub async fn remaining_cooldown(&self, identity: &ClientIdentity) -> StoreResult<u64> {
        let _guard = self.gate.lock().await;
        let now = self.clock.now();
        let keys = self.identity_keys(identity);

        let mut ledger = Ledger::default();
        for key in &keys {
            self.load(&mut ledger, key, now).await?;
        }

        let blocked: Vec<RecordKey> = keys
            .into_iter()
            .filter(|k| ledger.peek(k).is_some_and(|r| r.blocked))
            .collect();
        Ok(max_remaining(&ledger, &blocked, now, self.policy.window_delta()))
    }

    /// Block the identity until its window ends (used after a successful verification)
    pub async fn mark_blocked(&self, identity: &ClientIdentity) -> StoreResult<()> {
        let _guard = self.gate.lock().await;
        let now = self.clock.now();
        let keys = self.identity_keys(identity);

        let mut ledger = Ledger::default();
        for key in &keys {
            self.load(&mut ledger, key, now).await?;
        }
        if self.policy.cross_axis {
            associate(&mut ledger, identity, now);
        }
        for key in &keys {
            ledger.touch(key, now).blocked = true;
        }
        for key in keys {
            self.spread(&mut ledger, key, now).await?;
        }
        self.persist(&ledger, now).await?;

        tracing::debug!(
            throttle = %self.name,
            ip = %identity.ip_address,
            fingerprint = %identity.fingerprint,
            "Identity blocked"
        );
        Ok(())
    }

    /// Give back one attempt, unless the identity is already blocked.
    ///
    /// Once either axis is back to zero attempts, no counted attempt pairs
    /// this IP with this fingerprint, so the peer link is dropped as well.
    pub async fn release(&self, identity: &ClientIdentity) -> StoreResult<()> {
        let _guard = self.gate.lock().await;
        let now = self.clock.now();
        let keys = self.identity_keys(identity);

        let mut ledger = Ledger::default();
        for key in &keys {
            self.load(&mut ledger, key, now).await?;
        }
        for key in &keys {
            let refundable = ledger
                .peek(key)
                .is_some_and(|r| !r.blocked && r.attempts > 0);
            if refundable {
                ledger.touch(key, now).attempts -= 1;
            }
        }

        if self.policy.cross_axis {
            let ip = (Axis::Ip, identity.ip_address.clone());
            let fp = (Axis::Fingerprint, identity.fingerprint.clone());
            let unpaired = [&ip, &fp]
                .into_iter()
                .any(|k| ledger.peek(k).is_some_and(|r| r.attempts == 0));
            if unpaired {
                dissociate(&mut ledger, identity, now);
            }
        }
        self.persist(&ledger, now).await
    }

    /// Current record for one axis identifier, if it is live
    pub async fn inspect(&self, axis: Axis, id: &str) -> StoreResult<Option<ThrottleRecord>> {
        let now = self.clock.now();
        let record = self.fetch(&(axis, id.to_string())).await?;
        Ok(record.filter(|r| !r.is_expired(now, self.policy.window_delta())))
    }

    /// Forget one axis identifier entirely
    pub async fn clear(&self, axis: Axis, id: &str) -> StoreResult<()> {
        let _guard = self.gate.lock().await;
        self.store.delete(&self.store_key(&(axis, id.to_string()))).await?;
        tracing::info!(throttle = %self.name, axis = %axis, id = %id, "Throttle record cleared");
        Ok(())
    }

    fn identity_keys(&self, identity: &ClientIdentity) -> Vec<RecordKey> {
        self.policy
            .tracked_axes()
            .into_iter()
            .map(|axis| (axis, identity.on(axis).to_string()))
            .collect()
    }

    fn store_key(&self, key: &RecordKey) -> String {
        format!("{}{}:{}:{}", THROTTLE_PREFIX, self.name, key.0.tag(), key.1)
    }

    async fn fetch(&self, key: &RecordKey) -> StoreResult<Option<ThrottleRecord>> {
        match self.store.get(&self.store_key(key)).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| GateError::Store(format!("corrupt throttle record: {}", e))),
            None => Ok(None),
        }
    }

    async fn load(&self, ledger: &mut Ledger, key: &RecordKey, now: DateTime<Utc>) -> StoreResult<()> {
        if ledger.records.contains_key(key) {
            return Ok(());
        }
        let mut record = self
            .fetch(key)
            .await?
            .unwrap_or_else(|| ThrottleRecord::new(now));
        record.refresh(now, self.policy.window_delta());
        ledger.records.insert(key.clone(), record);
        Ok(())
    }

    async fn persist(&self, ledger: &Ledger, now: DateTime<Utc>) -> StoreResult<()> {
        let window = self.policy.window_delta();
        for key in &ledger.dirty {
            let Some(record) = ledger.peek(key) else {
                continue;
            };
            let value = serde_json::to_string(record)
                .map_err(|e| GateError::Internal(format!("encode throttle record: {}", e)))?;
            let ttl = Duration::from_secs(record.remaining_secs(now, window));
            self.store.set(&self.store_key(key), &value, ttl).await?;
        }
        Ok(())
    }

    /// Deny an IP that turns up with a new fingerprint while its window is active
    fn fingerprint_switch(
        &self,
        ledger: &mut Ledger,
        identity: &ClientIdentity,
        now: DateTime<Utc>,
    ) -> Option<Decision> {
        if !self.policy.deny_fingerprint_change {
            return None;
        }

        let key = (Axis::Ip, identity.ip_address.clone());
        let switched = ledger.peek(&key).is_some_and(|r| {
            r.attempts > 0 && !r.peers.is_empty() && !r.peers.contains(&identity.fingerprint)
        });
        if !switched {
            return None;
        }

        let record = ledger.touch(&key, now);
        record.blocked = true;
        let remaining_secs = record.remaining_secs(now, self.policy.window_delta());

        tracing::warn!(
            throttle = %self.name,
            ip = %identity.ip_address,
            fingerprint = %identity.fingerprint,
            known = ?record.peers,
            "Fingerprint changed mid-window, denying"
        );
        Some(Decision::Deny {
            remaining_secs,
            reason: DenyReason::FingerprintChanged,
        })
    }

    /// Walk the co-occurrence graph from a blocked axis, blocking peers as we go
    async fn spread(&self, ledger: &mut Ledger, origin: RecordKey, now: DateTime<Utc>) -> StoreResult<()> {
        let max_hops = self.policy.propagation_hops();
        if max_hops == 0 {
            return Ok(());
        }

        let mut visited = HashSet::from([origin.clone()]);
        let mut queue = VecDeque::from([(origin, 0usize)]);

        while let Some((key, hops)) = queue.pop_front() {
            if hops >= max_hops {
                continue;
            }
            let peers: Vec<String> = ledger
                .peek(&key)
                .map(|r| r.peers.iter().cloned().collect())
                .unwrap_or_default();

            for peer in peers {
                let peer_key = (key.0.other(), peer);
                if !visited.insert(peer_key.clone()) {
                    continue;
                }
                self.load(ledger, &peer_key, now).await?;

                // The association must still be live on the peer's side too
                let paired = ledger
                    .peek(&peer_key)
                    .is_some_and(|r| r.peers.contains(&key.1));
                if !paired {
                    continue;
                }

                let record = ledger.touch(&peer_key, now);
                if !record.blocked {
                    record.block_fresh(now);
                    tracing::debug!(
                        throttle = %self.name,
                        from = %format!("{}:{}", key.0, key.1),
                        to = %format!("{}:{}", peer_key.0, peer_key.1),
                        "Block propagated"
                    );
                }
                queue.push_back((peer_key, hops + 1));
            }
        }
        Ok(())
    }
}

/// Record that this IP and fingerprint were seen together
fn associate(ledger: &mut Ledger, identity: &ClientIdentity, now: DateTime<Utc>) {
    let ip = (Axis::Ip, identity.ip_address.clone());
    let fp = (Axis::Fingerprint, identity.fingerprint.clone());

    ledger.touch(&ip, now).peers.insert(identity.fingerprint.clone());
    ledger.touch(&fp, now).peers.insert(identity.ip_address.clone());
}

fn dissociate(ledger: &mut Ledger, identity: &ClientIdentity, now: DateTime<Utc>) {
    let ip = (Axis::Ip, identity.ip_address.clone());
    let fp = (Axis::Fingerprint, identity.fingerprint.clone());

    ledger.touch(&ip, now).peers.remove(&identity.fingerprint);
    ledger.touch(&fp, now).peers.remove(&identity.ip_address);
}

fn max_remaining(
    ledger: &Ledger,
    keys: &[RecordKey],
    now: DateTime<Utc>,
    window: chrono::TimeDelta,
) -> u64 {
    keys.iter()
        .filter_map(|k| ledger.peek(k))
        .map(|r| r.remaining_secs(now, window))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::store::MemoryStore;

    fn throttle(policy: BlockPolicy) -> (Throttle<MemoryStore>, MockClock) {
        let clock = MockClock::default();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = MemoryStore::new(shared.clone());
        (Throttle::new("verify", policy, store, shared), clock)
    }

    fn who(ip: &str, fp: &str) -> ClientIdentity {
        ClientIdentity::new(ip, fp, "Mozilla/5.0")
    }

    fn loose_policy(transitive: bool) -> BlockPolicy {
        BlockPolicy {
            max_attempts: 5,
            transitive,
            deny_fingerprint_change: false,
            ..BlockPolicy::verification()
        }
    }

    #[tokio::test]
    async fn test_one_attempt_per_window() {
        let (throttle, clock) = throttle(BlockPolicy::verification());
        let id = who("1.2.3.4", "F1");

        let first = throttle.check_and_record(&id).await.unwrap();
        assert_eq!(first, Decision::Allow { remaining_attempts: 0 });

        clock.advance_secs(10);
        match throttle.check_and_record(&id).await.unwrap() {
            Decision::Deny { remaining_secs, reason } => {
                assert_eq!(reason, DenyReason::QuotaExceeded);
                assert_eq!(remaining_secs, 290);
            }
            other => panic!("expected deny, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_window_expiry_unblocks() {
        let (throttle, clock) = throttle(BlockPolicy::verification());
        let id = who("1.2.3.4", "F1");

        throttle.check_and_record(&id).await.unwrap();
        throttle.mark_blocked(&id).await.unwrap();
        assert!(!throttle.check_and_record(&id).await.unwrap().is_allowed());

        clock.advance_secs(300);
        assert_eq!(throttle.remaining_cooldown(&id).await.unwrap(), 0);
        assert!(throttle.check_and_record(&id).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_cooldown_counts_down_to_zero() {
        let (throttle, clock) = throttle(BlockPolicy::verification());
        let id = who("1.2.3.4", "F1");

        throttle.check_and_record(&id).await.unwrap();
        throttle.mark_blocked(&id).await.unwrap();

        let mut last = throttle.remaining_cooldown(&id).await.unwrap();
        assert_eq!(last, 300);
        for _ in 0..30 {
            clock.advance_secs(10);
            let now = throttle.remaining_cooldown(&id).await.unwrap();
            assert!(now <= last);
            last = now;
        }
        assert_eq!(last, 0);
    }

    #[tokio::test]
    async fn test_cooldown_is_read_only() {
        let (throttle, _clock) = throttle(BlockPolicy::verification());
        let id = who("1.2.3.4", "F1");

        for _ in 0..5 {
            assert_eq!(throttle.remaining_cooldown(&id).await.unwrap(), 0);
        }
        assert!(throttle.check_and_record(&id).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_blocked_fingerprint_blocks_new_ip() {
        let (throttle, clock) = throttle(BlockPolicy::verification());
        let original = who("5.5.5.5", "F1");
        let roaming = who("9.9.9.9", "F1");

        throttle.check_and_record(&original).await.unwrap();
        throttle.mark_blocked(&original).await.unwrap();
        clock.advance_secs(60);

        match throttle.check_and_record(&roaming).await.unwrap() {
            Decision::Deny { remaining_secs, reason } => {
                assert_eq!(reason, DenyReason::Blocked);
                assert_eq!(remaining_secs, 240);
            }
            other => panic!("expected deny, got {:?}", other),
        }

        let ip_record = throttle.inspect(Axis::Ip, "9.9.9.9").await.unwrap().unwrap();
        assert!(ip_record.blocked);
        // Propagated axis gets its own window, so it outlasts the source
        assert_eq!(throttle.remaining_cooldown(&who("9.9.9.9", "F7")).await.unwrap(), 300);
    }

    #[tokio::test]
    async fn test_blocked_ip_blocks_new_fingerprint() {
        let policy = BlockPolicy {
            deny_fingerprint_change: false,
            ..BlockPolicy::verification()
        };
        let (throttle, _clock) = throttle(policy);

        throttle.check_and_record(&who("5.5.5.5", "F1")).await.unwrap();
        throttle.mark_blocked(&who("5.5.5.5", "F1")).await.unwrap();

        let decision = throttle.check_and_record(&who("5.5.5.5", "F2")).await.unwrap();
        assert!(!decision.is_allowed());
        let fp = throttle.inspect(Axis::Fingerprint, "F2").await.unwrap().unwrap();
        assert!(fp.blocked);
    }

    #[tokio::test]
    async fn test_fingerprint_change_fails_closed() {
        let policy = BlockPolicy {
            max_attempts: 3,
            ..BlockPolicy::verification()
        };
        let (throttle, _clock) = throttle(policy);

        assert!(throttle.check_and_record(&who("1.2.3.4", "F1")).await.unwrap().is_allowed());

        match throttle.check_and_record(&who("1.2.3.4", "F2")).await.unwrap() {
            Decision::Deny { reason, .. } => assert_eq!(reason, DenyReason::FingerprintChanged),
            other => panic!("expected deny, got {:?}", other),
        }
        assert!(throttle.remaining_cooldown(&who("1.2.3.4", "F2")).await.unwrap() > 0);
        assert!(throttle.inspect(Axis::Fingerprint, "F2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_one_hop_propagation_stops_at_first_peer() {
        let (throttle, _clock) = throttle(loose_policy(false));

        throttle.check_and_record(&who("IP1", "F1")).await.unwrap();
        throttle.check_and_record(&who("IP2", "F1")).await.unwrap();
        throttle.check_and_record(&who("IP2", "F2")).await.unwrap();

        throttle.mark_blocked(&who("IP1", "F1")).await.unwrap();

        let ip2 = throttle.inspect(Axis::Ip, "IP2").await.unwrap().unwrap();
        let f2 = throttle.inspect(Axis::Fingerprint, "F2").await.unwrap().unwrap();
        assert!(ip2.blocked);
        assert!(!f2.blocked);
    }

    #[tokio::test]
    async fn test_transitive_propagation_follows_chain() {
        let (throttle, _clock) = throttle(loose_policy(true));

        throttle.check_and_record(&who("IP1", "F1")).await.unwrap();
        throttle.check_and_record(&who("IP2", "F1")).await.unwrap();
        throttle.check_and_record(&who("IP2", "F2")).await.unwrap();
        throttle.check_and_record(&who("IP3", "F2")).await.unwrap();

        throttle.mark_blocked(&who("IP1", "F1")).await.unwrap();

        for (axis, id) in [(Axis::Ip, "IP2"), (Axis::Fingerprint, "F2"), (Axis::Ip, "IP3")] {
            let record = throttle.inspect(axis, id).await.unwrap().unwrap();
            assert!(record.blocked, "{}:{} should be blocked", axis, id);
        }
    }

    #[tokio::test]
    async fn test_stale_peer_is_not_blocked() {
        let (throttle, clock) = throttle(loose_policy(false));

        throttle.check_and_record(&who("IP1", "F0")).await.unwrap();
        clock.advance_secs(200);
        throttle.check_and_record(&who("IP1", "F1")).await.unwrap();
        // IP1's window rolls over while F1 still remembers it
        clock.advance_secs(150);
        throttle.check_and_record(&who("IP1", "F9")).await.unwrap();

        throttle.mark_blocked(&who("IP2", "F1")).await.unwrap();
        let f1 = throttle.inspect(Axis::Fingerprint, "F1").await.unwrap().unwrap();
        assert!(f1.peers.contains("IP1"));
        let ip1 = throttle.inspect(Axis::Ip, "IP1").await.unwrap().unwrap();
        assert!(!ip1.blocked);
    }

    #[tokio::test]
    async fn test_release_refunds_attempt() {
        let (throttle, _clock) = throttle(BlockPolicy::verification());
        let id = who("1.2.3.4", "F1");

        assert!(throttle.check_and_record(&id).await.unwrap().is_allowed());
        throttle.release(&id).await.unwrap();
        assert!(throttle.check_and_record(&id).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_release_drops_unbacked_peer_link() {
        let (throttle, _clock) = throttle(loose_policy(false));

        throttle.check_and_record(&who("IP1", "F1")).await.unwrap();
        throttle.release(&who("IP1", "F1")).await.unwrap();

        let fp = throttle.inspect(Axis::Fingerprint, "F1").await.unwrap().unwrap();
        assert!(fp.peers.is_empty());
        let ip = throttle.inspect(Axis::Ip, "IP1").await.unwrap().unwrap();
        assert!(ip.peers.is_empty());

        // A later block on IP1 no longer reaches F1
        throttle.mark_blocked(&who("IP1", "F2")).await.unwrap();
        let fp = throttle.inspect(Axis::Fingerprint, "F1").await.unwrap().unwrap();
        assert!(!fp.blocked);
        assert!(throttle.check_and_record(&who("IP3", "F1")).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_release_keeps_link_backed_by_counted_attempt() {
        let (throttle, _clock) = throttle(loose_policy(false));

        throttle.check_and_record(&who("IP1", "F1")).await.unwrap();
        throttle.check_and_record(&who("IP1", "F1")).await.unwrap();
        throttle.release(&who("IP1", "F1")).await.unwrap();

        let fp = throttle.inspect(Axis::Fingerprint, "F1").await.unwrap().unwrap();
        assert_eq!(fp.attempts, 1);
        assert!(fp.peers.contains("IP1"));
    }

    #[tokio::test]
    async fn test_polling_policy_tracks_ip_only() {
        let (throttle, _clock) = throttle(BlockPolicy::polling());

        for i in 0..10 {
            let id = who("1.2.3.4", &format!("F{}", i));
            assert!(throttle.check_and_record(&id).await.unwrap().is_allowed());
        }
        let decision = throttle.check_and_record(&who("1.2.3.4", "F0")).await.unwrap();
        assert!(matches!(decision, Decision::Deny { reason: DenyReason::QuotaExceeded, .. }));

        assert!(throttle.check_and_record(&who("4.3.2.1", "F0")).await.unwrap().is_allowed());
        assert!(throttle.inspect(Axis::Fingerprint, "F0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_attempts_admit_one() {
        let (throttle, _clock) = throttle(BlockPolicy::verification());
        let throttle = Arc::new(throttle);
        let id = who("1.2.3.4", "F1");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let throttle = throttle.clone();
                let id = id.clone();
                tokio::spawn(async move { throttle.check_and_record(&id).await.unwrap() })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap().is_allowed() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 1);
    }

    #[tokio::test]
    async fn test_clear_unblocks_axis() {
        let policy = BlockPolicy {
            cross_axis: false,
            ..BlockPolicy::verification()
        };
        let (throttle, _clock) = throttle(policy);
        let id = who("1.2.3.4", "F1");

        throttle.check_and_record(&id).await.unwrap();
        throttle.mark_blocked(&id).await.unwrap();
        assert!(throttle.remaining_cooldown(&id).await.unwrap() > 0);

        throttle.clear(Axis::Fingerprint, "F1").await.unwrap();
        assert_eq!(throttle.remaining_cooldown(&id).await.unwrap(), 0);
    }
}
