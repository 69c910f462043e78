use std::collections::HashSet;
use std::sync::Mutex;

/// The authoritative in-memory view of currently-blocked addresses.
///
/// The raw set is never exposed; every operation is one critical section, and
/// the lock is never held across a firewall or network call. The view only
/// eventually matches firewall reality: `replace_all` rewrites it wholesale
/// from the firewall's own deny list each resync cycle.
pub struct BanStore {
    blocked: Mutex<HashSet<String>>,
}

impl BanStore {
    pub fn new() -> Self {
        Self {
            blocked: Mutex::new(HashSet::new()),
        }
    }

    /// Check-then-set in a single critical section. Returns false when the
    /// address is already blocked, so duplicate observations deduplicate here
    /// and exactly one caller proceeds with the ban side effects.
    pub fn try_block(&self, ip: &str) -> bool {
        self.blocked.lock().unwrap().insert(ip.to_string())
    }

    pub fn unblock(&self, ip: &str) {
        self.blocked.lock().unwrap().remove(ip);
    }

    /// Wholesale overwrite from firewall ground truth, not a merge.
    pub fn replace_all(&self, addrs: HashSet<String>) {
        *self.blocked.lock().unwrap() = addrs;
    }

    pub fn is_blocked(&self, ip: &str) -> bool {
        self.blocked.lock().unwrap().contains(ip)
    }

    pub fn len(&self) -> usize {
        self.blocked.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_block_is_first_observation_wins() {
        let store = BanStore::new();
        assert!(store.try_block("10.0.0.5"));
        assert!(!store.try_block("10.0.0.5"));
        assert!(store.is_blocked("10.0.0.5"));
    }

    #[test]
    fn unblock_allows_reblocking() {
        let store = BanStore::new();
        assert!(store.try_block("10.0.0.5"));
        store.unblock("10.0.0.5");
        assert!(!store.is_blocked("10.0.0.5"));
        assert!(store.try_block("10.0.0.5"));
    }

    #[test]
    fn replace_all_overwrites_not_merges() {
        let store = BanStore::new();
        store.try_block("10.0.0.5");
        store.try_block("10.0.0.6");
        store.replace_all(HashSet::from(["192.168.1.1".to_string()]));
        assert!(!store.is_blocked("10.0.0.5"));
        assert!(!store.is_blocked("10.0.0.6"));
        assert!(store.is_blocked("192.168.1.1"));
        assert_eq!(store.len(), 1);
    }
}
