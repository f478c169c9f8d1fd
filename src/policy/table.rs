use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::types::{Action, Priority, RuleAttr};

use super::key::{IdentityRuleKey, NetworkRuleKey};

#[derive(Debug)]
struct RuleEntry {
    action: Action,
    hits: AtomicU64,
}

/// Exact-match rule store. Wildcard fallback is the caller's job.
///
/// Lookups share the read lock and bump the hit counter atomically, so
/// concurrent matches of one rule never lose a count.
#[derive(Debug)]
pub struct RuleTable<K> {
    rules: RwLock<HashMap<K, RuleEntry>>,
}

pub type NetworkRuleTable = RuleTable<NetworkRuleKey>;
pub type IdentityRuleTable = RuleTable<IdentityRuleKey>;

impl<K: Eq + Hash> RuleTable<K> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rules: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Count a hit on `key` and return the rule with its post-increment count.
    pub fn lookup(&self, key: &K) -> Option<RuleAttr> {
        let rules = self.rules.read();
        let entry = rules.get(key)?;
        let hits = entry.hits.fetch_add(1, Ordering::Relaxed) + 1;
        Some(RuleAttr {
            action: entry.action,
            hits,
        })
    }

    /// Current state of `key` without counting a hit.
    pub fn get(&self, key: &K) -> Option<RuleAttr> {
        self.rules.read().get(key).map(|entry| RuleAttr {
            action: entry.action,
            hits: entry.hits.load(Ordering::Relaxed),
        })
    }

    /// Insert or replace a rule. A replaced rule's hit count is discarded.
    pub fn upsert(&self, key: K, action: Action) -> Option<RuleAttr> {
        let entry = RuleEntry {
            action,
            hits: AtomicU64::new(0),
        };
        self.rules
            .write()
            .insert(key, entry)
            .map(|old| RuleAttr {
                action: old.action,
                hits: old.hits.into_inner(),
            })
    }

    pub fn delete(&self, key: &K) -> Option<RuleAttr> {
        self.rules.write().remove(key).map(|old| RuleAttr {
            action: old.action,
            hits: old.hits.into_inner(),
        })
    }

    pub fn clear(&self) {
        self.rules.write().clear();
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash> Default for RuleTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// One network rule table per priority.
#[derive(Debug, Default)]
pub struct NetworkChains {
    high: NetworkRuleTable,
    medium: NetworkRuleTable,
    low: NetworkRuleTable,
}

impl NetworkChains {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            high: RuleTable::with_capacity(capacity),
            medium: RuleTable::with_capacity(capacity),
            low: RuleTable::with_capacity(capacity),
        }
    }

    pub fn chain(&self, priority: Priority) -> &NetworkRuleTable {
        match priority {
            Priority::High => &self.high,
            Priority::Medium => &self.medium,
            Priority::Low => &self.low,
        }
    }

    /// Chains in lookup order
    pub fn iter(&self) -> impl Iterator<Item = (Priority, &NetworkRuleTable)> {
        Priority::ALL.into_iter().map(move |p| (p, self.chain(p)))
    }
}
