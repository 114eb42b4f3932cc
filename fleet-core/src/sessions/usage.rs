use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Message type identifier reported by workers with their raw payloads.
pub type MessageType = u32;

/// Per message type ceilings. A missing entry or a ceiling of zero means
/// the type is unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageLimits {
    ceilings: HashMap<MessageType, u64>,
}

impl UsageLimits {
    pub fn new(ceilings: HashMap<MessageType, u64>) -> Self {
        Self { ceilings }
    }

    pub fn with_limit(mut self, message_type: MessageType, ceiling: u64) -> Self {
        self.ceilings.insert(message_type, ceiling);
        self
    }

    pub fn ceiling(&self, message_type: MessageType) -> Option<u64> {
        self.ceilings
            .get(&message_type)
            .copied()
            .filter(|ceiling| *ceiling > 0)
    }

    pub fn is_empty(&self) -> bool {
        self.ceilings.values().all(|ceiling| *ceiling == 0)
    }

    fn exceeded_by(&self, counts: &HashMap<MessageType, u64>) -> bool {
        self.ceilings.iter().any(|(message_type, ceiling)| {
            *ceiling > 0
                && counts.get(message_type).copied().unwrap_or(0) > *ceiling
        })
    }
}

/// Soft-limit breaker for one worker session.
#[derive(Debug)]
pub struct UsageCounter {
    limits: Arc<UsageLimits>,
    counts: Mutex<HashMap<MessageType, u64>>,
}

impl UsageCounter {
    pub fn new(limits: Arc<UsageLimits>) -> Self {
        Self {
            limits,
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn increment(&self, message_type: MessageType) -> u64 {
        let mut counts = self.counts.lock();
        let count = counts.entry(message_type).or_insert(0);
        *count += 1;
        *count
    }

    pub fn limit_exceeded(&self) -> bool {
        let counts = self.counts.lock();
        self.limits.exceeded_by(&counts)
    }

    pub fn snapshot(&self) -> HashMap<MessageType, u64> {
        self.counts.lock().clone()
    }

    pub fn reset(&self) {
        *self.counts.lock() = HashMap::new();
    }

    pub fn limits(&self) -> &UsageLimits {
        &self.limits
    }
}
