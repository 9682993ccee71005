use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{KeyValueStore, parse_counter};
use crate::errors::StoreUnavailable;

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Process-local store. Cheap to construct; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slots<R>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Slot>, Instant) -> Result<R, StoreUnavailable>,
    ) -> Result<R, StoreUnavailable> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| StoreUnavailable("memory store mutex poisoned".into()))?;
        let now = Instant::now();
        slots.retain(|_, slot| slot.live(now));
        f(&mut slots, now)
    }
}

fn expiry(now: Instant, ttl: Duration) -> Option<Instant> {
    if ttl.is_zero() {
        None
    } else {
        now.checked_add(ttl)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreUnavailable> {
        self.with_slots(|slots, _| Ok(slots.get(key).map(|s| s.value.clone())))
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreUnavailable> {
        self.with_slots(|slots, now| {
            slots.insert(
                key.to_string(),
                Slot {
                    value: value.to_string(),
                    expires_at: expiry(now, ttl),
                },
            );
            Ok(())
        })
    }

    fn increment(&self, key: &str, ttl: Duration) -> Result<i64, StoreUnavailable> {
        self.with_slots(|slots, now| {
            let next = match slots.get_mut(key) {
                Some(slot) => {
                    let next = parse_counter(key, &slot.value)?.saturating_add(1);
                    slot.value = next.to_string();
                    next
                }
                None => {
                    slots.insert(
                        key.to_string(),
                        Slot {
                            value: "1".into(),
                            expires_at: expiry(now, ttl),
                        },
                    );
                    1
                }
            };
            Ok(next)
        })
    }

    fn forget(&self, key: &str) -> Result<(), StoreUnavailable> {
        self.with_slots(|slots, _| {
            slots.remove(key);
            Ok(())
        })
    }
}
