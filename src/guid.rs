//! 32-bit object GUIDs: high 8 bits type discriminant, low 24 bits a
//! monotonic per-type counter. Grounded on `original_source`'s
//! `ObjectGuid` (high/low split) and spec.md §3.

use crate::error::SimError;
use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const GUID_COUNTER_BITS: u32 = 24;
pub const GUID_COUNTER_MAX: u32 = (1 << GUID_COUNTER_BITS) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObjectTypeId {
    Player = 0,
    Robot = 1,
    ItemBox = 2,
    Item = 3,
    CarriedItem = 4,
    Projectile = 5,
    UnitLocator = 6,
}

impl ObjectTypeId {
    pub const ALL: [ObjectTypeId; 7] = [
        ObjectTypeId::Player,
        ObjectTypeId::Robot,
        ObjectTypeId::ItemBox,
        ObjectTypeId::Item,
        ObjectTypeId::CarriedItem,
        ObjectTypeId::Projectile,
        ObjectTypeId::UnitLocator,
    ];
}

/// A 32-bit object identifier: `(type_id << 24) | counter`. `ObjectGuid::EMPTY` (0)
/// never denotes a live object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectGuid(u32);

impl ObjectGuid {
    pub const EMPTY: ObjectGuid = ObjectGuid(0);

    pub fn new(type_id: ObjectTypeId, counter: u32) -> Self {
        debug_assert!(counter <= GUID_COUNTER_MAX);
        ObjectGuid(((type_id as u32) << GUID_COUNTER_BITS) | (counter & GUID_COUNTER_MAX))
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn type_discriminant(self) -> u8 {
        (self.0 >> GUID_COUNTER_BITS) as u8
    }

    pub fn counter(self) -> u32 {
        self.0 & GUID_COUNTER_MAX
    }
}

/// Per-type monotonic counters. Overflow is a fatal invariant violation
/// (spec.md §8 boundary test: asserted fatal at counter = 2^24 + 1).
#[derive(Debug, Default, Resource)]
pub struct GuidAllocator {
    counters: HashMap<u8, u32>,
}

impl GuidAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, type_id: ObjectTypeId) -> Result<ObjectGuid, SimError> {
        let key = type_id as u8;
        let next = self.counters.get(&key).copied().unwrap_or(0) + 1;
        if next > GUID_COUNTER_MAX {
            tracing::error!(type_id = key, counter = next, "guid counter overflow");
            return Err(SimError::GuidOverflow {
                type_id: key,
                counter: next,
                max: GUID_COUNTER_MAX,
            });
        }
        self.counters.insert(key, next);
        Ok(ObjectGuid::new(type_id, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_round_trips_type_and_counter() {
        let guid = ObjectGuid::new(ObjectTypeId::Robot, 17);
        assert_eq!(guid.type_discriminant(), ObjectTypeId::Robot as u8);
        assert_eq!(guid.counter(), 17);
        assert!(!guid.is_empty());
    }

    #[test]
    fn empty_guid_is_zero() {
        assert!(ObjectGuid::EMPTY.is_empty());
    }

    #[test]
    fn allocator_increments_monotonically_per_type() {
        let mut alloc = GuidAllocator::new();
        let a = alloc.allocate(ObjectTypeId::Player).unwrap();
        let b = alloc.allocate(ObjectTypeId::Player).unwrap();
        let c = alloc.allocate(ObjectTypeId::Robot).unwrap();
        assert_eq!(a.counter(), 1);
        assert_eq!(b.counter(), 2);
        assert_eq!(c.counter(), 1);
    }

    #[test]
    fn allocator_overflow_is_fatal() {
        let mut alloc = GuidAllocator::new();
        alloc.counters.insert(ObjectTypeId::Robot as u8, GUID_COUNTER_MAX);
        let result = alloc.allocate(ObjectTypeId::Robot);
        assert!(result.is_err());
    }
}
