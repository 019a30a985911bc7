//! Abstract external-interface records (spec.md §6). These are the
//! in-process Rust shapes for what an external session layer would
//! encode to the documented binary wire format — this crate never does
//! that encoding itself (out of scope per spec.md §1), it only emits
//! these `serde`-serializable records, mirroring how the teacher's
//! `Snapshot` types are the serializable surface handed to callers.

use crate::guid::ObjectGuid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    MsgMoveStart,
    MsgMoveStop,
    MsgMoveSync,
    MsgChargeStart,
    MsgChargeStop,
    MsgStaminaSync,
    SmsgUpdateObject,
    SmsgDestroyObject,
    SmsgBattleUpdate,
}

pub const MOVEMENT_FLAG_WALKING: u32 = 1;
pub const MOVEMENT_FLAG_HANDUP: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementInfo {
    pub guid: u32,
    pub counter: u32,
    pub flags: u32,
    pub x: f32,
    pub y: f32,
    pub orientation: f32,
    pub time: i32,
}

pub const STAMINA_FLAG_ATTACK: u32 = 1;
pub const STAMINA_FLAG_CHARGING: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaminaInfo {
    pub guid: u32,
    pub counter: u32,
    pub flags: u32,
    pub stamina: i32,
    pub max_stamina: i32,
    pub stamina_regen_rate: f32,
    pub charge_start_stamina: i32,
    pub charged_stamina: i32,
    pub charge_consumes_stamina: i32,
    pub charge_counter: u32,
    pub time: i32,
    pub attack_counter: u32,
    pub consumed_stamina_total: u32,
    pub attack_info_counter: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub guid: u32,
    pub x: f32,
    pub y: f32,
    pub time: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateType {
    Values = 0,
    Create = 1,
    OutOfRange = 2,
}

/// One field update mask word per 32 tracked fields, following spec.md
/// §6's `ceil(field_count/32) * u32` layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldUpdateMask {
    pub words: Vec<u32>,
}

impl FieldUpdateMask {
    pub fn with_field_count(field_count: u32) -> Self {
        let words = ((field_count + 31) / 32).max(1) as usize;
        Self { words: vec![0; words] }
    }

    pub fn mark(&mut self, field_index: u32) {
        let word = (field_index / 32) as usize;
        let bit = field_index % 32;
        if word < self.words.len() {
            self.words[word] |= 1 << bit;
        }
    }

    pub fn is_set(&self, field_index: u32) -> bool {
        let word = (field_index / 32) as usize;
        let bit = field_index % 32;
        self.words.get(word).map(|w| (w & (1 << bit)) != 0).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBlock {
    pub update_type: UpdateType,
    pub flags: u32,
    pub guid: u32,
    pub type_id: Option<u8>, // present only for UpdateType::Create
    pub field_mask: FieldUpdateMask,
    pub changed_field_values: Vec<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutOfRangeBlock {
    pub guids: Vec<u32>,
}

/// Per-observer batch flushed as one `SMSG_UPDATE_OBJECT` opcode at the
/// end of a tick (spec.md §4.1 "coalesced delta emission").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateObjectBatch {
    pub blocks: Vec<UpdateBlock>,
    pub out_of_range: OutOfRangeBlock,
}

impl UpdateObjectBatch {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.out_of_range.guids.is_empty()
    }
}

macro_rules! bitflags_battle_update {
    (
        pub struct $name:ident: $ty:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
        pub struct $name(pub $ty);
        impl $name {
            $(pub const $flag: $ty = $value;)*
            pub fn empty() -> Self { Self(0) }
            pub fn set(&mut self, f: $ty) { self.0 |= f; }
            pub fn contains(&self, f: $ty) -> bool { (self.0 & f) == f }
        }
    };
}

bitflags_battle_update! {
    pub struct BattleUpdateFlags: u32 {
        const STATE = 1 << 0;
        const PREPARATION_DURATION = 1 << 1;
        const BATTLE_DURATION = 1 << 2;
        const START_TIME = 1 << 3;
        const ALIVE_COUNT = 1 << 4;
        const MAGICBEAN_COUNT = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleState {
    None,
    Preparing,
    InProgress,
    Ending,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleUpdate {
    pub flags: BattleUpdateFlags,
    pub state: Option<BattleState>,
    pub preparation_duration_ms: Option<u64>,
    pub battle_duration_ms: Option<u64>,
    pub start_time_ms: Option<u64>,
    pub alive_count: Option<u32>,
    pub magicbean_count: Option<u32>,
}

pub fn guid_to_wire(guid: ObjectGuid) -> u32 {
    guid.raw()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_field_mask_round_trips_as_identity() {
        let mask = FieldUpdateMask::with_field_count(40);
        assert!(mask.is_empty());
        let json = serde_json::to_string(&mask).unwrap();
        let restored: FieldUpdateMask = serde_json::from_str(&json).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn marking_a_field_is_observed_through_is_set() {
        let mut mask = FieldUpdateMask::with_field_count(40);
        mask.mark(35);
        assert!(mask.is_set(35));
        assert!(!mask.is_set(34));
    }

    #[test]
    fn unchanged_object_update_batch_has_empty_field_mask() {
        let block = UpdateBlock {
            update_type: UpdateType::Values,
            flags: 0,
            guid: 1,
            type_id: None,
            field_mask: FieldUpdateMask::with_field_count(8),
            changed_field_values: vec![],
        };
        assert!(block.field_mask.is_empty());
    }
}
