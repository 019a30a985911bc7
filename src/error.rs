//! Fatal-error taxonomy for the simulation core.
//!
//! Only categories 1–2 of the error design (invariant violations, missing
//! template lookups) are represented here. Recoverable conditions (no
//! path, invalidated target, pickup refusal, launch failure) propagate as
//! ordinary values through the call sites that expect them, not as
//! `SimError` — wrapping them here would misrepresent the taxonomy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("object guid counter overflowed for type {type_id}: {counter} > {max}")]
    GuidOverflow {
        type_id: u8,
        counter: u32,
        max: u32,
    },

    #[error("reference unlinked twice: {debug_name}")]
    ReferenceDoubleUnlink { debug_name: &'static str },

    #[error("grid relocation out of bounds: ({cx}, {cy}) not within [0, {size})")]
    GridBoundsViolation { cx: i32, cy: i32, size: i32 },

    #[error("stamina went negative for entity {entity_bits}: {value}")]
    NegativeStamina { entity_bits: u64, value: i32 },

    #[error("template id {0} not found in loaded template data")]
    MissingTemplate(u32),

    #[error("reward ledger inconsistent: agg_damage={agg_damage} after awarding {awarded}")]
    RewardLedgerInconsistent { agg_damage: i64, awarded: i64 },
}
