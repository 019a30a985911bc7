//! The battle's tick counter and elapsed time, shared as a `Resource` so
//! any system can read "now" without threading it through every function
//! signature — mirrors the teacher's `SimTick`-as-resource convention.

use bevy_ecs::prelude::Resource;

#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimClock {
    pub tick: u64,
    pub time_ms: u64,
}

impl SimClock {
    pub fn advance(&mut self, diff_ms: u64) {
        self.tick += 1;
        self.time_ms += diff_ms;
    }
}
