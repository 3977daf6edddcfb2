//! Simple per-room counters. Emitted to stdout via `tracing` rather than a
//! dedicated sink; a real deployment would export these to a metrics
//! backend, which is out of scope here.

#[derive(Debug, Default, Clone, Copy)]
pub struct RoomMetrics {
    pub inputs_accepted: u64,
    pub inputs_dropped: u64,
    pub queue_overflows: u64,
    pub accumulator_resets: u64,
    pub ticks_executed: u64,
    pub players_joined: u64,
    pub players_left: u64,
    pub config_load_failures: u64,
}

impl RoomMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}
