pub mod vibes_builder;
pub mod vibes_event;

/// Longest wait, in microseconds, before the synthetic release injected when
/// a still-active lane is tapped again
pub const RETRIGGER_GAP_MICROS: i64 = 75_000;
