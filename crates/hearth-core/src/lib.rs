//! Tick-driven planning kernel for the Hearth ambient-agent simulation.
//!
//! Each tick the orchestrator snapshots a planning context per agent, asks
//! the admission policy whether fresh inference is warranted, routes admitted
//! requests through the budgeted batch scheduler (cache first, then at most
//! `inference_call_cap` concurrent backend calls), and degrades to the
//! deterministic heuristic planner everywhere else. Winning actions come
//! back from an external mediator and are applied under physical rate
//! limits; a homeostatic director nudges the world to keep conflict and
//! cooperation frequency inside a target band.

pub mod admission;
pub mod agent;
pub mod cache;
pub mod context;
pub mod director;
pub mod heuristic;
pub mod inference;
pub mod mediator;
pub mod scheduler;
pub mod world;

/// SplitMix64-style seed mixing used wherever the kernel needs a
/// deterministic pseudo-random stream without a RNG dependency.
pub(crate) fn mix_seed(seed: u64, salt: u64) -> u64 {
    let mut value = seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    value ^= value.rotate_left(29);
    value = value.wrapping_mul(0x517C_C1B7_2722_0A95);
    value ^ (value >> 31)
}

/// Deterministic sample in `[min, max]` for the given seed/stream pair.
pub(crate) fn sample_range_f64(seed: u64, stream: u64, min: f64, max: f64) -> f64 {
    if max <= min {
        return min;
    }
    let unit = (mix_seed(seed, stream) % 10_000) as f64 / 10_000.0;
    min + unit * (max - min)
}
