//! Shared fixtures for kernel unit tests.

use super::*;

/// Default-config demo home, paused at tick zero.
pub(crate) fn demo_world() -> WorldState {
    WorldState::new(SimConfig::default())
}
