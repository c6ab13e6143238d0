//! The sampling session: worker loop, temporal stabilization, and the
//! result channel to the presentation layer.

pub mod queue;
pub mod runner;
pub mod stabilizer;

pub use queue::{create_result_channel, CycleResult};
pub use runner::{start, SamplerHandle};
pub use stabilizer::{StabilizedState, DEFAULT_HOLD_MS};
