//! Void tracking, opponent tendencies and world assignment for hidden cards.

pub mod opponent;
pub mod sampler;
pub mod voids;

pub use opponent::{OpponentBook, OpponentModel};
pub use sampler::{SamplingError, Slot, World, WorldEnumerator, WorldSampler, WorldSpec};
pub use voids::{SuitMask, VoidMap};
