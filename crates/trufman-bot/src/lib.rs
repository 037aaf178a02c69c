pub mod bot;
pub mod error;
pub mod memory;
pub mod policy;

pub use bot::{
    BidPlanner, BotContext, BotParams, CancelFlag, FeatureKey, PlayPlanner, WinEstimate,
    WinEstimator,
};
pub use error::AgentError;
pub use memory::{BotMemory, MemoryHandle, WeightTable};
pub use policy::{BaselinePolicy, Decision, LearningPolicy, Policy};
