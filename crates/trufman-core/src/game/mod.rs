pub mod match_state;
pub mod serialization;
pub mod snapshot;
pub mod table;
