pub mod models;
pub mod state_machine;

pub use models::{Citation, Segment, SegmentState};
pub use state_machine::StateTransitionError;
