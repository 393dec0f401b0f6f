pub mod models;

pub use models::{BroadcastSchedule, ConversationFormat, Dj, FormatClock, FormatSlot, Program};
