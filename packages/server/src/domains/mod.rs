pub mod generation;
pub mod knowledge;
pub mod program;
pub mod retrieval;
pub mod scheduler;
pub mod segments;
