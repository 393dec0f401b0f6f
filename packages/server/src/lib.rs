//! Core library for the Segment Production Pipeline: the durable job queue,
//! scheduler, retrieval engine, and segment state machine that turn a living
//! knowledge base into an hourly broadcast of scheduled, spoken-audio
//! segments.
//!
//! Playout, TTS synthesis, LLM script generation, and audio mastering are
//! external collaborators; this crate only implements the core pipeline and
//! the typed contracts at its edges.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::Config;
