//! `rollcall-engine`: the campaign engine.
//!
//! # Overview
//!
//! A campaign tracks one Discord message + emoji pair with a reminder time.
//! The engine's four moving parts operate per campaign:
//!
//! | Module       | Responsibility                                            |
//! |--------------|-----------------------------------------------------------|
//! | [`tally`]    | Read current reactors, filter bots, persist new opt-ins   |
//! | [`build`]    | Chunk the mention roster under Discord's message ceiling  |
//! | [`send`]     | Dispatch chunks in order with delays, retry and audit log |
//! | [`schedule`] | Run every due campaign on an external tick                |
//!
//! [`lifecycle`] is the thin create/get/list/update/delete surface over the
//! store. All Discord access goes through the [`rollcall_discord::ChatApi`]
//! trait so the whole engine is testable against a scripted fake.

pub mod build;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod schedule;
pub mod send;
pub mod tally;

pub use build::{build, Broadcast, MAX_MESSAGE_CODEPOINTS};
pub use config::EngineTuning;
pub use error::{EngineError, Result};
pub use schedule::{run_due, DueOutcome};
pub use send::{send, SendSummary};
pub use tally::{tally, TallySummary};
