//! Core eligibility and state-transition engine for driver's-license
//! procedures.
//!
//! A procedure walks a holder's application through the mandatory
//! checkpoints (documentation, medical fitness, theory exam, practical
//! exam, payment) before a license can be issued. This crate owns the
//! rules: which checkpoints a procedure type requires, how credential
//! validity is computed and expires, how rejections and retries behave,
//! and how appointment slots are allocated without conflicts. Storage,
//! transport, and presentation live behind the collaborator traits in
//! each module.

pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod infra;
pub mod payments;
pub mod procedures;
pub mod scheduling;
pub mod store;
pub mod telemetry;
