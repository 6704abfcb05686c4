//! Passive Authentication.
//!
//! The [`engine`] runs the full pipeline for one document: SOD parse, DSC
//! extraction, chain validation against the PKD, SOD signature
//! verification, per-data-group hash checks, persistence and DSC
//! auto-registration. The [`chain`] validator is the hot path and is
//! written against the [`crate::ldap::TrustSource`] capability set only.

pub mod chain;
pub mod engine;
pub mod messages;
pub mod mrz;

pub use self::{
    chain::{ChainValidation, ChainValidator},
    engine::{PaEngine, PaOutcome, PaRequest},
    messages::{CrlStatus, ExpirationStatus, Severity, StatusMessage},
    mrz::MrzSummary,
};
