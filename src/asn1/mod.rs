//! Pure ASN1 types for the Security Object wire format, no application
//! logic.
//!
//! Parsing is done as deeply as the standards allow: the SOD is decoded all
//! the way down to the per-data-group hash entries, and unknown data group
//! numbers are retained so that inputs outside DG1..DG16 still round-trip
//! into diagnostics. Real-world SODs are not always strict DER (the ICAO
//! `0x77` application wrapper is BER), so the outer TLV is handled by a
//! bounds-checked reader rather than the DER decoder.

pub mod oids;
mod sod;

pub use self::sod::{DataGroupHash, LdsSecurityObject, LdsVersionInfo, SecurityObject, SodError};
pub(crate) use self::sod::read_ber_length;
