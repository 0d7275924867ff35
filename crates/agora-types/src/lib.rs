//! Agora Types - Core type definitions shared by the Agora crates.
//!
//! This crate provides:
//! - Addresses (20-byte, Bech32m encoded)
//! - Hashes (32-byte, blake3 digests)
//! - Token amounts, timestamps and basis-point arithmetic

pub mod address;
pub mod hash;
pub mod amount;
pub mod error;

#[cfg(any(feature = "serde", feature = "borsh"))]
mod serialization;

pub use address::Address;
pub use hash::Hash;
pub use amount::{
    Amount, BasisPoints, Timestamp, BPS_DENOMINATOR, SECONDS_PER_DAY, SECONDS_PER_YEAR, UNIT,
};
pub use error::TypesError;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Address, Amount, BasisPoints, Hash, Timestamp, TypesError,
        BPS_DENOMINATOR, SECONDS_PER_DAY, SECONDS_PER_YEAR, UNIT,
    };
}
