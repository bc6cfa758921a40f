//! Identity and encoding
//!
//! Pure functions and layouts that connect the two sides of the bridge:
//! the PDA seed table, the Borsh account/instruction shapes, the EVM ABI
//! surface and the inner/outer hash derivation.

pub mod abi;
pub mod accounts;
pub mod hash;
pub mod seeds;
