//! Typed column buffers and the builders that fill them.
//!
//! A builder owns one [`ByteArena`] for values, a one-byte-per-row null map
//! and, for variable-length kinds, a per-row length array. Finished buffers
//! are handed to the raw block encoder without further copies.

mod arena;
mod buffer;
mod builder;
mod scalar;

pub use arena::{ByteArena, ByteWriter};
pub use buffer::{TypedColumnBuffer, VarValues};
pub use builder::{AnyColumnBuilder, FixedColumnBuilder, VarColumnBuilder};
pub use scalar::Scalar;
