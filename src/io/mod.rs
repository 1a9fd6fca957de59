//! Positional I/O for tile store files.
//!
//! The [`RangeReader`] trait is the seam between the tile store and the
//! filesystem; [`LocalRangeReader`] implements it with `pread`-style reads on
//! a shared file handle so concurrent tile requests never contend on a seek
//! cursor.

mod file_reader;
mod range_reader;

pub use file_reader::LocalRangeReader;
pub use range_reader::{read_u64_be, RangeReader};
