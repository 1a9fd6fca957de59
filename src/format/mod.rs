//! Tile payload formats.
//!
//! MRF data files hold independently decodable tiles. The declared codec of a
//! dataset comes from its data file extension; on the read path the payload's
//! signature is checked against that declaration to pick the response
//! `Content-Type`. Tiles are never re-encoded.

pub mod codec;

pub use codec::{
    is_data_file, is_index_file, sniff_payload, PayloadKind, TileFormat, DATA_EXTENSIONS,
    INDEX_EXTENSION,
};
