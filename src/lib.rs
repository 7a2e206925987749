#[macro_use]
extern crate bitflags;

mod context;
mod decoder;
mod dynamic;
mod encoder;
mod error;
pub mod huffman;
pub mod integer;
mod reference;
mod static_table;

pub use context::Context;
pub use decoder::{Decoder, DecoderResult, Header};
pub use dynamic::{
    DynamicEntry, DynamicTable, DEFAULT_SETTINGS_HEADER_TABLE_SIZE, HEADER_TABLE_OVERHEAD,
};
pub use encoder::Encoder;
pub use error::{
    HpackError, HpackResult, HuffmanDecoderError, IntegerDecodingError, StringDecodingError,
};
pub use reference::{Reference, ReferenceFlags, ReferenceSet};
pub use static_table::{find_static, StaticTable, STATIC_TABLE};
