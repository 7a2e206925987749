//! Exposes the struct `Encoder` that turns an ordered header list into an
//! HPACK-encoded block while mutating the connection context exactly the way
//! the peer's decoder will.
//!
//! The encoding strategy leans on the reference set: headers the peer is
//! already treating as implicitly emitted cost zero bytes on the wire, stale
//! references are toggled off, and everything else is represented through
//! the cheapest of indexed, name-indexed or fully literal forms. String
//! literals use whichever of the raw and Huffman representations is shorter.
//!
//! # Example
//!
//! ```rust
//! use hpackparse::Encoder;
//! let mut encoder = Encoder::new();
//!
//! let headers = vec![(b":method".to_vec(), b"GET".to_vec())];
//! // A static table hit encodes as a single indexed octet.
//! assert_eq!(encoder.encode(&headers).unwrap(), [0x82]);
//! // The peer now holds a reference, so repeating the block is free.
//! assert!(encoder.encode(&headers).unwrap().is_empty());
//! ```

use std::io;

use crate::context::Context;
use crate::decoder::Header;
use crate::huffman::HuffmanEncoder;
use crate::integer::encode_integer_into;
use crate::reference::ReferenceFlags;
use crate::static_table::{find_static, STATIC_TABLE};
use crate::HpackResult;

pub struct Encoder {
    pub context: Context,
}

impl Encoder {
    pub fn new() -> Encoder {
        Encoder {
            context: Context::default(),
        }
    }

    /// Creates a new `Encoder` operating on the given connection context.
    pub fn with_context(context: Context) -> Encoder {
        Encoder { context }
    }

    /// Sets a new maximum dynamic table size for the encoder, as signalled
    /// through SETTINGS. The next encoded block will lead with the matching
    /// dynamic table size update when the ceiling shrank.
    pub fn set_max_table_size(&mut self, new_max_size: usize) {
        self.context.set_max_table_size(new_max_size);
    }

    /// Encodes the given headers and returns a newly allocated `Vec`
    /// containing the bytes of the header block.
    pub fn encode(&mut self, headers: &[Header]) -> HpackResult<Vec<u8>> {
        let mut encoded: Vec<u8> = Vec::new();
        self.encode_into(headers, &mut encoded)?;
        Ok(encoded)
    }

    /// Encodes the given headers into the given `io::Write` instance.
    ///
    /// Any error leaves the context in a state that is no longer guaranteed
    /// to match the peer's; the connection must be torn down, the same as
    /// for a decode error.
    pub fn encode_into<W: io::Write>(
        &mut self,
        headers: &[Header],
        writer: &mut W,
    ) -> HpackResult<()> {
        log::trace!("hpack: encoding block; headers={}", headers.len());

        // A lowered ceiling must be acknowledged before anything else.
        if let Some(new_max) = self.context.pending_size_update() {
            encode_integer_into(new_max, 5, 0x20, writer)?;
        }

        // Toggle off every reference the current block does not carry, so
        // the peer's end-of-block replay stays in step.
        let stale: Vec<u64> = self
            .context
            .reference_set()
            .iter()
            .map(|r| r.generation)
            .filter(|&generation| {
                match self.context.dynamic_table().get_by_generation(generation) {
                    Some(entry) => !headers
                        .iter()
                        .any(|h| h.0 == entry.name && h.1 == entry.value),
                    None => true,
                }
            })
            .collect();
        for generation in stale {
            if let Some(index) = self.context.index_of_generation(generation) {
                self.encode_indexed(index, writer)?;
            }
            self.context.reference_set_mut().remove(generation);
        }

        let mut silent: Vec<(u64, Header)> = Vec::new();
        for header in headers.iter() {
            if let Some(generation) = self.encode_header_into(header, writer)? {
                silent.push((generation, header.clone()));
            }
        }

        // A later insertion in this same block may have evicted an entry the
        // replay was going to cover; such headers must still reach the peer,
        // as plain literals.
        for (generation, header) in silent {
            if !self.context.reference_set().contains(generation) {
                self.encode_literal_without_indexing(&header, writer)?;
            }
        }

        self.context.reference_set_mut().reset_flags();
        Ok(())
    }

    /// Encodes a single given header into the given `io::Write` instance.
    ///
    /// Returns the generation of the reference the header was left riding on
    /// when nothing was written for it.
    fn encode_header_into<W: io::Write>(
        &mut self,
        header: &Header,
        writer: &mut W,
    ) -> HpackResult<Option<u64>> {
        // The peer will replay a still-referenced header by itself; spending
        // bytes on it would make it arrive twice.
        if let Some(generation) = self.find_unemitted_reference(header) {
            self.context.reference_set_mut().mark_emitted(generation);
            return Ok(Some(generation));
        }

        let dynamic = self.context.dynamic_table().find(&header.0, &header.1);
        if let Some((position, true)) = dynamic {
            let generation = match self.context.dynamic_table().get(position) {
                Some(entry) => entry.generation(),
                None => return Err(crate::HpackError::InvalidIndex),
            };
            if !self.context.reference_set().contains(generation) {
                // The full header sits in the dynamic table: a one-integer
                // toggle-on is the cheapest representation there is.
                self.encode_indexed(position + STATIC_TABLE.len(), writer)?;
                self.context.reference_set_mut().add(generation);
                return Ok(None);
            }
        }

        match find_static(&header.0, &header.1) {
            Some((index, true)) => {
                // A static hit is emitted by index; the peer will copy it
                // into its dynamic table, so this side does the same.
                self.encode_indexed(index, writer)?;
                if let Some(generation) =
                    self.context.insert(header.0.clone(), header.1.clone())
                {
                    self.context.reference_set_mut().add(generation);
                }
            }
            Some((index, false)) => {
                // The name of the header is at the given index, but the
                // value does not match the current one: need to encode
                // only the value as a literal.
                self.encode_indexed_name(index, &header.1, writer)?;
                if let Some(generation) =
                    self.context.insert(header.0.clone(), header.1.clone())
                {
                    self.context.reference_set_mut().add(generation);
                }
            }
            None => {
                // The name might still sit in the dynamic table. Resolution
                // happens against pre-insertion state.
                let name_index = dynamic.map(|(position, _)| position + STATIC_TABLE.len());
                match name_index {
                    Some(index) => self.encode_indexed_name(index, &header.1, writer)?,
                    None => self.encode_literal(header, writer)?,
                }
                if let Some(generation) =
                    self.context.insert(header.0.clone(), header.1.clone())
                {
                    self.context.reference_set_mut().add(generation);
                }
            }
        }
        Ok(None)
    }

    /// Finds a reference whose entry equals the header and which has not yet
    /// been spent on the current block.
    fn find_unemitted_reference(&self, header: &Header) -> Option<u64> {
        for r in self.context.reference_set().iter() {
            if r.flags.contains(ReferenceFlags::EMITTED) {
                continue;
            }
            if let Some(entry) = self.context.dynamic_table().get_by_generation(r.generation) {
                if entry.name == header.0 && entry.value == header.1 {
                    return Some(r.generation);
                }
            }
        }
        None
    }

    /// Encodes a header as a literal with incremental indexing, i.e. both
    /// the name and the value encoded as string literals.
    fn encode_literal<W: io::Write>(&mut self, header: &Header, writer: &mut W) -> HpackResult<()> {
        writer.write_all(&[0x40])?;
        self.encode_string_into(&header.0, writer)?;
        self.encode_string_into(&header.1, writer)?;
        Ok(())
    }

    /// Encodes a header as a literal without indexing, leaving every table
    /// and the reference set untouched on both sides.
    fn encode_literal_without_indexing<W: io::Write>(
        &mut self,
        header: &Header,
        writer: &mut W,
    ) -> HpackResult<()> {
        match find_static(&header.0, &header.1) {
            Some((index, _)) => encode_integer_into(index, 4, 0x00, writer)?,
            None => {
                writer.write_all(&[0x00])?;
                self.encode_string_into(&header.0, writer)?;
            }
        }
        self.encode_string_into(&header.1, writer)?;
        Ok(())
    }

    /// Encodes a header whose name is indexed, with incremental indexing.
    fn encode_indexed_name<W: io::Write>(
        &mut self,
        name_index: usize,
        value: &[u8],
        writer: &mut W,
    ) -> HpackResult<()> {
        encode_integer_into(name_index, 6, 0x40, writer)?;
        self.encode_string_into(value, writer)?;
        Ok(())
    }

    /// Encodes an indexed header (a header that is fully in the flat index
    /// space), with the `1xxxxxxx` bit pattern.
    fn encode_indexed<W: io::Write>(&self, index: usize, writer: &mut W) -> HpackResult<()> {
        encode_integer_into(index, 7, 0x80, writer)?;
        Ok(())
    }

    /// Encodes a string literal, picking whichever of the raw and Huffman
    /// representations comes out shorter. Ties go to raw.
    fn encode_string_into<W: io::Write>(&self, octet_str: &[u8], writer: &mut W) -> HpackResult<()> {
        let mut huffman = HuffmanEncoder::new();
        let huffman_len = huffman.encoded_len(octet_str);
        if huffman_len < octet_str.len() {
            encode_integer_into(huffman_len, 7, 0x80, writer)?;
            let mut encoded = Vec::with_capacity(huffman_len);
            huffman.encode(octet_str, &mut encoded);
            writer.write_all(&encoded)?;
        } else {
            encode_integer_into(octet_str.len(), 7, 0, writer)?;
            writer.write_all(octet_str)?;
        }
        Ok(())
    }
}
