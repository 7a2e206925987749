//! Exposes the struct `Decoder` that allows for HPACK-encoded header blocks to
//! be decoded into a header list.
//!
//! The decoder only follows HPACK rules, without performing any additional
//! (semantic) checks on the header name/value pairs, i.e. it considers the
//! headers as opaque octets. Decoding mutates the connection context: literal
//! headers marked for indexing land in the dynamic table, and indexed headers
//! toggle membership of the reference set, whose surviving entries are
//! replayed at the end of every block.
//!
//! # Example
//!
//! ```rust
//! use hpackparse::Decoder;
//! let mut decoder = Decoder::new();
//!
//! let header_list = decoder.decode(&[0x82]).unwrap();
//!
//! assert_eq!(header_list, [
//!     (b":method".to_vec(), b"GET".to_vec()),
//! ]);
//! ```

use crate::context::{Context, Resolved};
use crate::huffman::HuffmanDecoder;
use crate::integer::decode_integer;
use crate::reference::ReferenceFlags;
use crate::{HpackError, HpackResult, StringDecodingError};

/// A decoded header field. Both halves are arbitrary octets; the codec
/// imposes no ASCII semantics.
pub type Header = (Vec<u8>, Vec<u8>);

/// The result returned by the `decode` method of the `Decoder`.
pub type DecoderResult = HpackResult<Vec<Header>>;

/// Decodes an octet string under HPACK rules of encoding found in the given
/// buffer `buf`.
///
/// It is assumed that the first byte in the buffer represents the start of the
/// encoded octet string.
///
/// Returns the decoded string in a newly allocated `Vec` and the number of
/// bytes consumed from the given buffer.
fn decode_string(buf: &[u8]) -> HpackResult<(Vec<u8>, usize)> {
    let (len, consumed) = decode_integer(buf, 7)?;
    if consumed + len > buf.len() {
        return Err(StringDecodingError::NotEnoughOctets.into());
    }
    let raw_string = &buf[consumed..consumed + len];
    if buf[0] & 128 == 128 {
        // Huffman coding used: pass the raw octets to the Huffman decoder
        // and return its result.
        let decoded = HuffmanDecoder::new().decode(raw_string)?;
        Ok((decoded, consumed + len))
    } else {
        // The octets were transmitted raw
        Ok((raw_string.to_vec(), consumed + len))
    }
}

/// Different variants of how a particular header field can be represented in
/// an HPACK encoding.
enum FieldRepresentation {
    Indexed,
    LiteralWithIncrementalIndexing,
    SizeUpdate,
    LiteralNeverIndexed,
    LiteralWithoutIndexing,
}

impl FieldRepresentation {
    /// Based on the given octet, returns the type of the field representation.
    ///
    /// The given octet should be the top-order byte of the header field that
    /// is about to be decoded.
    fn new(octet: u8) -> FieldRepresentation {
        if octet & 128 == 128 {
            // High-order bit set
            FieldRepresentation::Indexed
        } else if octet & 64 == 64 {
            // Bit pattern `01`
            FieldRepresentation::LiteralWithIncrementalIndexing
        } else if octet & 32 == 32 {
            // Bit pattern `001`
            FieldRepresentation::SizeUpdate
        } else if octet & 16 == 16 {
            // Bit pattern `0001`
            FieldRepresentation::LiteralNeverIndexed
        } else {
            // None of the top 4 bits is set => bit pattern `0000xxxx`
            FieldRepresentation::LiteralWithoutIndexing
        }
    }
}

/// Decodes headers encoded using HPACK, maintaining the connection state
/// necessary to correctly decode subsequent blocks.
///
/// For now, incremental decoding is not supported, i.e. it is necessary
/// to pass in the entire encoded representation of all headers to the
/// decoder, rather than processing it piece-by-piece.
pub struct Decoder {
    pub context: Context,
}

impl Decoder {
    /// Creates a new `Decoder` with all settings set to default values.
    pub fn new() -> Decoder {
        Decoder {
            context: Context::default(),
        }
    }

    /// Creates a new `Decoder` operating on the given connection context.
    pub fn with_context(context: Context) -> Decoder {
        Decoder { context }
    }

    /// Sets a new maximum dynamic table size for the decoder, as signalled
    /// through SETTINGS.
    pub fn set_max_table_size(&mut self, new_max_size: usize) {
        self.context.set_max_table_size(new_max_size);
    }

    /// Decode the header block found in the given buffer.
    ///
    /// The decoded representation is returned as a sequence of headers, where both the name and
    /// value of each header is represented by an owned byte sequence (i.e. `Vec<u8>`).
    ///
    /// The buffer should represent the entire block that should be decoded.
    /// For example, in HTTP/2, all continuation frames need to be concatenated
    /// to a single buffer before passing them to the decoder.
    ///
    /// Every error is terminal for the block: no partial header list is
    /// returned and the connection the context belongs to must be torn down.
    pub fn decode(&mut self, buf: &[u8]) -> DecoderResult {
        log::trace!("hpack: decoding block; len={}", buf.len());
        let mut header_list = Vec::new();
        self.context.reference_set_mut().reset_flags();

        let mut current_octet_index = 0;
        while current_octet_index < buf.len() {
            // At this point we are always at the beginning of the next
            // instruction within the HPACK data. Its type can always be
            // determined from the first byte.
            let initial_octet = buf[current_octet_index];
            let buffer_leftover = &buf[current_octet_index..];
            let consumed = match FieldRepresentation::new(initial_octet) {
                FieldRepresentation::Indexed => {
                    self.check_size_update_order()?;
                    self.decode_indexed(buffer_leftover, &mut header_list)?
                }
                FieldRepresentation::LiteralWithIncrementalIndexing => {
                    self.check_size_update_order()?;
                    self.decode_literal(buffer_leftover, true, &mut header_list)?
                }
                FieldRepresentation::LiteralWithoutIndexing => {
                    self.check_size_update_order()?;
                    self.decode_literal(buffer_leftover, false, &mut header_list)?
                }
                FieldRepresentation::LiteralNeverIndexed => {
                    // Same as the previous one, except if we were also a proxy
                    // we would need to make sure not to change the
                    // representation received here. We don't care about this
                    // for now.
                    self.check_size_update_order()?;
                    self.decode_literal(buffer_leftover, false, &mut header_list)?
                }
                FieldRepresentation::SizeUpdate => {
                    self.update_max_dynamic_size(buffer_leftover)?
                }
            };

            current_octet_index += consumed;
        }

        // Every reference that did not contribute a header above is
        // implicitly part of the block; replay them in insertion order.
        let pending: Vec<u64> = self
            .context
            .reference_set()
            .iter()
            .filter(|r| !r.flags.contains(ReferenceFlags::EMITTED))
            .map(|r| r.generation)
            .collect();
        for generation in pending {
            if let Some(entry) = self.context.dynamic_table().get_by_generation(generation) {
                header_list.push((entry.name.clone(), entry.value.clone()));
            }
        }

        self.context.reference_set_mut().reset_flags();
        Ok(header_list)
    }

    /// A lowered table ceiling must be acknowledged by a size update before
    /// the first header instruction of the next block.
    fn check_size_update_order(&self) -> HpackResult<()> {
        if self.context.size_update_required() {
            return Err(HpackError::Protocol(
                "dynamic table size update must lead the block",
            ));
        }
        Ok(())
    }

    /// Decodes an indexed header representation.
    ///
    /// An index of zero empties the reference set. A static index emits the
    /// header and copies it into the dynamic table; a dynamic index toggles
    /// the entry's membership of the reference set, emitting on toggle-on.
    fn decode_indexed(&mut self, buf: &[u8], out: &mut Vec<Header>) -> HpackResult<usize> {
        let (index, consumed) = decode_integer(buf, 7)?;
        if index == 0 {
            log::trace!("hpack: reference set emptied");
            self.context.reference_set_mut().clear();
            return Ok(consumed);
        }

        // Copy out of the table before touching it again; the resolved
        // borrow must not outlive the mutations below.
        let (target, name, value) = match self.context.resolve(index)? {
            Resolved::Static(name, value) => (None, name.to_vec(), value.to_vec()),
            Resolved::Dynamic(entry) => (
                Some(entry.generation()),
                entry.name.clone(),
                entry.value.clone(),
            ),
        };

        match target {
            None => {
                out.push((name.clone(), value.clone()));
                if let Some(generation) = self.context.insert(name, value) {
                    self.context.reference_set_mut().add(generation);
                }
            }
            Some(generation) => {
                if self.context.reference_set().contains(generation) {
                    // Toggle off: the entry leaves the reference set and
                    // nothing is emitted for it.
                    self.context.reference_set_mut().remove(generation);
                } else {
                    self.context.reference_set_mut().add(generation);
                    out.push((name, value));
                }
            }
        }

        Ok(consumed)
    }

    /// Decodes a literal header representation from the given buffer.
    ///
    /// # Parameters
    ///
    /// - index: whether or not the decoded value should be indexed (i.e.
    ///   included in the dynamic table, and referenced).
    fn decode_literal(
        &mut self,
        buf: &[u8],
        index: bool,
        out: &mut Vec<Header>,
    ) -> HpackResult<usize> {
        let prefix = if index { 6 } else { 4 };
        let (table_index, mut consumed) = decode_integer(buf, prefix)?;

        // First read the name appropriately
        let name = if table_index == 0 {
            // Read name string as literal
            let (name, name_len) = decode_string(&buf[consumed..])?;
            consumed += name_len;
            name
        } else {
            // Read name indexed from the table
            let (name, _) = self.context.get_from_table(table_index)?;
            name
        };

        // Now read the value as a literal...
        let (value, value_len) = decode_string(&buf[consumed..])?;
        consumed += value_len;

        out.push((name.clone(), value.clone()));
        if index {
            if let Some(generation) = self.context.insert(name, value) {
                self.context.reference_set_mut().add(generation);
            }
        }

        Ok(consumed)
    }

    /// Handles processing the `SizeUpdate` HPACK block: updates the maximum
    /// size of the underlying dynamic table, possibly causing a number of
    /// headers to be evicted from it.
    ///
    /// Assumes that the first byte in the given buffer `buf` is the first
    /// octet in the `SizeUpdate` block.
    ///
    /// Returns the number of octets consumed from the given buffer.
    fn update_max_dynamic_size(&mut self, buf: &[u8]) -> HpackResult<usize> {
        let (new_size, consumed) = decode_integer(buf, 5)?;
        self.context.apply_size_update(new_size)?;
        log::trace!("hpack: decoder changed max table size to {}", new_size);
        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(decoder: &Decoder) -> Vec<(Vec<u8>, Vec<u8>)> {
        decoder.context.dynamic_table().to_vec()
    }

    /// C.2.1: a literal header with incremental indexing.
    #[test]
    fn test_literal_with_indexing() {
        let mut decoder = Decoder::new();
        let block = [
            0x40, 0x0a, 0x63, 0x75, 0x73, 0x74, 0x6f, 0x6d, 0x2d, 0x6b, 0x65, 0x79, 0x0d, 0x63,
            0x75, 0x73, 0x74, 0x6f, 0x6d, 0x2d, 0x68, 0x65, 0x61, 0x64, 0x65, 0x72,
        ];
        let headers = decoder.decode(&block).unwrap();
        assert_eq!(headers, [(b"custom-key".to_vec(), b"custom-header".to_vec())]);
        assert_eq!(table(&decoder), [(b"custom-key".to_vec(), b"custom-header".to_vec())]);
        assert_eq!(decoder.context.dynamic_table().get_size(), 55);
        assert_eq!(decoder.context.reference_set().len(), 1);
    }

    /// C.2.2: a literal header without indexing leaves no state behind.
    #[test]
    fn test_literal_without_indexing() {
        let mut decoder = Decoder::new();
        let block = [
            0x04, 0x0c, 0x2f, 0x73, 0x61, 0x6d, 0x70, 0x6c, 0x65, 0x2f, 0x70, 0x61, 0x74, 0x68,
        ];
        let headers = decoder.decode(&block).unwrap();
        assert_eq!(headers, [(b":path".to_vec(), b"/sample/path".to_vec())]);
        assert!(table(&decoder).is_empty());
        assert!(decoder.context.reference_set().is_empty());
    }

    #[test]
    fn test_literal_never_indexed() {
        let mut decoder = Decoder::new();
        let block = [
            0x10, 0x08, 0x70, 0x61, 0x73, 0x73, 0x77, 0x6f, 0x72, 0x64, 0x06, 0x73, 0x65, 0x63,
            0x72, 0x65, 0x74,
        ];
        let headers = decoder.decode(&block).unwrap();
        assert_eq!(headers, [(b"password".to_vec(), b"secret".to_vec())]);
        assert!(table(&decoder).is_empty());
    }

    /// C.2.4: an indexed static header is emitted and copied into the
    /// dynamic table, which the reference set then points at.
    #[test]
    fn test_indexed_static() {
        let mut decoder = Decoder::new();
        let headers = decoder.decode(&[0x82]).unwrap();
        assert_eq!(headers, [(b":method".to_vec(), b"GET".to_vec())]);
        assert_eq!(table(&decoder), [(b":method".to_vec(), b"GET".to_vec())]);
        assert_eq!(decoder.context.reference_set().len(), 1);
    }

    #[test]
    fn test_huffman_literal() {
        let mut decoder = Decoder::new();
        let mut block = vec![0x40, 0x88];
        block.extend_from_slice(&[0x25, 0xa8, 0x49, 0xe9, 0x5b, 0xa9, 0x7d, 0x7f]);
        block.push(0x89);
        block.extend_from_slice(&[0x25, 0xa8, 0x49, 0xe9, 0x5b, 0xb8, 0xe8, 0xb4, 0xbf]);
        let headers = decoder.decode(&block).unwrap();
        assert_eq!(headers, [(b"custom-key".to_vec(), b"custom-value".to_vec())]);
    }

    /// A reference left untouched by the next block is replayed at its end.
    #[test]
    fn test_reference_replay_across_blocks() {
        let mut decoder = Decoder::new();
        decoder.decode(&[0x82]).unwrap();
        let headers = decoder.decode(&[]).unwrap();
        assert_eq!(headers, [(b":method".to_vec(), b"GET".to_vec())]);
    }

    /// Indexing a referenced dynamic entry toggles it off; indexing it again
    /// toggles it back on and emits it exactly once.
    #[test]
    fn test_toggle_off_and_back_on() {
        let mut decoder = Decoder::new();
        decoder.decode(&[0x82]).unwrap();

        // 62 = newest dynamic entry; toggled off, the block emits nothing.
        let headers = decoder.decode(&[0x80 | 62]).unwrap();
        assert!(headers.is_empty());
        assert!(decoder.context.reference_set().is_empty());

        // Toggle back on.
        let headers = decoder.decode(&[0x80 | 62]).unwrap();
        assert_eq!(headers, [(b":method".to_vec(), b"GET".to_vec())]);
        assert_eq!(decoder.context.reference_set().len(), 1);

        // Off and on within one block emits once.
        let headers = decoder.decode(&[0x80 | 62, 0x80 | 62]).unwrap();
        assert_eq!(headers, [(b":method".to_vec(), b"GET".to_vec())]);
    }

    /// Index zero empties the reference set.
    #[test]
    fn test_indexed_zero_clears_reference_set() {
        let mut decoder = Decoder::new();
        decoder.decode(&[0x82, 0x84]).unwrap();
        assert_eq!(decoder.context.reference_set().len(), 2);
        let headers = decoder.decode(&[0x80]).unwrap();
        assert!(headers.is_empty());
        assert!(decoder.context.reference_set().is_empty());
    }

    #[test]
    fn test_invalid_index() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(&[0x80 | 62]).unwrap_err(), HpackError::InvalidIndex);
        // Literal with a name index out of bounds.
        assert_eq!(
            decoder.decode(&[0x7f, 0x0b, 0x01, 0x61]).unwrap_err(),
            HpackError::InvalidIndex
        );
    }

    #[test]
    fn test_malformed_string() {
        let mut decoder = Decoder::new();
        // Declared length runs past the end of the buffer.
        let err = decoder.decode(&[0x40, 0x0a, 0x63]).unwrap_err();
        assert_eq!(err, HpackError::MalformedString(StringDecodingError::NotEnoughOctets));
    }

    #[test]
    fn test_size_update_over_ceiling() {
        let mut decoder = Decoder::new();
        // 0x3f 0xe2 0x1f = 4097 > the default 4096 ceiling.
        assert_eq!(
            decoder.decode(&[0x3f, 0xe2, 0x1f]).unwrap_err(),
            HpackError::SizeUpdateTooLarge
        );
    }

    #[test]
    fn test_required_size_update_enforced() {
        let mut decoder = Decoder::new();
        decoder.set_max_table_size(128);
        // A header instruction before the size update is a protocol error.
        assert!(matches!(
            decoder.decode(&[0x82]).unwrap_err(),
            HpackError::Protocol(_)
        ));

        let mut decoder = Decoder::new();
        decoder.set_max_table_size(128);
        // Leading with the size update (here: back to 128) is fine.
        let headers = decoder.decode(&[0x20 | 0x1f, 0x61, 0x82]).unwrap();
        assert_eq!(headers, [(b":method".to_vec(), b"GET".to_vec())]);
    }
}
