// Copyright 2022 - 2024 Wenmeng See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Author: tickbh
// -----
// Created Date: 2024/03/11 09:21:44

use std::{fmt, result};

/// Represents all errors that can be encountered while decoding an
/// integer.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum IntegerDecodingError {
    /// 5.1. specifies that "excessively large integer decodings" MUST be
    /// considered an error (whether the size is the number of octets or
    /// value). This variant corresponds to the encoding containing too many
    /// octets.
    TooManyOctets,
    /// The variant corresponds to the case where the value of the integer
    /// being decoded exceeds a certain threshold.
    ValueTooLarge,
    /// When a buffer from which an integer was supposed to be decoded does
    /// not contain enough octets to complete the decoding.
    NotEnoughOctets,
    /// Only valid prefixes are [1, 8]
    InvalidPrefix,
}

/// Represents all errors that can be encountered while decoding an octet
/// string.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum StringDecodingError {
    NotEnoughOctets,
    HuffmanDecoderError(HuffmanDecoderError),
}

/// Represents the error variants that the huffman decoder can return.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum HuffmanDecoderError {
    /// Any padding strictly larger than 7 bits MUST be interpreted as an error
    PaddingTooLarge,
    /// Any padding that does not correspond to the most significant bits of
    /// EOS MUST be interpreted as an error.
    InvalidPadding,
    /// If EOS is ever found in the string, it causes an error.
    EOSInString,
}

#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum HpackError {
    /// An instruction named an index outside of the static table and the
    /// entries currently resident in the dynamic table.
    InvalidIndex,
    MalformedInteger(IntegerDecodingError),
    MalformedString(StringDecodingError),
    /// The size of the dynamic table can never be allowed to exceed the max
    /// size mandated to the codec by the protocol (by performing changes
    /// made by SizeUpdate blocks).
    SizeUpdateTooLarge,
    /// Catch-all for order/structure violations inside a header block.
    Protocol(&'static str),
    Io(std::io::ErrorKind),
}

impl HpackError {
    #[inline]
    pub fn description_str(&self) -> &'static str {
        match self {
            HpackError::InvalidIndex => "invalid index",
            HpackError::MalformedInteger(_) => "malformed integer",
            HpackError::MalformedString(StringDecodingError::HuffmanDecoderError(_)) => {
                "huffman decode error"
            }
            HpackError::MalformedString(_) => "malformed string",
            HpackError::SizeUpdateTooLarge => "size update too large",
            HpackError::Protocol(_) => "protocol error",
            HpackError::Io(_) => "io error",
        }
    }
}

impl fmt::Display for HpackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description_str())
    }
}

impl From<IntegerDecodingError> for HpackError {
    fn from(e: IntegerDecodingError) -> Self {
        HpackError::MalformedInteger(e)
    }
}

impl From<StringDecodingError> for HpackError {
    fn from(e: StringDecodingError) -> Self {
        HpackError::MalformedString(e)
    }
}

impl From<HuffmanDecoderError> for HpackError {
    fn from(e: HuffmanDecoderError) -> Self {
        HpackError::MalformedString(StringDecodingError::HuffmanDecoderError(e))
    }
}

impl From<std::io::Error> for HpackError {
    fn from(e: std::io::Error) -> Self {
        HpackError::Io(e.kind())
    }
}

pub type HpackResult<T> = result::Result<T, HpackError>;
