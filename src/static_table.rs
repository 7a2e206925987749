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
// Created Date: 2024/03/12 14:02:10

use std::collections::HashMap;

use lazy_static::lazy_static;

pub type StaticTable = &'static [(&'static [u8], &'static [u8])];

/// (HPACK, Appendix A)
///
/// Accessed 1-based; static entries do not contribute to the dynamic table
/// size.
pub static STATIC_TABLE: StaticTable = &[
    (b":authority", b""),
    (b":method", b"GET"),
    (b":method", b"POST"),
    (b":path", b"/"),
    (b":path", b"/index.html"),
    (b":scheme", b"http"),
    (b":scheme", b"https"),
    (b":status", b"200"),
    (b":status", b"204"),
    (b":status", b"206"),
    (b":status", b"304"),
    (b":status", b"400"),
    (b":status", b"404"),
    (b":status", b"500"),
    (b"accept-charset", b""),
    (b"accept-encoding", b"gzip, deflate"),
    (b"accept-language", b""),
    (b"accept-ranges", b""),
    (b"accept", b""),
    (b"access-control-allow-origin", b""),
    (b"age", b""),
    (b"allow", b""),
    (b"authorization", b""),
    (b"cache-control", b""),
    (b"content-disposition", b""),
    (b"content-encoding", b""),
    (b"content-language", b""),
    (b"content-length", b""),
    (b"content-location", b""),
    (b"content-range", b""),
    (b"content-type", b""),
    (b"cookie", b""),
    (b"date", b""),
    (b"etag", b""),
    (b"expect", b""),
    (b"expires", b""),
    (b"from", b""),
    (b"host", b""),
    (b"if-match", b""),
    (b"if-modified-since", b""),
    (b"if-none-match", b""),
    (b"if-range", b""),
    (b"if-unmodified-since", b""),
    (b"last-modified", b""),
    (b"link", b""),
    (b"location", b""),
    (b"max-forwards", b""),
    (b"proxy-authenticate", b""),
    (b"proxy-authorization", b""),
    (b"range", b""),
    (b"referer", b""),
    (b"refresh", b""),
    (b"retry-after", b""),
    (b"server", b""),
    (b"set-cookie", b""),
    (b"strict-transport-security", b""),
    (b"transfer-encoding", b""),
    (b"user-agent", b""),
    (b"vary", b""),
    (b"via", b""),
    (b"www-authenticate", b""),
];

lazy_static! {
    static ref STATIC_HASH: HashMap<&'static [u8], Vec<(usize, &'static [u8])>> = {
        let mut h = HashMap::<&'static [u8], Vec<(usize, &'static [u8])>>::new();
        for (idx, &(name, value)) in STATIC_TABLE.iter().enumerate() {
            h.entry(name).or_insert_with(Vec::new).push((idx + 1, value));
        }
        h
    };
}

/// Looks the header up in the static table. Returns the 1-based index and
/// whether the value matched too; a name-only match reports the lowest
/// index carrying the name.
pub fn find_static(name: &[u8], value: &[u8]) -> Option<(usize, bool)> {
    let candidates = STATIC_HASH.get(name)?;
    for &(idx, entry_value) in candidates.iter() {
        if entry_value == value {
            return Some((idx, true));
        }
    }
    Some((candidates[0].0, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_shape() {
        assert_eq!(STATIC_TABLE.len(), 61);
        assert_eq!(STATIC_TABLE[0], (&b":authority"[..], &b""[..]));
        assert_eq!(STATIC_TABLE[1], (&b":method"[..], &b"GET"[..]));
        assert_eq!(STATIC_TABLE[60], (&b"www-authenticate"[..], &b""[..]));
    }

    #[test]
    fn test_find_static() {
        assert_eq!(find_static(b":method", b"GET"), Some((2, true)));
        assert_eq!(find_static(b":method", b"PUT"), Some((2, false)));
        assert_eq!(find_static(b":path", b"/index.html"), Some((5, true)));
        assert_eq!(find_static(b"accept-encoding", b"br"), Some((16, false)));
        assert_eq!(find_static(b"x-custom", b"1"), None);
    }
}
