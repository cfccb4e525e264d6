//! UTF-8 C-string helpers.
//!
//! Strings cross the wire as UTF-8 bytes, usually followed by a single NUL.
//! Several strings can share one buffer, addressed by start offsets.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Encode `s` as UTF-8, optionally followed by a NUL terminator.
///
/// An interior NUL is kept as-is; readers stop at the first one.
#[must_use]
pub fn to_utf8_cstr(s: &str, include_terminator: bool) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(s.len() + usize::from(include_terminator));
    bytes.extend_from_slice(s.as_bytes());
    if include_terminator {
        bytes.push(0);
    }
    bytes
}

/// Decode bytes up to the first NUL (or the end) as UTF-8.
///
/// Invalid sequences are replaced rather than rejected.
#[must_use]
pub fn from_utf8_cstr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Several strings in one buffer, with the start offset of each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedStrings<'a> {
    pub buffer: Cow<'a, [u8]>,
    pub offsets: Vec<u32>,
}

impl PackedStrings<'_> {
    /// Number of packed strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns `true` if nothing is packed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// String `index`, decoded up to its terminator.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<String> {
        let start = *self.offsets.get(index)? as usize;
        let end = self
            .offsets
            .get(index + 1)
            .map_or(self.buffer.len(), |next| *next as usize);
        self.buffer.get(start..end).map(from_utf8_cstr)
    }

    /// Detach from any borrowed buffer.
    #[must_use]
    pub fn into_owned(self) -> PackedStrings<'static> {
        PackedStrings {
            buffer: Cow::Owned(self.buffer.into_owned()),
            offsets: self.offsets,
        }
    }
}

/// Pack `strings` back to back, recording where each one starts.
#[must_use]
pub fn to_packed_utf8_cstr<S: AsRef<str>>(
    strings: &[S],
    include_terminator: bool,
) -> PackedStrings<'static> {
    let total: usize = strings
        .iter()
        .map(|s| s.as_ref().len() + usize::from(include_terminator))
        .sum();
    let mut buffer = Vec::with_capacity(total);
    let mut offsets = Vec::with_capacity(strings.len());
    for s in strings {
        offsets.push(u32::try_from(buffer.len()).unwrap_or(u32::MAX));
        buffer.extend_from_slice(s.as_ref().as_bytes());
        if include_terminator {
            buffer.push(0);
        }
    }
    PackedStrings {
        buffer: Cow::Owned(buffer),
        offsets,
    }
}

/// Decode every string in a packed buffer.
#[must_use]
pub fn unpack_utf8_cstr(packed: &PackedStrings<'_>) -> Vec<String> {
    (0..packed.len()).filter_map(|i| packed.get(i)).collect()
}
