//! Broadcast text held as raw ARIB STD-B24 bytes.
//!
//! Names and descriptions are stored undecoded, truncated to the capacity of
//! the field they land in. Rendering goes through a caller-supplied decoder;
//! [`decode_broadcast_string`] is a lossy fallback for hosts without one.

use std::fmt;

use log::trace;
use serde::{Serialize, Serializer};

/// Raw broadcast text.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BroadcastString(Vec<u8>);

impl BroadcastString {
    /// Copy at most `cap` bytes.
    pub fn truncated(bytes: &[u8], cap: usize) -> Self {
        if bytes.len() > cap {
            trace!("text of {} bytes truncated to {}", bytes.len(), cap);
        }
        BroadcastString(bytes[..bytes.len().min(cap)].to_vec())
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no text was received.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render with a real ARIB STD-B24 decoder.
    pub fn decode_with<F>(&self, decoder: F) -> String
    where
        F: FnOnce(&[u8]) -> String,
    {
        decoder(&self.0)
    }
}

impl fmt::Display for BroadcastString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&decode_broadcast_string(&self.0))
    }
}

impl fmt::Debug for BroadcastString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", decode_broadcast_string(&self.0))
    }
}

impl Serialize for BroadcastString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&decode_broadcast_string(&self.0))
    }
}

/// Lossy text rendering.
///
/// Control codes (including ARIB escape and designation bytes below 0x20)
/// are dropped and what remains is read as UTF-8 with replacement.
/// Full ARIB character decoding needs the STD-B24 character set tables.
pub fn decode_broadcast_string(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        if !s.chars().any(char::is_control) {
            return s.to_string();
        }
    }

    let printable: Vec<u8> = bytes
        .iter()
        .copied()
        .filter(|&b| b >= 0x20 && b != 0x7F)
        .collect();
    String::from_utf8_lossy(&printable).into_owned()
}

/// ISO 639-2 language code (three bytes, e.g. "jpn").
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LanguageCode(pub [u8; 3]);

impl LanguageCode {
    /// Raw code bytes.
    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() { b as char } else { '?' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LanguageCode({})", self)
    }
}

impl Serialize for LanguageCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
