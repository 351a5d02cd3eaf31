// 8.3 short name encoding and decoding

use fatbridge_core::BridgeError;
use std::fmt;

pub const SHORT_NAME_LEN: usize = 11;
const BASE_LEN: usize = 8;
const EXT_LEN: usize = 3;
const PAD: u8 = b' ';

/// Punctuation allowed in a short name besides letters and digits.
const SPECIAL_CHARS: &[u8] = b"$%'-_@~`!(){}^#&";

/// An 11-byte on-disk name: 8 bytes of base name, 3 of extension, space padded.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortName([u8; SHORT_NAME_LEN]);

impl ShortName {
    pub const DOT: ShortName = ShortName(*b".          ");
    pub const DOT_DOT: ShortName = ShortName(*b"..         ");

    pub fn from_raw(raw: [u8; SHORT_NAME_LEN]) -> Self {
        ShortName(raw)
    }

    pub fn as_bytes(&self) -> &[u8; SHORT_NAME_LEN] {
        &self.0
    }

    pub fn is_dot(&self) -> bool {
        *self == Self::DOT
    }

    pub fn is_dot_dot(&self) -> bool {
        *self == Self::DOT_DOT
    }

    /// Encode one user path component.
    pub fn encode(component: &str) -> Result<Self, BridgeError> {
        match component {
            "." => return Ok(Self::DOT),
            ".." => return Ok(Self::DOT_DOT),
            "" => return Err(invalid(component, "empty name")),
            _ => {}
        }

        let (base, ext) = match component.split_once('.') {
            Some((base, ext)) => {
                if ext.contains('.') {
                    return Err(invalid(component, "more than one '.'"));
                }
                if ext.is_empty() {
                    return Err(invalid(component, "trailing '.' without an extension"));
                }
                (base, ext)
            }
            None => (component, ""),
        };

        if base.is_empty() {
            return Err(invalid(component, "empty base name"));
        }
        if base.len() > BASE_LEN {
            return Err(invalid(component, "base name longer than 8 characters"));
        }
        if ext.len() > EXT_LEN {
            return Err(invalid(component, "extension longer than 3 characters"));
        }

        let mut raw = [PAD; SHORT_NAME_LEN];
        for (slot, c) in raw[..BASE_LEN].iter_mut().zip(base.bytes()) {
            *slot = encode_char(component, c)?;
        }
        for (slot, c) in raw[BASE_LEN..].iter_mut().zip(ext.bytes()) {
            *slot = encode_char(component, c)?;
        }

        Ok(ShortName(raw))
    }

    /// Display form: lower case, padding removed, `.` only when there is an extension.
    pub fn decode(&self) -> String {
        decode_name(&self.0)
    }

    /// Whether the display name encodes back to these exact bytes, so a
    /// path built from a listing finds this entry again.
    pub fn is_addressable(&self) -> bool {
        ShortName::encode(&self.decode()).is_ok_and(|encoded| encoded == *self)
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortName({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.decode())
    }
}

fn invalid(component: &str, reason: &str) -> BridgeError {
    BridgeError::InvalidPathSegment(format!("'{}': {}", component, reason))
}

fn encode_char(component: &str, c: u8) -> Result<u8, BridgeError> {
    if c.is_ascii_alphanumeric() || SPECIAL_CHARS.contains(&c) {
        Ok(c.to_ascii_uppercase())
    } else {
        Err(invalid(
            component,
            &format!("character {:?} is not allowed in a short name", c as char),
        ))
    }
}

fn decode_byte(b: u8) -> char {
    char::from(b.to_ascii_lowercase())
}

/// Decode a raw directory entry name.
pub fn decode_name(raw: &[u8; SHORT_NAME_LEN]) -> String {
    if raw[0] == b'.' && raw[1] == b'.' {
        return "..".to_string();
    }
    if raw[0] == b'.' {
        return ".".to_string();
    }

    let mut name = String::with_capacity(12);
    let base_end = raw[..BASE_LEN].iter().rposition(|&b| b != PAD).map_or(0, |i| i + 1);
    for (i, &b) in raw[..base_end].iter().enumerate() {
        // 0x05 in the first byte stands for a real 0xE5, sigma in code page 437
        if i == 0 && b == 0x05 {
            name.push('\u{3c3}');
        } else {
            name.push(decode_byte(b));
        }
    }

    let ext = &raw[BASE_LEN..];
    let ext_end = ext.iter().rposition(|&b| b != PAD).map_or(0, |i| i + 1);
    if ext_end > 0 {
        name.push('.');
        name.extend(ext[..ext_end].iter().map(|&b| decode_byte(b)));
    }

    name
}

/// Split a `/`-separated path into encoded segments. Empty components are ignored.
pub fn split_path(path: &str) -> Result<Vec<ShortName>, BridgeError> {
    path.split('/')
        .filter(|component| !component.is_empty())
        .map(ShortName::encode)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &ShortName) -> &[u8] {
        name.as_bytes()
    }

    #[test]
    fn encodes_base_and_extension() {
        assert_eq!(raw(&ShortName::encode("hello.txt").unwrap()), b"HELLO   TXT");
        assert_eq!(raw(&ShortName::encode("README").unwrap()), b"README     ");
        assert_eq!(raw(&ShortName::encode("a.b").unwrap()), b"A       B  ");
        assert_eq!(raw(&ShortName::encode("12345678.abc").unwrap()), b"12345678ABC");
        assert_eq!(raw(&ShortName::encode("$~!(x).{}").unwrap()), b"$~!(X)  {} ");
    }

    #[test]
    fn encodes_dot_entries() {
        assert_eq!(raw(&ShortName::encode(".").unwrap()), b".          ");
        assert_eq!(raw(&ShortName::encode("..").unwrap()), b"..         ");
        assert!(ShortName::encode(".").unwrap().is_dot());
        assert!(ShortName::encode("..").unwrap().is_dot_dot());
    }

    #[test]
    fn rejects_invalid_components() {
        for bad in [
            "",
            "a.b.c",
            "name.",
            "toolongname",
            "file.text",
            ".hidden",
            "...",
            "with space",
            "star*",
            "semi;colon",
            "caf\u{e9}",
        ] {
            let err = ShortName::encode(bad).unwrap_err();
            assert!(
                matches!(err, BridgeError::InvalidPathSegment(_)),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn decodes_names() {
        assert_eq!(decode_name(b"HELLO   TXT"), "hello.txt");
        assert_eq!(decode_name(b"README     "), "readme");
        assert_eq!(decode_name(b"A       B  "), "a.b");
        assert_eq!(decode_name(b".          "), ".");
        assert_eq!(decode_name(b"..         "), "..");
        assert_eq!(decode_name(b"\x05BC     TXT"), "\u{3c3}bc.txt");
    }

    #[test]
    fn addressable_names_survive_a_round_trip() {
        for raw in [b"HELLO   TXT", b"README     ", b".          ", b"..         ", b"A~1     $$$"] {
            assert!(ShortName::from_raw(*raw).is_addressable(), "{:?}", raw);
        }
        for raw in [
            b"\x05BC     TXT",
            b"MY FILE TXT",
            b"lower   txt",
            b"CAF\x82    TXT",
            b"BAD*NAMETXT",
            b"  LEAD  TXT",
        ] {
            assert!(!ShortName::from_raw(*raw).is_addressable(), "{:?}", raw);
        }
    }

    #[test]
    fn decode_inverts_encode_up_to_case() {
        for name in [
            "hello.txt",
            "README",
            "MiXeD.Ext",
            "a",
            "12345678.123",
            "x-y_z.c",
            "#1&2.@@",
            "{tmp}",
            ".",
            "..",
        ] {
            let encoded = ShortName::encode(name).unwrap();
            assert_eq!(encoded.decode(), name.to_ascii_lowercase(), "round trip of {:?}", name);
        }
    }

    #[test]
    fn splits_paths() {
        let segments = split_path("/docs//sub/./file.txt/").unwrap();
        assert_eq!(segments.len(), 4);
        assert_eq!(raw(&segments[0]), b"DOCS       ");
        assert!(segments[2].is_dot());
        assert_eq!(raw(&segments[3]), b"FILE    TXT");

        assert!(split_path("/").unwrap().is_empty());
        assert!(split_path("").unwrap().is_empty());
        assert!(matches!(
            split_path("/docs/bad..name"),
            Err(BridgeError::InvalidPathSegment(_))
        ));
    }
}
