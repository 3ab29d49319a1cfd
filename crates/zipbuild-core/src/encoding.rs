//! Text encoding of entry names and archive comments.
//!
//! The caller picks an [`Encoding`]; [`EncodingOptions::codec`] turns it into a
//! [`NameCodec`] that is used for every name and the comment of one archive,
//! and for name-collision checks, so that uniqueness is decided on the bytes
//! that actually end up in the file.

use crate::Result;
use crate::ZipBuildError;
use encoding_rs::EncoderResult;
use serde::Deserialize;
use serde::Serialize;

/// Encoding choice for archive metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    /// UTF-8, flagged as such only when needed unless `enable_bom` is set.
    #[default]
    Default,
    /// UTF-8, always flagged.
    #[serde(rename = "UTF8")]
    Utf8,
    /// Windows-1252.
    #[serde(rename = "ANSI")]
    Ansi,
    /// 7-bit ASCII.
    #[serde(rename = "ASCII")]
    Ascii,
    /// UTF-16 little endian.
    Unicode,
    /// Any code page named by `encoding_name`.
    Other,
}

/// Encoding settings as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncodingOptions {
    /// The encoding choice.
    pub encoding: Encoding,

    /// Mark every name as UTF-8 (`Default` only).
    pub enable_bom: bool,

    /// WHATWG label or Windows code page number (`Other` only).
    pub encoding_name: String,
}

impl EncodingOptions {
    /// Options for one of the fixed encodings.
    #[must_use]
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            ..Self::default()
        }
    }

    /// Options for a named code page.
    ///
    /// # Examples
    ///
    /// ```
    /// use zipbuild_core::EncodingOptions;
    ///
    /// let codec = EncodingOptions::other("shift_jis").codec()?;
    /// assert_eq!(codec.name(), "Shift_JIS");
    /// # Ok::<(), zipbuild_core::ZipBuildError>(())
    /// ```
    pub fn other(name: impl Into<String>) -> Self {
        Self {
            encoding: Encoding::Other,
            encoding_name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the UTF-8 marker switch.
    #[must_use]
    pub fn with_enable_bom(mut self, enable: bool) -> Self {
        self.enable_bom = enable;
        self
    }

    /// Resolves the codec.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEncoding` if `Other` names a code page that is not
    /// available.
    pub fn codec(&self) -> Result<NameCodec> {
        match self.encoding {
            Encoding::Default => Ok(NameCodec::Utf8 {
                always_flag: self.enable_bom,
            }),
            Encoding::Utf8 => Ok(NameCodec::Utf8 { always_flag: true }),
            Encoding::Ansi => Ok(NameCodec::Legacy(encoding_rs::WINDOWS_1252)),
            Encoding::Ascii => Ok(NameCodec::Ascii),
            Encoding::Unicode => Ok(NameCodec::Utf16 { big_endian: false }),
            Encoding::Other => lookup(&self.encoding_name),
        }
    }
}

/// Concrete byte encoding for names and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameCodec {
    /// UTF-8.
    Utf8 {
        /// Set the UTF-8 flag on every name, not only non-ASCII ones.
        always_flag: bool,
    },
    /// 7-bit ASCII, other characters become `?`.
    Ascii,
    /// UTF-16 without byte-order mark.
    Utf16 {
        /// Big endian instead of little endian.
        big_endian: bool,
    },
    /// A single- or multi-byte legacy code page.
    Legacy(&'static encoding_rs::Encoding),
}

impl NameCodec {
    /// Encodes `text`; unrepresentable characters become `?`.
    ///
    /// # Examples
    ///
    /// ```
    /// use zipbuild_core::NameCodec;
    ///
    /// assert_eq!(NameCodec::Ascii.encode("päivä.txt"), b"p?iv?.txt");
    /// ```
    #[must_use]
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 { .. } => text.as_bytes().to_vec(),
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Self::Utf16 { big_endian } => text
                .encode_utf16()
                .flat_map(|unit| {
                    if *big_endian {
                        unit.to_be_bytes()
                    } else {
                        unit.to_le_bytes()
                    }
                })
                .collect(),
            Self::Legacy(encoding) => encode_legacy(encoding, text),
        }
    }

    /// Whether the general purpose "language encoding" flag (bit 11) must be
    /// set for a name.
    #[must_use]
    pub fn utf8_flag(&self, text: &str) -> bool {
        match self {
            Self::Utf8 { always_flag } => *always_flag || !text.is_ascii(),
            Self::Ascii | Self::Utf16 { .. } | Self::Legacy(_) => false,
        }
    }

    /// Canonical name of the codec.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 { .. } => "UTF-8",
            Self::Ascii => "US-ASCII",
            Self::Utf16 { big_endian: false } => "UTF-16LE",
            Self::Utf16 { big_endian: true } => "UTF-16BE",
            Self::Legacy(encoding) => encoding.name(),
        }
    }
}

/// Windows code page numbers with an `encoding_rs` counterpart.
const CODE_PAGES: &[(u16, &str)] = &[
    (866, "ibm866"),
    (874, "windows-874"),
    (932, "shift_jis"),
    (936, "gbk"),
    (949, "euc-kr"),
    (950, "big5"),
    (1250, "windows-1250"),
    (1251, "windows-1251"),
    (1252, "windows-1252"),
    (1253, "windows-1253"),
    (1254, "windows-1254"),
    (1255, "windows-1255"),
    (1256, "windows-1256"),
    (1257, "windows-1257"),
    (1258, "windows-1258"),
    (10000, "macintosh"),
    (20866, "koi8-r"),
    (21866, "koi8-u"),
    (28592, "iso-8859-2"),
    (28593, "iso-8859-3"),
    (28594, "iso-8859-4"),
    (28595, "iso-8859-5"),
    (28596, "iso-8859-6"),
    (28597, "iso-8859-7"),
    (28598, "iso-8859-8"),
    (28603, "iso-8859-13"),
    (28605, "iso-8859-15"),
    (50220, "iso-2022-jp"),
    (51932, "euc-jp"),
    (54936, "gb18030"),
];

fn lookup(name: &str) -> Result<NameCodec> {
    let label = name.trim().to_ascii_lowercase();
    match label.as_str() {
        "utf-8" | "utf8" | "65001" => return Ok(NameCodec::Utf8 { always_flag: true }),
        "ascii" | "us-ascii" | "20127" => return Ok(NameCodec::Ascii),
        "utf-16" | "utf-16le" | "unicode" | "1200" => {
            return Ok(NameCodec::Utf16 { big_endian: false });
        }
        "utf-16be" | "unicodefffe" | "1201" => return Ok(NameCodec::Utf16 { big_endian: true }),
        _ => {}
    }

    let label = label
        .parse::<u16>()
        .ok()
        .and_then(|page| CODE_PAGES.iter().find(|(p, _)| *p == page))
        .map_or(label.as_str(), |(_, l)| l);

    match encoding_rs::Encoding::for_label(label.as_bytes()) {
        Some(encoding) if encoding == encoding_rs::REPLACEMENT => Err(unknown(name)),
        Some(encoding) => Ok(NameCodec::Legacy(encoding)),
        None => Err(unknown(name)),
    }
}

fn unknown(name: &str) -> ZipBuildError {
    ZipBuildError::UnknownEncoding {
        name: name.to_string(),
    }
}

fn encode_legacy(encoding: &'static encoding_rs::Encoding, text: &str) -> Vec<u8> {
    let mut encoder = encoding.new_encoder();
    let mut out = Vec::with_capacity(text.len() + 8);
    let mut rest = text;
    loop {
        let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(rest.len())
            .unwrap_or(rest.len() * 4 + 16);
        out.reserve(needed);
        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(rest, &mut out, true);
        rest = &rest[read..];
        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(_) => out.push(b'?'),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_utf8() {
        let codec = EncodingOptions::default().codec().unwrap();
        assert_eq!(codec, NameCodec::Utf8 { always_flag: false });
        assert_eq!(codec.encode("ä.txt"), "ä.txt".as_bytes());
        assert!(!codec.utf8_flag("plain.txt"));
        assert!(codec.utf8_flag("ä.txt"));
    }

    #[test]
    fn test_default_with_bom_flags_every_name() {
        let codec = EncodingOptions::new(Encoding::Default)
            .with_enable_bom(true)
            .codec()
            .unwrap();
        assert!(codec.utf8_flag("plain.txt"));
    }

    #[test]
    fn test_fixed_codecs() {
        let ansi = EncodingOptions::new(Encoding::Ansi).codec().unwrap();
        assert_eq!(ansi.encode("ä€"), vec![0xE4, 0x80]);
        assert!(!ansi.utf8_flag("ä"));

        let ascii = EncodingOptions::new(Encoding::Ascii).codec().unwrap();
        assert_eq!(ascii.encode("a€b"), b"a?b");

        let unicode = EncodingOptions::new(Encoding::Unicode).codec().unwrap();
        assert_eq!(unicode.encode("ab"), vec![b'a', 0, b'b', 0]);

        let utf8 = EncodingOptions::new(Encoding::Utf8).codec().unwrap();
        assert!(utf8.utf8_flag("plain.txt"));
    }

    #[test]
    fn test_legacy_unmappable_becomes_question_mark() {
        let ansi = EncodingOptions::new(Encoding::Ansi).codec().unwrap();
        assert_eq!(ansi.encode("a中b"), b"a?b");
    }

    #[test]
    fn test_other_by_label_and_code_page() {
        let by_label = EncodingOptions::other("windows-1251").codec().unwrap();
        let by_number = EncodingOptions::other("1251").codec().unwrap();
        assert_eq!(by_label, by_number);
        assert_eq!(by_label.encode("Я"), vec![0xDF]);

        let sjis = EncodingOptions::other(" Shift_JIS ").codec().unwrap();
        assert_eq!(sjis.encode("あ"), vec![0x82, 0xA0]);

        let utf8 = EncodingOptions::other("65001").codec().unwrap();
        assert_eq!(utf8, NameCodec::Utf8 { always_flag: true });

        let ascii = EncodingOptions::other("us-ascii").codec().unwrap();
        assert_eq!(ascii, NameCodec::Ascii);
    }

    #[test]
    fn test_other_unknown() {
        let err = EncodingOptions::other("klingon").codec().unwrap_err();
        assert!(matches!(err, ZipBuildError::UnknownEncoding { ref name } if name == "klingon"));

        assert!(EncodingOptions::other("").codec().is_err());
        // WHATWG maps some labels to the replacement encoding, which can't encode.
        assert!(EncodingOptions::other("iso-2022-kr").codec().is_err());
    }

    #[test]
    fn test_collisions_follow_encoded_bytes() {
        let ascii = NameCodec::Ascii;
        assert_eq!(ascii.encode("ä.txt"), ascii.encode("ö.txt"));

        let utf8 = NameCodec::Utf8 { always_flag: false };
        assert_ne!(utf8.encode("ä.txt"), utf8.encode("ö.txt"));
    }

    #[test]
    fn test_codec_names() {
        assert_eq!(NameCodec::Utf16 { big_endian: true }.name(), "UTF-16BE");
        assert_eq!(
            EncodingOptions::new(Encoding::Ansi).codec().unwrap().name(),
            "windows-1252"
        );
    }
}
