//! Text encodings for file import and export.
//!
//! Decoding of UTF-8, UTF-16 and legacy single/multi-byte encodings goes
//! through `encoding_rs` without replacement, so malformed input is reported
//! with its offset instead of being papered over. UTF-32 is not part of
//! `encoding_rs` and is handled here, as is encoding to UTF-16 (which
//! `encoding_rs` only decodes).

use std::fmt;

use encoding_rs::{
  DecoderResult,
  Encoding,
  EncoderResult,
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodingError {
  #[error("malformed input at byte {offset}")]
  Malformed { offset: u64 },
  #[error("{ch:?} at byte {offset} cannot be represented in {encoding}")]
  Unmappable {
    ch:       char,
    offset:   u64,
    encoding: &'static str,
  },
}

impl EncodingError {
  pub fn offset(&self) -> u64 {
    match self {
      Self::Malformed { offset } | Self::Unmappable { offset, .. } => *offset,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
  #[default]
  Utf8,
  Utf16Le,
  Utf16Be,
  Utf32Le,
  Utf32Be,
  Legacy(&'static Encoding),
}

const BOMS: [(&[u8], TextEncoding); 5] = [
  (&[0x00, 0x00, 0xFE, 0xFF], TextEncoding::Utf32Be),
  (&[0xFF, 0xFE, 0x00, 0x00], TextEncoding::Utf32Le),
  (&[0xEF, 0xBB, 0xBF], TextEncoding::Utf8),
  (&[0xFE, 0xFF], TextEncoding::Utf16Be),
  (&[0xFF, 0xFE], TextEncoding::Utf16Le),
];

impl TextEncoding {
  pub fn from_encoding(encoding: &'static Encoding) -> Self {
    if encoding == encoding_rs::UTF_8 {
      Self::Utf8
    } else if encoding == encoding_rs::UTF_16LE {
      Self::Utf16Le
    } else if encoding == encoding_rs::UTF_16BE {
      Self::Utf16Be
    } else {
      Self::Legacy(encoding)
    }
  }

  /// Looks up an encoding by any of its WHATWG labels, or a UTF-32 name.
  pub fn for_label(label: &str) -> Option<Self> {
    match label.trim().to_ascii_lowercase().as_str() {
      "utf-32" | "utf-32le" | "utf32" | "utf32le" => Some(Self::Utf32Le),
      "utf-32be" | "utf32be" => Some(Self::Utf32Be),
      other => {
        let encoding = Encoding::for_label(other.as_bytes())?;
        (encoding != encoding_rs::REPLACEMENT).then(|| Self::from_encoding(encoding))
      },
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      Self::Utf8 => "UTF-8",
      Self::Utf16Le => "UTF-16LE",
      Self::Utf16Be => "UTF-16BE",
      Self::Utf32Le => "UTF-32LE",
      Self::Utf32Be => "UTF-32BE",
      Self::Legacy(encoding) => encoding.name(),
    }
  }

  /// Byte-order mark for this encoding. Empty for legacy encodings.
  pub fn bom(&self) -> &'static [u8] {
    BOMS
      .iter()
      .find(|(_, enc)| enc == self)
      .map_or(&[][..], |(bom, _)| *bom)
  }

  pub fn is_utf8(&self) -> bool {
    matches!(self, Self::Utf8)
  }
}

impl fmt::Display for TextEncoding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Encoding announced by a byte-order mark at the start of `bytes`, and the
/// length of that mark.
pub fn detect_bom(bytes: &[u8]) -> Option<(TextEncoding, usize)> {
  BOMS
    .iter()
    .find(|(bom, _)| bytes.starts_with(bom))
    .map(|(bom, enc)| (*enc, bom.len()))
}

const SNIFF_LEN: usize = 64 * 1024;

/// Guesses the encoding of text without a byte-order mark.
///
/// Zero-byte patterns pick out UTF-16 and UTF-32; otherwise valid UTF-8 wins,
/// and anything else is left to `chardetng`.
pub fn detect(bytes: &[u8]) -> TextEncoding {
  let sample = &bytes[..bytes.len().min(SNIFF_LEN)];
  if let Some(wide) = sniff_wide(sample) {
    return wide;
  }
  if std::str::from_utf8(bytes).is_ok() {
    return TextEncoding::Utf8;
  }
  let mut detector = chardetng::EncodingDetector::new();
  detector.feed(sample, sample.len() == bytes.len());
  TextEncoding::from_encoding(detector.guess(None, true))
}

fn sniff_wide(sample: &[u8]) -> Option<TextEncoding> {
  if sample.len() < 4 || !sample.contains(&0) {
    return None;
  }
  let mut zeros = [0usize; 4];
  for (i, &b) in sample.iter().enumerate() {
    if b == 0 {
      zeros[i % 4] += 1;
    }
  }
  let quads = sample.len() / 4;
  let most = |n: usize| n * 10 >= quads * 9;
  let few = |n: usize| n * 10 <= quads;
  if most(zeros[1]) && most(zeros[2]) && most(zeros[3]) && few(zeros[0]) {
    return Some(TextEncoding::Utf32Le);
  }
  if most(zeros[0]) && most(zeros[1]) && most(zeros[2]) && few(zeros[3]) {
    return Some(TextEncoding::Utf32Be);
  }

  let pairs = sample.len() / 2;
  let even = zeros[0] + zeros[2];
  let odd = zeros[1] + zeros[3];
  if odd * 10 >= pairs * 7 && even * 10 <= pairs {
    return Some(TextEncoding::Utf16Le);
  }
  if even * 10 >= pairs * 7 && odd * 10 <= pairs {
    return Some(TextEncoding::Utf16Be);
  }
  None
}

enum DecoderInner {
  Rs(encoding_rs::Decoder),
  Utf32 { big_endian: bool, pending: Vec<u8> },
}

/// Incremental decoder to UTF-8. Input may be split anywhere.
pub struct Decoder {
  inner:    DecoderInner,
  /// Input bytes consumed by earlier calls.
  consumed: u64,
}

impl Decoder {
  pub fn new(encoding: TextEncoding) -> Self {
    let inner = match encoding {
      TextEncoding::Utf32Le => DecoderInner::Utf32 {
        big_endian: false,
        pending:    Vec::new(),
      },
      TextEncoding::Utf32Be => DecoderInner::Utf32 {
        big_endian: true,
        pending:    Vec::new(),
      },
      TextEncoding::Utf8 => DecoderInner::Rs(encoding_rs::UTF_8.new_decoder_without_bom_handling()),
      TextEncoding::Utf16Le => {
        DecoderInner::Rs(encoding_rs::UTF_16LE.new_decoder_without_bom_handling())
      },
      TextEncoding::Utf16Be => {
        DecoderInner::Rs(encoding_rs::UTF_16BE.new_decoder_without_bom_handling())
      },
      TextEncoding::Legacy(encoding) => DecoderInner::Rs(encoding.new_decoder_without_bom_handling()),
    };
    Self { inner, consumed: 0 }
  }

  /// Decodes `src`, appending to `out`. `last` marks the end of the input.
  pub fn decode(&mut self, src: &[u8], last: bool, out: &mut String) -> Result<(), EncodingError> {
    let base = self.consumed;
    match &mut self.inner {
      DecoderInner::Rs(decoder) => {
        let mut read_total = 0;
        loop {
          let needed = decoder
            .max_utf8_buffer_length_without_replacement(src.len() - read_total)
            .unwrap_or(src.len() * 3 + 16);
          out.reserve(needed);
          let (result, read) =
            decoder.decode_to_string_without_replacement(&src[read_total..], out, last);
          read_total += read;
          match result {
            DecoderResult::InputEmpty => break,
            DecoderResult::OutputFull => continue,
            DecoderResult::Malformed(bad, after) => {
              let offset = (base + read_total as u64).saturating_sub(bad as u64 + after as u64);
              return Err(EncodingError::Malformed { offset });
            },
          }
        }
      },
      DecoderInner::Utf32 {
        big_endian,
        pending,
      } => {
        let start_offset = base - pending.len() as u64;
        pending.extend_from_slice(src);
        let units = pending.len() / 4;
        out.reserve(units);
        for (i, unit) in pending.chunks_exact(4).enumerate() {
          let bytes = [unit[0], unit[1], unit[2], unit[3]];
          let value = if *big_endian {
            u32::from_be_bytes(bytes)
          } else {
            u32::from_le_bytes(bytes)
          };
          match char::from_u32(value) {
            Some(ch) => out.push(ch),
            None => {
              return Err(EncodingError::Malformed {
                offset: start_offset + (i * 4) as u64,
              });
            },
          }
        }
        pending.drain(..units * 4);
        if last && !pending.is_empty() {
          return Err(EncodingError::Malformed {
            offset: start_offset + (units * 4) as u64,
          });
        }
      },
    }
    self.consumed += src.len() as u64;
    Ok(())
  }
}

/// Encoder from UTF-8. Offsets in errors count input bytes.
pub struct Encoder {
  encoding: TextEncoding,
  inner:    Option<encoding_rs::Encoder>,
  consumed: u64,
}

impl Encoder {
  pub fn new(encoding: TextEncoding) -> Self {
    let inner = match encoding {
      TextEncoding::Legacy(enc) => Some(enc.new_encoder()),
      _ => None,
    };
    Self {
      encoding,
      inner,
      consumed: 0,
    }
  }

  pub fn encode(&mut self, src: &str, out: &mut Vec<u8>) -> Result<(), EncodingError> {
    self.encode_inner(src, false, out)
  }

  /// Flushes any shift state. Call once after the last `encode`.
  pub fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), EncodingError> {
    self.encode_inner("", true, out)
  }

  fn encode_inner(&mut self, src: &str, last: bool, out: &mut Vec<u8>) -> Result<(), EncodingError> {
    match self.encoding {
      TextEncoding::Utf8 => out.extend_from_slice(src.as_bytes()),
      TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
        let big_endian = self.encoding == TextEncoding::Utf16Be;
        out.reserve(src.len() * 2);
        for unit in src.encode_utf16() {
          out.extend_from_slice(&if big_endian {
            unit.to_be_bytes()
          } else {
            unit.to_le_bytes()
          });
        }
      },
      TextEncoding::Utf32Le | TextEncoding::Utf32Be => {
        let big_endian = self.encoding == TextEncoding::Utf32Be;
        out.reserve(src.len() * 4);
        for ch in src.chars() {
          let value = ch as u32;
          out.extend_from_slice(&if big_endian {
            value.to_be_bytes()
          } else {
            value.to_le_bytes()
          });
        }
      },
      TextEncoding::Legacy(encoding) => {
        let Some(encoder) = self.inner.as_mut() else {
          return Ok(());
        };
        let mut read_total = 0;
        loop {
          let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(src.len() - read_total)
            .unwrap_or(src.len() * 4 + 16);
          out.reserve(needed);
          let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(&src[read_total..], out, last);
          read_total += read;
          match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => continue,
            EncoderResult::Unmappable(ch) => {
              return Err(EncodingError::Unmappable {
                ch,
                offset: self.consumed + read_total.saturating_sub(ch.len_utf8()) as u64,
                encoding: encoding.name(),
              });
            },
          }
        }
      },
    }
    self.consumed += src.len() as u64;
    Ok(())
  }
}

/// Decodes a complete buffer.
pub fn decode_all(bytes: &[u8], encoding: TextEncoding) -> Result<String, EncodingError> {
  let mut out = String::new();
  Decoder::new(encoding).decode(bytes, true, &mut out)?;
  Ok(out)
}

/// Encodes a complete string.
pub fn encode_all(text: &str, encoding: TextEncoding) -> Result<Vec<u8>, EncodingError> {
  let mut out = Vec::new();
  let mut encoder = Encoder::new(encoding);
  encoder.encode(text, &mut out)?;
  encoder.finish(&mut out)?;
  Ok(out)
}
