use std::{
  fmt,
  str::FromStr,
};

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

#[cfg(target_os = "windows")]
pub const NATIVE_EOL: Eol = Eol::Dos;

#[cfg(not(target_os = "windows"))]
pub const NATIVE_EOL: Eol = Eol::Unix;

/// Line terminator styles a file can use on disk. Text is always stored with
/// bare `\n` internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Eol {
  /// CarriageReturn followed by LineFeed.
  #[serde(rename = "crlf")]
  Dos,

  /// U+000A -- LineFeed
  #[serde(rename = "lf")]
  Unix,

  /// U+000D -- CarriageReturn
  #[serde(rename = "cr")]
  Mac,
}

impl Eol {
  #[inline]
  pub const fn as_bytes(&self) -> &'static [u8] {
    match self {
      Self::Dos => b"\r\n",
      Self::Unix => b"\n",
      Self::Mac => b"\r",
    }
  }

  #[inline]
  pub const fn as_str(&self) -> &'static str {
    match self {
      Self::Dos => "\u{000D}\u{000A}",
      Self::Unix => "\u{000A}",
      Self::Mac => "\u{000D}",
    }
  }

  /// Value stored in the `eol` document property.
  #[inline]
  pub const fn property_name(&self) -> &'static str {
    match self {
      Self::Dos => "crlf",
      Self::Unix => "lf",
      Self::Mac => "cr",
    }
  }

  pub fn from_property_name(s: &str) -> Option<Eol> {
    match s {
      "crlf" => Some(Self::Dos),
      "lf" => Some(Self::Unix),
      "cr" => Some(Self::Mac),
      _ => None,
    }
  }
}

impl fmt::Display for Eol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.property_name())
  }
}

#[derive(Debug, Error)]
#[error("unknown line ending `{0}`")]
pub struct ParseEolError(String);

impl FromStr for Eol {
  type Err = ParseEolError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lower = s.to_ascii_lowercase();
    Self::from_property_name(&lower)
      .or(match lower.as_str() {
        "dos" | "windows" => Some(Eol::Dos),
        "unix" => Some(Eol::Unix),
        "mac" => Some(Eol::Mac),
        _ => None,
      })
      .ok_or(ParseEolError(s.to_string()))
  }
}

/// Finds the next line terminator at or after `from`.
///
/// Returns the terminator's byte offset and style. A `\r` as the very last byte
/// counts as a Mac terminator.
pub fn find_line_end(bytes: &[u8], from: usize) -> Option<(usize, Eol)> {
  let mut i = from;
  while i < bytes.len() {
    match bytes[i] {
      b'\n' => return Some((i, Eol::Unix)),
      b'\r' => {
        if bytes.get(i + 1) == Some(&b'\n') {
          return Some((i, Eol::Dos));
        }
        return Some((i, Eol::Mac));
      },
      _ => i += 1,
    }
  }
  None
}

/// Counts of each terminator style seen while importing a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EolTally {
  pub dos:  usize,
  pub unix: usize,
  pub mac:  usize,
}

impl EolTally {
  #[inline]
  pub fn push(&mut self, eol: Eol) {
    match eol {
      Eol::Dos => self.dos += 1,
      Eol::Unix => self.unix += 1,
      Eol::Mac => self.mac += 1,
    }
  }

  pub fn count(bytes: &[u8]) -> Self {
    let mut tally = Self::default();
    let mut pos = 0;
    while let Some((at, eol)) = find_line_end(bytes, pos) {
      tally.push(eol);
      pos = at + eol.as_bytes().len();
    }
    tally
  }

  #[inline]
  pub fn total(&self) -> usize {
    self.dos + self.unix + self.mac
  }

  /// The dominant style, or `None` if no terminators were seen.
  ///
  /// Ties go to Dos, then Unix, then Mac.
  pub fn majority(&self) -> Option<Eol> {
    if self.total() == 0 {
      return None;
    }
    if self.dos >= self.unix && self.dos >= self.mac {
      Some(Eol::Dos)
    } else if self.unix >= self.mac {
      Some(Eol::Unix)
    } else {
      Some(Eol::Mac)
    }
  }
}

#[cfg(test)]
mod line_ending_tests {
  use super::*;

  #[test]
  fn tally_majority() {
    assert_eq!(EolTally::count(b"hello").majority(), None);
    assert_eq!(EolTally::count(b"").majority(), None);
    assert_eq!(EolTally::count(b"a\r\nb\r\nc").majority(), Some(Eol::Dos));
    assert_eq!(EolTally::count(b"a\nb\r\nc\n").majority(), Some(Eol::Unix));
    assert_eq!(EolTally::count(b"a\rb\rc\n").majority(), Some(Eol::Mac));
  }

  #[test]
  fn tally_ties() {
    assert_eq!(EolTally::count(b"a\r\nb\n").majority(), Some(Eol::Dos));
    assert_eq!(EolTally::count(b"a\rb\n").majority(), Some(Eol::Unix));
    assert_eq!(EolTally::count(b"a\rb\r\nc\n").majority(), Some(Eol::Dos));
  }

  #[test]
  fn trailing_carriage_return_is_mac() {
    let tally = EolTally::count(b"abc\r");
    assert_eq!(tally, EolTally {
      dos:  0,
      unix: 0,
      mac:  1,
    });
  }

  #[test]
  fn find_line_end_styles() {
    assert_eq!(find_line_end(b"ab\r\ncd", 0), Some((2, Eol::Dos)));
    assert_eq!(find_line_end(b"ab\r\ncd", 4), None);
    assert_eq!(find_line_end(b"\n", 0), Some((0, Eol::Unix)));
    assert_eq!(find_line_end(b"x\ry", 0), Some((1, Eol::Mac)));
  }

  #[test]
  fn parse_names() {
    assert_eq!("crlf".parse::<Eol>().ok(), Some(Eol::Dos));
    assert_eq!("LF".parse::<Eol>().ok(), Some(Eol::Unix));
    assert_eq!("mac".parse::<Eol>().ok(), Some(Eol::Mac));
    assert!("nel".parse::<Eol>().is_err());
    assert_eq!(Eol::Dos.to_string(), "crlf");
  }
}
