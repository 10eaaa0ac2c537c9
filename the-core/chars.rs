/// Private-use char standing in for NUL inside stored text.
pub const NUL_STAND_IN: char = '\u{F8FF}';

/// UTF-8 encoding of [`NUL_STAND_IN`].
pub const NUL_STAND_IN_UTF8: [u8; 3] = [0xEF, 0xA3, 0xBF];

#[inline]
pub const fn is_continuation(b: u8) -> bool {
  b & 0xC0 == 0x80
}

/// Length of the UTF-8 sequence introduced by `lead`.
///
/// Stray continuation bytes and invalid lead bytes count as one byte so that
/// callers stepping through malformed input always make progress.
#[inline]
pub const fn utf8_len(lead: u8) -> usize {
  match lead {
    0x00..=0x7F => 1,
    0xC0..=0xDF => 2,
    0xE0..=0xEF => 3,
    0xF0..=0xF7 => 4,
    _ => 1,
  }
}

/// Moves `pos` back until it sits on a char boundary of `bytes`.
pub fn floor_char_boundary(bytes: &[u8], pos: usize) -> usize {
  let mut pos = pos.min(bytes.len());
  while pos > 0 && pos < bytes.len() && is_continuation(bytes[pos]) {
    pos -= 1;
  }
  pos
}

/// Byte-wise replace of NUL with [`NUL_STAND_IN_UTF8`].
pub fn replace_nul(bytes: &[u8], out: &mut Vec<u8>) -> usize {
  let mut replaced = 0;
  for &b in bytes {
    if b == 0 {
      out.extend_from_slice(&NUL_STAND_IN_UTF8);
      replaced += 1;
    } else {
      out.push(b);
    }
  }
  replaced
}

/// Inverse of [`replace_nul`].
pub fn restore_nul(bytes: &[u8], out: &mut Vec<u8>) {
  let mut i = 0;
  while i < bytes.len() {
    if bytes[i..].starts_with(&NUL_STAND_IN_UTF8) {
      out.push(0);
      i += NUL_STAND_IN_UTF8.len();
    } else {
      out.push(bytes[i]);
      i += 1;
    }
  }
}
