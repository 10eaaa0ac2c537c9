//! Alignment of two revisions' text and position remapping across them.
//!
//! [`compare_texts`] produces the equal runs ([`Match`]es) between an old and a
//! new text. Lines are diffed first with the histogram algorithm; small
//! changed hunks are refined with a Myers diff over their characters. All
//! offsets are bytes.
//!
//! The match list always ends at both text lengths, so every old position in
//! `0..=old_len` has a defined image in the new text (see [`remap_pos`]).

use std::ops::Range;

use imara_diff::{
  Algorithm,
  Diff,
  Hunk,
  InternedInput,
};
use ropey::{
  Rope,
  RopeSlice,
};
use the_core::Interval;

use crate::error::{
  Result,
  invariant,
};

#[derive(Debug, Clone)]
pub struct DiffOptions {
  pub max_char_diff_ratio:       usize,
  pub max_char_diff_total_lines: u32,
  pub max_char_diff_total_bytes: usize,
  pub min_large_delete_lines:    u32,
  pub min_large_delete_bytes:    usize,
}

impl Default for DiffOptions {
  fn default() -> Self {
    const DEFAULT_BYTES_PER_LINE: usize = 200;
    Self {
      max_char_diff_ratio:       5,
      max_char_diff_total_lines: 200,
      max_char_diff_total_bytes: 200 * DEFAULT_BYTES_PER_LINE,
      min_large_delete_lines:    10,
      min_large_delete_bytes:    10 * DEFAULT_BYTES_PER_LINE,
    }
  }
}

/// An equal run: `src_start..src_end` of the old text equals
/// `dst_start..dst_end` of the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
  pub src_start: usize,
  pub src_end:   usize,
  pub dst_start: usize,
  pub dst_end:   usize,
}

impl Match {
  pub const fn new(src_start: usize, src_end: usize, dst_start: usize, dst_end: usize) -> Self {
    Self {
      src_start,
      src_end,
      dst_start,
      dst_end,
    }
  }

  pub const fn len(&self) -> usize {
    self.src_end - self.src_start
  }

  pub const fn is_empty(&self) -> bool {
    self.src_end == self.src_start
  }

  const fn inverted(self) -> Self {
    Self::new(self.dst_start, self.dst_end, self.src_start, self.src_end)
  }
}

/// One step of an edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
  /// `old` was removed. `at` is where the gap sits in the new text.
  Deletion { old: Interval, at: usize },
  /// `new` was added. `at` is where the gap sits in the old text.
  Insertion { new: Interval, at: usize },
}

struct RopeLines<'a>(RopeSlice<'a>);

impl<'a> imara_diff::TokenSource for RopeLines<'a> {
  type Token = RopeSlice<'a>;
  type Tokenizer = ropey::iter::Lines<'a>;

  fn tokenize(&self) -> Self::Tokenizer {
    self.0.lines()
  }

  fn estimate_tokens(&self) -> u32 {
    u32::try_from(self.0.len_lines()).unwrap_or(u32::MAX)
  }
}

fn byte_prefix(chars: &[char]) -> Vec<usize> {
  let mut prefix = Vec::with_capacity(chars.len() + 1);
  prefix.push(0);
  let mut acc = 0;
  for ch in chars {
    acc += ch.len_utf8();
    prefix.push(acc);
  }
  prefix
}

struct MatchBuilder<'a> {
  file:        &'a InternedInput<RopeSlice<'a>>,
  options:     &'a DiffOptions,
  matches:     Vec<Match>,
  char_hunk:   InternedInput<char>,
  token_diff:  Diff,
  line_before: u32,
  byte_before: usize,
  byte_after:  usize,
}

impl MatchBuilder<'_> {
  fn push(&mut self, src_start: usize, dst_start: usize, len: usize) {
    if len == 0 {
      return;
    }
    if let Some(last) = self.matches.last_mut()
      && last.src_end == src_start
      && last.dst_end == dst_start
    {
      last.src_end += len;
      last.dst_end += len;
      return;
    }
    self
      .matches
      .push(Match::new(src_start, src_start + len, dst_start, dst_start + len));
  }

  fn before_len_bytes(&self, range: Range<u32>) -> usize {
    self.file.before[range.start as usize..range.end as usize]
      .iter()
      .map(|&it| self.file.interner[it].len_bytes())
      .sum()
  }

  fn after_len_bytes(&self, range: Range<u32>) -> usize {
    self.file.after[range.start as usize..range.end as usize]
      .iter()
      .map(|&it| self.file.interner[it].len_bytes())
      .sum()
  }

  fn should_char_diff(
    &self,
    len_before_lines: u32,
    len_after_lines: u32,
    len_before_bytes: usize,
    len_after_bytes: usize,
  ) -> bool {
    if len_before_lines == 0 || len_after_lines == 0 {
      return false;
    }
    if len_before_lines + len_after_lines > self.options.max_char_diff_total_lines {
      return false;
    }
    if len_before_bytes.saturating_add(len_after_bytes) > self.options.max_char_diff_total_bytes {
      return false;
    }

    let ratio = self.options.max_char_diff_ratio;
    if len_after_bytes > ratio.saturating_mul(len_before_bytes) {
      return false;
    }
    if len_before_bytes > ratio.saturating_mul(len_after_bytes)
      && (len_before_lines > self.options.min_large_delete_lines
        || len_before_bytes > self.options.min_large_delete_bytes)
    {
      return false;
    }
    true
  }

  /// Records the equal lines up to `line`.
  fn equal_lines_until(&mut self, line: u32) {
    let len = self.before_len_bytes(self.line_before..line);
    self.push(self.byte_before, self.byte_after, len);
    self.byte_before += len;
    self.byte_after += len;
    self.line_before = line;
  }

  fn process_hunk(&mut self, before: Range<u32>, after: Range<u32>) {
    self.equal_lines_until(before.start);

    let len_before_bytes = self.before_len_bytes(before.clone());
    let len_after_bytes = self.after_len_bytes(after.clone());
    if self.should_char_diff(
      before.end - before.start,
      after.end - after.start,
      len_before_bytes,
      len_after_bytes,
    ) {
      self.process_char_diff(before.clone(), after);
    }

    self.byte_before += len_before_bytes;
    self.byte_after += len_after_bytes;
    self.line_before = before.end;
  }

  fn process_char_diff(&mut self, before: Range<u32>, after: Range<u32>) {
    let chars_before: Vec<char> = self.file.before[before.start as usize..before.end as usize]
      .iter()
      .flat_map(|&it| self.file.interner[it].chars())
      .collect();
    let chars_after: Vec<char> = self.file.after[after.start as usize..after.end as usize]
      .iter()
      .flat_map(|&it| self.file.interner[it].chars())
      .collect();
    let prefix_before = byte_prefix(&chars_before);
    let prefix_after = byte_prefix(&chars_after);

    self.char_hunk.update_before(chars_before.iter().copied());
    self.char_hunk.update_after(chars_after.iter().copied());
    // Characters repeat too often for the histogram heuristic to help.
    self.token_diff.compute_with(
      Algorithm::Myers,
      &self.char_hunk.before,
      &self.char_hunk.after,
      self.char_hunk.interner.num_tokens(),
    );

    let hunks: Vec<Hunk> = self.token_diff.hunks().collect();
    let (mut pos_before, mut pos_after) = (0usize, 0usize);
    for Hunk { before, after } in hunks {
      let len = prefix_before[before.start as usize] - prefix_before[pos_before];
      self.push(
        self.byte_before + prefix_before[pos_before],
        self.byte_after + prefix_after[pos_after],
        len,
      );
      pos_before = before.end as usize;
      pos_after = after.end as usize;
    }
    let len = prefix_before[chars_before.len()] - prefix_before[pos_before];
    self.push(
      self.byte_before + prefix_before[pos_before],
      self.byte_after + prefix_after[pos_after],
      len,
    );
    self.char_hunk.clear();
  }

  fn finish(mut self, old_len: usize, new_len: usize) -> Vec<Match> {
    let end = u32::try_from(self.file.before.len()).unwrap_or(u32::MAX);
    self.equal_lines_until(end);
    debug_assert_eq!(self.byte_before, old_len);
    debug_assert_eq!(self.byte_after, new_len);

    let closed = self
      .matches
      .last()
      .is_some_and(|m| m.src_end == old_len && m.dst_end == new_len);
    if !closed {
      self
        .matches
        .push(Match::new(old_len, old_len, new_len, new_len));
    }
    self.matches
  }
}

/// Equal runs between `before` and `after`, in order, ending at both lengths.
pub fn compare_texts(before: &Rope, after: &Rope) -> Vec<Match> {
  compare_texts_with_options(before, after, &DiffOptions::default())
}

pub fn compare_texts_with_options(before: &Rope, after: &Rope, options: &DiffOptions) -> Vec<Match> {
  let file = InternedInput::new(RopeLines(before.slice(..)), RopeLines(after.slice(..)));
  let diff = Diff::compute(Algorithm::Histogram, &file);
  let mut builder = MatchBuilder {
    file: &file,
    options,
    matches: Vec::new(),
    char_hunk: InternedInput::default(),
    token_diff: Diff::default(),
    line_before: 0,
    byte_before: 0,
    byte_after: 0,
  };
  for hunk in diff.hunks() {
    builder.process_hunk(hunk.before, hunk.after);
  }
  let matches = builder.finish(before.len_bytes(), after.len_bytes());
  log::trace!("diff produced {} matches", matches.len());
  matches
}

/// Turns the gaps between matches into deletions and insertions, in document
/// order. A deletion comes before an insertion at the same point.
pub fn to_edit_script(matches: &[Match]) -> Vec<Change> {
  let mut changes = Vec::new();
  let (mut src, mut dst) = (0, 0);
  for m in matches {
    if m.src_start > src {
      changes.push(Change::Deletion {
        old: Interval::new(src, m.src_start),
        at:  dst,
      });
    }
    if m.dst_start > dst {
      changes.push(Change::Insertion {
        new: Interval::new(dst, m.dst_start),
        at:  m.src_start,
      });
    }
    src = m.src_end;
    dst = m.dst_end;
  }
  changes
}

/// Where the new text first differs from the old one, or `None` if they are
/// equal.
pub fn first_change_pos(matches: &[Match]) -> Option<usize> {
  match to_edit_script(matches).first()? {
    Change::Deletion { at, .. } => Some(*at),
    Change::Insertion { new, .. } => Some(new.start),
  }
}

/// Lines of the new text touched by a change, ascending and without repeats.
pub fn changed_lines(matches: &[Match], new_text: &Rope) -> Vec<usize> {
  let len = new_text.len_bytes();
  let mut lines = Vec::new();
  for change in to_edit_script(matches) {
    let (first, last) = match change {
      Change::Deletion { at, .. } => (at, at),
      Change::Insertion { new, .. } => (new.start, new.end.saturating_sub(1).max(new.start)),
    };
    let first = new_text.byte_to_line(first.min(len));
    let last = new_text.byte_to_line(last.min(len));
    for line in first..=last {
      if lines.last() != Some(&line) {
        lines.push(line);
      }
    }
  }
  lines.dedup();
  lines
}

/// Image of an old position in the new text, scanning `matches` in order.
///
/// A position in a deleted gap collapses to the end of the previous run.
pub fn remap_pos(matches: &[Match], pos: usize) -> Option<usize> {
  let mut prev_end = 0;
  for m in matches {
    if pos < m.src_start {
      return Some(prev_end);
    }
    if pos <= m.src_end {
      return Some(m.dst_start + (pos - m.src_start));
    }
    prev_end = m.dst_end;
  }
  None
}

/// Image of a new position in the old text.
pub fn remap_pos_back(matches: &[Match], pos: usize) -> Option<usize> {
  let inverted: Vec<Match> = matches.iter().map(|m| m.inverted()).collect();
  remap_pos(&inverted, pos)
}

/// Old-text range that `range` of the new text was copied from, if it lies
/// within one equal run.
pub fn unchanged_source(matches: &[Match], range: Interval) -> Option<Interval> {
  matches
    .iter()
    .find(|m| m.dst_start <= range.start && range.end <= m.dst_end && !m.is_empty())
    .map(|m| {
      let offset = m.src_start;
      Interval::new(range.start - m.dst_start + offset, range.end - m.dst_start + offset)
    })
}

/// Cursor state carried across a revision switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remapped {
  pub pos:        usize,
  pub selections: Vec<Interval>,
  pub top:        usize,
}

/// Moves a cursor position, its selections and the viewport top from the old
/// text to the new one. Selections that collapse to nothing are dropped.
pub fn remap(matches: &[Match], pos: usize, selections: &[Interval], top: usize) -> Result<Remapped> {
  let map = |p: usize| {
    remap_pos(matches, p).ok_or_else(|| invariant(format!("position {p} not covered by diff")))
  };
  let mut remapped = Vec::with_capacity(selections.len());
  for sel in selections {
    let (start, end) = (map(sel.start)?, map(sel.end)?);
    if start < end {
      remapped.push(Interval::new(start, end));
    }
  }
  Ok(Remapped {
    pos:        map(pos)?,
    selections: remapped,
    top:        map(top)?,
  })
}
