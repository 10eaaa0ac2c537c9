//! Regular expression search over a revision's text.
//!
//! Patterns are compiled by the `regex-cursor` meta engine. Two strategies run
//! a compiled [`RegexQuery`]:
//!
//! - whole-subject: the regex runs over the rope itself through a
//!   [`ByteCursor`], chunk by chunk. Suited to tightly bounded searches.
//! - line-driven: each logical line is copied into a scratch buffer and
//!   searched on its own. `^` and `$` then bind to line boundaries, and no match
//!   can span two lines.
//!
//! Compiled patterns are kept in a [`RegexCache`] owned by whoever searches, so
//! there is no process-wide state.

use std::collections::{
  BTreeMap,
  VecDeque,
};

use ropey::Rope;
use the_core::{
  Interval,
  chars::is_continuation,
};
use the_stdx::rope::{
  Anchored,
  Config,
  Input,
  Regex,
  RegexBuilder,
  RopeExt,
};

use crate::{
  cursor::ByteCursor,
  search::{
    Result,
    SearchError,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegexOptions {
  pub case_sensitive: bool,
  /// `^` and `$` also match at line boundaries.
  pub multi_line:     bool,
}

impl Default for RegexOptions {
  fn default() -> Self {
    Self {
      case_sensitive: true,
      multi_line:     true,
    }
  }
}

/// Extent of a match plus every capture group that took part in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch {
  pub range:    Interval,
  /// Numbered groups, 1 and up. Groups that did not participate are absent.
  pub captures: BTreeMap<usize, Interval>,
}

impl RegexMatch {
  /// Builds a match from capture spans, group 0 first.
  fn from_groups(mut groups: impl Iterator<Item = Option<Interval>>) -> Option<Self> {
    let range = groups.next()??;
    let captures = groups
      .enumerate()
      .filter_map(|(i, span)| span.map(|span| (i + 1, span)))
      .collect();
    Some(Self { range, captures })
  }

  fn shifted(mut self, offset: usize) -> Self {
    self.range = self.range.shift(offset);
    for span in self.captures.values_mut() {
      *span = span.shift(offset);
    }
    self
  }
}

/// Converts the capture spans of one hit into a [`RegexMatch`].
macro_rules! match_of {
  ($caps:expr) => {
    RegexMatch::from_groups(
      $caps
        .iter()
        .map(|span| span.map(|span| Interval::new(span.start, span.end))),
    )
  };
}

/// A compiled pattern.
pub struct RegexQuery {
  regex:   Regex,
  pattern: String,
  options: RegexOptions,
}

impl std::fmt::Debug for RegexQuery {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RegexQuery")
      .field("pattern", &self.pattern)
      .field("options", &self.options)
      .finish()
  }
}

impl RegexQuery {
  pub fn new(pattern: &str, case_sensitive: bool) -> Result<Self> {
    Self::with_options(pattern, RegexOptions {
      case_sensitive,
      ..RegexOptions::default()
    })
  }

  pub fn with_options(pattern: &str, options: RegexOptions) -> Result<Self> {
    let regex = RegexBuilder::new()
      .syntax(
        Config::new()
          .case_insensitive(!options.case_sensitive)
          .multi_line(options.multi_line),
      )
      .build(pattern)
      .map_err(|err| {
        log::debug!("rejected pattern {pattern:?}: {err}");
        SearchError::InvalidPattern(err.to_string())
      })?;
    Ok(Self {
      regex,
      pattern: pattern.to_string(),
      options,
    })
  }

  pub fn pattern(&self) -> &str {
    &self.pattern
  }

  pub fn options(&self) -> RegexOptions {
    self.options
  }

  /// First match within `start..end`, running over the rope directly.
  pub fn find(&self, text: &Rope, start: usize, end: usize) -> Option<RegexMatch> {
    let end = end.min(text.len_bytes());
    if start > end {
      return None;
    }
    let input = Input::new(ByteCursor::at(text, 0)).range(start..end);
    self
      .regex
      .captures_iter(input)
      .next()
      .and_then(|caps| match_of!(caps))
  }

  /// First match in a caller-supplied buffer, at or after `start`.
  pub fn find_in_bytes(&self, bytes: &[u8], start: usize) -> Option<RegexMatch> {
    if start > bytes.len() {
      return None;
    }
    let input = Input::new(bytes).range(start..bytes.len());
    self
      .regex
      .captures_iter(input)
      .next()
      .and_then(|caps| match_of!(caps))
  }

  /// Match in `bytes[from..before]` with the greatest start, trying an
  /// anchored search at every char boundary from `before` down.
  fn rfind_in_bytes(&self, bytes: &[u8], from: usize, before: usize) -> Option<RegexMatch> {
    if from > before || before > bytes.len() {
      return None;
    }
    (from..=before)
      .rev()
      .filter(|&pos| bytes.get(pos).is_none_or(|&b| !is_continuation(b)))
      .find_map(|pos| {
        let mut input = Input::new(bytes).range(pos..before);
        input.anchored(Anchored::Yes);
        self
          .regex
          .captures_iter(input)
          .next()
          .and_then(|caps| match_of!(caps))
      })
  }

  /// First match within `start..end`, searching one line at a time.
  pub fn find_lines(
    &self,
    text: &Rope,
    start: usize,
    end: usize,
    scratch: &mut Vec<u8>,
  ) -> Option<RegexMatch> {
    let len = text.len_bytes();
    let end = end.min(len);
    if start > end {
      return None;
    }

    let mut line_start = text.rfind_byte(b'\n', 0, start).map_or(0, |nl| nl + 1);
    loop {
      let line_end = text.find_byte(b'\n', line_start, len).map_or(len, |nl| nl + 1);
      scratch.clear();
      text.write_bytes(line_start, line_end, scratch);

      let from = start.max(line_start) - line_start;
      let to = end.min(line_end) - line_start;
      if from <= to {
        let input = Input::new(scratch.as_slice()).range(from..to);
        if let Some(found) = self
          .regex
          .captures_iter(input)
          .next()
          .and_then(|caps| match_of!(caps))
        {
          return Some(found.shifted(line_start));
        }
      }

      if line_end >= end || line_end == len {
        return None;
      }
      line_start = line_end;
    }
  }

  /// Last match ending at or before `start_pos` and starting at or after
  /// `floor`, searching one line at a time towards the start.
  pub fn find_lines_backwards(
    &self,
    text: &Rope,
    floor: usize,
    start_pos: usize,
    scratch: &mut Vec<u8>,
  ) -> Option<RegexMatch> {
    let len = text.len_bytes();
    let start_pos = start_pos.min(len);
    if floor > start_pos {
      return None;
    }

    let mut line_start = text.rfind_byte(b'\n', 0, start_pos).map_or(0, |nl| nl + 1);
    loop {
      let line_end = text.find_byte(b'\n', line_start, len).map_or(len, |nl| nl + 1);
      scratch.clear();
      text.write_bytes(line_start, line_end, scratch);

      let from = floor.max(line_start) - line_start;
      let to = start_pos.min(line_end) - line_start;
      if let Some(found) = self.rfind_in_bytes(scratch, from, to) {
        return Some(found.shifted(line_start));
      }

      if line_start <= floor || line_start == 0 {
        return None;
      }
      line_start = text
        .rfind_byte(b'\n', 0, line_start - 1)
        .map_or(0, |nl| nl + 1);
    }
  }
}

/// Compiled patterns keyed by pattern text and options.
pub struct RegexCache {
  entries:  VecDeque<RegexQuery>,
  capacity: usize,
}

impl RegexCache {
  const DEFAULT_CAPACITY: usize = 8;

  pub fn new() -> Self {
    Self::with_capacity(Self::DEFAULT_CAPACITY)
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      entries:  VecDeque::with_capacity(capacity),
      capacity: capacity.max(1),
    }
  }

  /// Compiled form of `pattern`, compiling and caching it on a miss.
  pub fn get(&mut self, pattern: &str, options: RegexOptions) -> Result<&RegexQuery> {
    let hit = self
      .entries
      .iter()
      .position(|q| q.pattern == pattern && q.options == options);
    match hit {
      Some(i) => {
        // Move to the front so eviction drops the least recently used entry.
        if let Some(query) = self.entries.remove(i) {
          self.entries.push_front(query);
        }
      },
      None => {
        let query = RegexQuery::with_options(pattern, options)?;
        if self.entries.len() == self.capacity {
          self.entries.pop_back();
        }
        self.entries.push_front(query);
      },
    }
    self
      .entries
      .front()
      .ok_or_else(|| SearchError::InvalidPattern(pattern.to_string()))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }
}

impl Default for RegexCache {
  fn default() -> Self {
    Self::new()
  }
}
