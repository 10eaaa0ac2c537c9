use the_core::Interval;

use super::Document;
use crate::{
  error::Result,
  regex::{
    RegexMatch,
    RegexOptions,
    RegexQuery,
  },
  search,
};

impl Document {
  /// First occurrence of `needle` in `start..end` of the working text.
  pub fn find(
    &self,
    needle: &str,
    start: usize,
    end: usize,
    case_sensitive: bool,
  ) -> Result<Option<Interval>> {
    Ok(search::find(&self.rope()?, needle, start, end, case_sensitive))
  }

  /// Last occurrence of `needle` ending at or before `start_pos`.
  pub fn find_backwards(
    &self,
    needle: &str,
    start_pos: usize,
    case_sensitive: bool,
  ) -> Result<Option<Interval>> {
    Ok(search::find_backwards(&self.rope()?, needle, start_pos, case_sensitive))
  }

  /// First regex match in `start..end` (the whole text when `end` is `None`),
  /// one line at a time.
  pub fn regex_find(
    &mut self,
    pattern: &str,
    start: usize,
    end: Option<usize>,
    case_sensitive: bool,
  ) -> Result<Option<RegexMatch>> {
    let text = self.rope()?;
    let end = end.unwrap_or(text.len_bytes());
    let options = RegexOptions {
      case_sensitive,
      ..RegexOptions::default()
    };
    let query = self.regex_cache.get(pattern, options)?;
    Ok(query.find_lines(&text, start, end, &mut self.scratch))
  }

  /// Last regex match ending at or before `start_pos`, not starting before
  /// `floor`.
  pub fn regex_find_backwards(
    &mut self,
    pattern: &str,
    start_pos: usize,
    floor: usize,
    case_sensitive: bool,
  ) -> Result<Option<RegexMatch>> {
    let text = self.rope()?;
    let options = RegexOptions {
      case_sensitive,
      ..RegexOptions::default()
    };
    let query = self.regex_cache.get(pattern, options)?;
    Ok(query.find_lines_backwards(&text, floor, start_pos, &mut self.scratch))
  }

  /// First regex match in a caller-supplied buffer, through this handle's
  /// pattern cache.
  pub fn regex_find_in_bytes(
    &mut self,
    pattern: &str,
    bytes: &[u8],
    start: usize,
    case_sensitive: bool,
  ) -> Result<Option<RegexMatch>> {
    let options = RegexOptions {
      case_sensitive,
      ..RegexOptions::default()
    };
    Ok(self.regex_cache.get(pattern, options)?.find_in_bytes(bytes, start))
  }

  /// Runs a precompiled query over the whole of `start..end` without
  /// splitting it into lines.
  pub fn regex_find_compiled(
    &self,
    query: &RegexQuery,
    start: usize,
    end: usize,
  ) -> Result<Option<RegexMatch>> {
    Ok(query.find(&self.rope()?, start, end))
  }
}
