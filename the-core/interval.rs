use std::ops::Range;

/// Half-open byte interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Interval {
  pub start: usize,
  pub end:   usize,
}

impl Interval {
  #[inline]
  pub const fn new(start: usize, end: usize) -> Self {
    Self { start, end }
  }

  #[inline]
  pub const fn len(&self) -> usize {
    self.end.saturating_sub(self.start)
  }

  #[inline]
  pub const fn is_empty(&self) -> bool {
    self.end <= self.start
  }

  #[inline]
  pub const fn contains(&self, pos: usize) -> bool {
    self.start <= pos && pos < self.end
  }

  #[inline]
  pub const fn shift(self, offset: usize) -> Self {
    Self::new(self.start + offset, self.end + offset)
  }

  #[inline]
  pub fn range(&self) -> Range<usize> {
    self.start..self.end
  }
}

impl From<Range<usize>> for Interval {
  fn from(r: Range<usize>) -> Self {
    Self::new(r.start, r.end)
  }
}

impl From<Interval> for Range<usize> {
  fn from(iv: Interval) -> Self {
    iv.start..iv.end
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn basics() {
    let iv = Interval::new(3, 7);
    assert_eq!(iv.len(), 4);
    assert!(iv.contains(3));
    assert!(!iv.contains(7));
    assert_eq!(iv.shift(10), Interval::new(13, 17));
    assert!(Interval::new(5, 5).is_empty());
    assert_eq!(Range::from(iv), 3..7);
  }
}
