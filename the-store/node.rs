//! Content-tree nodes.
//!
//! A text node wraps a [`Rope`]. Cloning a rope is O(1) and shares its chunks,
//! so copy-on-write of a frozen node never copies text. Property nodes hold a
//! small ordered map.

use std::collections::BTreeMap;

use ropey::{
  Rope,
  RopeBuilder,
};
use the_core::{
  DocKind,
  DocumentId,
  NodeRef,
};
use the_stdx::rope::RopeExt;

use crate::error::{
  Result,
  StoreError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
  Editable,
  Frozen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
  Bool(bool),
  Int(i64),
  Str(String),
}

impl PropValue {
  pub fn as_bool(&self) -> Option<bool> {
    match self {
      PropValue::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      PropValue::Int(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      PropValue::Str(s) => Some(s),
      _ => None,
    }
  }
}

impl From<bool> for PropValue {
  fn from(b: bool) -> Self {
    PropValue::Bool(b)
  }
}

impl From<i64> for PropValue {
  fn from(i: i64) -> Self {
    PropValue::Int(i)
  }
}

impl From<&str> for PropValue {
  fn from(s: &str) -> Self {
    PropValue::Str(s.to_string())
  }
}

impl From<String> for PropValue {
  fn from(s: String) -> Self {
    PropValue::Str(s)
  }
}

pub type PropMap = BTreeMap<String, PropValue>;

#[derive(Debug, Clone)]
pub enum NodeData {
  Text(Rope),
  Props(PropMap),
}

#[derive(Debug, Clone)]
pub struct Node {
  /// Lineage the node was allocated for; deleting it drops the node.
  pub owner: (DocKind, DocumentId),
  pub state: NodeState,
  pub data:  NodeData,
}

impl Node {
  pub fn is_frozen(&self) -> bool {
    self.state == NodeState::Frozen
  }

  pub fn text(&self, at: NodeRef) -> Result<&Rope> {
    match &self.data {
      NodeData::Text(rope) => Ok(rope),
      NodeData::Props(_) => Err(StoreError::NodeKind(at, "text")),
    }
  }

  pub fn props(&self, at: NodeRef) -> Result<&PropMap> {
    match &self.data {
      NodeData::Props(map) => Ok(map),
      NodeData::Text(_) => Err(StoreError::NodeKind(at, "properties")),
    }
  }

  /// A new node with the same content, laid out afresh.
  ///
  /// Unlike `clone`, the result shares no chunks with `self`.
  pub fn flattened(&self, owner: (DocKind, DocumentId)) -> Node {
    let data = match &self.data {
      NodeData::Text(rope) => {
        let mut builder = RopeBuilder::new();
        for chunk in rope.chunks() {
          builder.append(chunk);
        }
        NodeData::Text(builder.finish())
      },
      NodeData::Props(map) => NodeData::Props(map.clone()),
    };
    Node {
      owner,
      state: NodeState::Frozen,
      data,
    }
  }
}

fn check_pos(rope: &Rope, pos: usize) -> Result<()> {
  let len = rope.len_bytes();
  if pos > len {
    return Err(StoreError::OutOfRange { pos, len });
  }
  if !rope.is_byte_boundary(pos) {
    return Err(StoreError::NotCharBoundary(pos));
  }
  Ok(())
}

fn check_range(rope: &Rope, start: usize, end: usize) -> Result<()> {
  check_pos(rope, start)?;
  check_pos(rope, end)?;
  if start > end {
    return Err(StoreError::OutOfRange {
      pos: start,
      len: end,
    });
  }
  Ok(())
}

/// Inserts `text` at byte `pos`, returning the number of bytes inserted.
pub fn insert(rope: &mut Rope, pos: usize, text: &str) -> Result<usize> {
  check_pos(rope, pos)?;
  if !text.is_empty() {
    let at = rope.byte_to_char(pos);
    rope.insert(at, text);
  }
  Ok(text.len())
}

/// Removes bytes `start..end`, returning the number of bytes removed.
pub fn delete(rope: &mut Rope, start: usize, end: usize) -> Result<usize> {
  check_range(rope, start, end)?;
  if start < end {
    let from = rope.byte_to_char(start);
    let to = rope.byte_to_char(end);
    rope.remove(from..to);
  }
  Ok(end - start)
}

pub fn replace(rope: &mut Rope, start: usize, end: usize, text: &str) -> Result<usize> {
  check_range(rope, start, end)?;
  delete(rope, start, end)?;
  insert(rope, start, text)
}

/// Moves `src_start..src_end` so that it starts at `dest` in the original
/// coordinates. A destination inside the source range is a no-op.
pub fn move_range(rope: &mut Rope, src_start: usize, src_end: usize, dest: usize) -> Result<()> {
  check_range(rope, src_start, src_end)?;
  check_pos(rope, dest)?;
  if src_start == src_end || (src_start <= dest && dest <= src_end) {
    return Ok(());
  }
  let moved = rope.byte_slice(src_start..src_end).to_string();
  delete(rope, src_start, src_end)?;
  let dest = if dest > src_end {
    dest - moved.len()
  } else {
    dest
  };
  insert(rope, dest, &moved)?;
  Ok(())
}

pub fn clear(rope: &mut Rope) {
  *rope = Rope::new();
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn insert_and_delete_by_byte() {
    let mut rope = Rope::from_str("héllo");
    assert_eq!(insert(&mut rope, 3, "XY").unwrap(), 2);
    assert_eq!(rope.to_string(), "héXYllo");
    assert_eq!(delete(&mut rope, 1, 3).unwrap(), 2);
    assert_eq!(rope.to_string(), "hXYllo");
  }

  #[test]
  fn rejects_split_chars() {
    let mut rope = Rope::from_str("é");
    assert!(matches!(
      insert(&mut rope, 1, "x"),
      Err(StoreError::NotCharBoundary(1))
    ));
    assert!(matches!(
      delete(&mut rope, 0, 9),
      Err(StoreError::OutOfRange { pos: 9, .. })
    ));
  }

  #[test]
  fn move_forward_and_back() {
    let mut rope = Rope::from_str("abcdef");
    move_range(&mut rope, 0, 2, 4).unwrap();
    assert_eq!(rope.to_string(), "cdabef");

    let mut rope = Rope::from_str("abcdef");
    move_range(&mut rope, 4, 6, 1).unwrap();
    assert_eq!(rope.to_string(), "aefbcd");

    let mut rope = Rope::from_str("abcdef");
    move_range(&mut rope, 1, 4, 2).unwrap();
    assert_eq!(rope.to_string(), "abcdef");
  }

  #[test]
  fn replace_text() {
    let mut rope = Rope::from_str("one two three");
    assert_eq!(replace(&mut rope, 4, 7, "2").unwrap(), 1);
    assert_eq!(rope.to_string(), "one 2 three");
  }

  #[test]
  fn flatten_keeps_content() {
    let text = "line\n".repeat(1000);
    let node = Node {
      owner: (DocKind::Draft, 0),
      state: NodeState::Editable,
      data:  NodeData::Text(Rope::from_str(&text)),
    };
    let flat = node.flattened((DocKind::Document, 1));
    assert!(flat.is_frozen());
    assert_eq!(flat.text(NodeRef::new(0, 0)).unwrap().to_string(), text);
    assert!(flat.props(NodeRef::new(0, 0)).is_err());
  }
}
