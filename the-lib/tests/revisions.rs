use std::sync::Arc;

use the_lib::{
  DocEvent,
  Document,
  Interval,
  Store,
  StoreConfig,
  diff,
};

fn new_doc() -> Document {
  let store = Store::new(std::env::temp_dir());
  Document::new(store, Arc::new(StoreConfig::default())).unwrap()
}

fn floor_boundary(s: &str, pos: usize) -> usize {
  let mut pos = pos % (s.len() + 1);
  while !s.is_char_boundary(pos) {
    pos -= 1;
  }
  pos
}

quickcheck::quickcheck! {
  fn edits_match_a_reference_string(ops: Vec<(u8, usize, usize, String)>) -> bool {
    let mut doc = new_doc();
    let mut reference = String::new();
    for (kind, a, b, text) in ops {
      match kind % 4 {
        0 | 1 => {
          let pos = floor_boundary(&reference, a);
          doc.insert(pos, &text).unwrap();
          reference.insert_str(pos, &text);
        },
        2 => {
          let start = floor_boundary(&reference, a);
          let end = floor_boundary(&reference, (start + b % 8).min(reference.len()));
          let end = end.max(start);
          doc.delete_range(start, end).unwrap();
          reference.replace_range(start..end, "");
        },
        _ => doc.freeze().unwrap(),
      }
      if doc.text().unwrap() != reference || doc.len().unwrap() != reference.len() {
        return false;
      }
    }
    true
  }
}

#[test]
fn freeze_is_idempotent() {
  let mut doc = new_doc();
  doc.insert(0, "content").unwrap();
  doc.set_name("a.txt").unwrap();
  doc.freeze().unwrap();
  let first = (doc.head_node().unwrap(), doc.prop_node().unwrap());
  doc.freeze().unwrap();
  let second = (doc.head_node().unwrap(), doc.prop_node().unwrap());
  assert_eq!(first, second);
}

#[test]
fn fork_shares_head_and_length_until_written() {
  let mut doc = new_doc();
  doc.insert(0, "base text").unwrap();
  doc.freeze().unwrap();
  let frozen = doc.id();
  let head = doc.head_node().unwrap();

  let forked = doc.fork().unwrap();
  assert_ne!(forked, frozen);
  assert_eq!(doc.head_node().unwrap(), head);
  assert_eq!(doc.version_length(forked.version_id).unwrap(), 9);

  doc.delete_range(0, 5).unwrap();
  assert_eq!(doc.id(), forked);
  assert_ne!(doc.head_node().unwrap(), head);
  assert_eq!(doc.version_length(frozen.version_id).unwrap(), 9);
  assert_eq!(doc.version_length(forked.version_id).unwrap(), 4);
}

#[test]
fn commit_parent_is_prior_version() {
  let mut doc = new_doc();
  doc.insert(0, "first\n").unwrap();
  let v0 = doc.commit(Some("one"), None).unwrap();
  doc.insert(6, "second\n").unwrap();
  let v1 = doc.commit(Some("two"), None).unwrap();
  doc.insert(0, "zeroth\n").unwrap();
  let v2 = doc.commit(None, None).unwrap();

  assert_eq!(doc.parent_of(v1).unwrap(), Some(v0));
  assert_eq!(doc.parent_of(v2).unwrap(), Some(v1));
  assert_eq!(doc.version_count().unwrap(), 3);
  assert_eq!(doc.text().unwrap(), "zeroth\nfirst\nsecond\n");
}

#[test]
fn commit_notifies_subscribers() {
  let mut doc = new_doc();
  doc.insert(0, "x").unwrap();
  let sub = doc.store().subscribe();
  let draft = doc.id();
  let committed = doc.commit(None, None).unwrap();
  let events = sub.drain();
  assert_eq!(events, vec![
    DocEvent::DocDeleted(draft),
    DocEvent::Committed {
      old: draft,
      new: committed,
    },
  ]);
}

#[test]
fn self_diff_is_a_remap_fixed_point() {
  let mut doc = new_doc();
  doc.insert(0, "alpha\nbeta\ngamma\n").unwrap();
  let id = doc.id();
  let matches = doc.diff(id, id).unwrap();
  let len = doc.len().unwrap();
  assert_eq!(matches.iter().filter(|m| !m.is_empty()).count(), 1);
  assert_eq!(matches[0], diff::Match::new(0, len, 0, len));

  let selections = [Interval::new(0, 5), Interval::new(7, 12)];
  for pos in 0..=len {
    let remapped = diff::remap(&matches, pos, &selections, pos).unwrap();
    assert_eq!(remapped.pos, pos);
    assert_eq!(remapped.top, pos);
    assert_eq!(remapped.selections, selections.to_vec());
  }
}

#[test]
fn first_change_and_changed_lines() {
  let mut doc = new_doc();
  doc.insert(0, "a\nb\nc\n").unwrap();
  doc.freeze().unwrap();
  let old = doc.id();
  doc.replace(2, 3, "B").unwrap();
  let new = doc.id();

  let matches = doc.diff(old, new).unwrap();
  assert_eq!(diff::first_change_pos(&matches), Some(2));
  assert_eq!(doc.changed_lines(old, new).unwrap(), vec![1]);
  assert_eq!(diff::first_change_pos(&doc.diff(new, new).unwrap()), None);
}

#[test]
fn literal_search_agrees_in_both_directions() {
  let mut doc = new_doc();
  doc.insert(0, "needle hay needle hay n\u{e9}edle").unwrap();
  let len = doc.len().unwrap();
  let mut from = 0;
  while let Some(found) = doc.find("needle", from, len, true).unwrap() {
    assert_eq!(doc.find_backwards("needle", found.end, true).unwrap(), Some(found));
    from = found.end;
  }
  assert_eq!(from, 17);
  assert_eq!(doc.find("N\u{c9}EDLE", 0, len, false).unwrap(), Some(Interval::new(22, 29)));
}

#[test]
fn anchored_regex_matches_once_per_line() {
  let mut doc = new_doc();
  doc.insert(0, "one\ntwo\nthree").unwrap();
  let len = doc.len().unwrap();
  let mut hits = Vec::new();
  let mut from = 0;
  while from <= len {
    let Some(found) = doc.regex_find("^.*$", from, None, true).unwrap() else {
      break;
    };
    hits.push(found.range);
    from = doc.line_end(found.range.end).unwrap() + 1;
  }
  assert_eq!(hits, vec![
    Interval::new(0, 3),
    Interval::new(4, 7),
    Interval::new(8, 13)
  ]);
  assert!(
    doc
      .regex_find("one$\\n^two", 0, None, true)
      .unwrap()
      .is_none()
  );
}

#[test]
fn undo_by_switching_to_parent() {
  let mut doc = new_doc();
  doc.start_change(false).unwrap();
  doc.insert(0, "hello world").unwrap();
  doc.end_change().unwrap();
  let first = doc.id();

  doc.start_change(false).unwrap();
  doc.delete_range(5, 11).unwrap();
  doc.end_change().unwrap();
  let second = doc.id();
  assert_eq!(doc.parent_of(second).unwrap(), Some(first));

  let remapped = doc.switch_to(first, 5, &[], 0).unwrap();
  assert_eq!(remapped.pos, 5);
  assert_eq!(doc.text().unwrap(), "hello world");

  doc.insert(11, "!").unwrap();
  let third = doc.id();
  assert_eq!(doc.children_of(first.version_id).unwrap(), vec![
    second.version_id,
    third.version_id
  ]);
}
