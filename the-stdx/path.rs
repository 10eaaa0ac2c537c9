//! Filesystem permission helpers.

use std::{
  fs,
  io,
  path::Path,
  time::SystemTime,
};

/// Whether the current process may write to `path`.
///
/// A path that does not exist yet is writable if its parent directory is.
pub fn is_writable(path: &Path) -> bool {
  if path.exists() {
    return access_write(path);
  }
  match path.parent() {
    Some(parent) if parent.as_os_str().is_empty() => access_write(Path::new(".")),
    Some(parent) => access_write(parent),
    None => false,
  }
}

#[cfg(unix)]
fn access_write(path: &Path) -> bool {
  rustix::fs::access(path, rustix::fs::Access::WRITE_OK).is_ok()
}

#[cfg(not(unix))]
fn access_write(path: &Path) -> bool {
  fs::metadata(path)
    .map(|meta| !meta.permissions().readonly())
    .unwrap_or(false)
}

/// Copies the permission bits of `from` onto `to`, if `from` exists.
pub fn copy_permissions(from: &Path, to: &Path) -> io::Result<()> {
  match fs::metadata(from) {
    Ok(meta) => fs::set_permissions(to, meta.permissions()),
    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(err) => Err(err),
  }
}

/// Last modification time of `path`.
pub fn modified_time(path: &Path) -> io::Result<SystemTime> {
  fs::metadata(path)?.modified()
}

/// Sets the modification time of an existing file.
pub fn set_modified_time(path: &Path, time: SystemTime) -> io::Result<()> {
  fs::OpenOptions::new()
    .write(true)
    .open(path)?
    .set_modified(time)
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  #[test]
  fn missing_file_in_writable_dir() {
    let dir = tempfile::tempdir().unwrap();
    assert!(is_writable(&dir.path().join("new.txt")));
  }

  #[test]
  fn permissions_are_copied() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    fs::write(&a, "a").unwrap();
    fs::write(&b, "b").unwrap();

    let mut perms = fs::metadata(&a).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(&a, perms).unwrap();

    copy_permissions(&a, &b).unwrap();
    assert!(fs::metadata(&b).unwrap().permissions().readonly());

    // Leave the directory removable on every platform.
    for p in [&a, &b] {
      let mut perms = fs::metadata(p).unwrap().permissions();
      #[allow(clippy::permissions_set_readonly_false)]
      perms.set_readonly(false);
      fs::set_permissions(p, perms).unwrap();
    }
  }

  #[test]
  fn modified_time_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("f");
    fs::write(&file, "x").unwrap();
    let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
    set_modified_time(&file, when).unwrap();
    assert_eq!(modified_time(&file).unwrap(), when);
  }
}
