use super::helpers::*;
use crate::{Config, Tree};
use anyhow::Result;
use std::time::Duration;
use tempfile::tempdir;

// --------------------- Basic writes ---------------------

#[test]
fn single_put_get() -> Result<()> {
    let dir = tempdir()?;
    let tree = Tree::new(Config::new(dir.path()))?;

    tree.put(&[1], &[2])?;
    assert_eq!(tree.get(&[1])?, Some(vec![2]));
    Ok(())
}

#[test]
fn empty_key_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let tree = Tree::new(Config::new(dir.path()))?;

    assert!(tree.put(b"", b"value").is_err());
    Ok(())
}

#[test]
fn empty_value_is_legal() -> Result<()> {
    let dir = tempdir()?;
    let tree = Tree::new(Config::new(dir.path()))?;

    tree.put(b"key", b"")?;
    assert_eq!(tree.get(b"key")?, Some(Vec::new()));
    Ok(())
}

#[test]
fn overwrite_keeps_latest_value() -> Result<()> {
    let dir = tempdir()?;
    let tree = Tree::new(Config::new(dir.path()))?;

    tree.put(b"k", b"v1")?;
    tree.put(b"k", b"v2")?;
    assert_eq!(tree.get(b"k")?, Some(b"v2".to_vec()));
    assert_eq!(tree.memtable_entries(), 1);
    Ok(())
}

#[test]
fn overwrite_adjusts_size_by_value_delta() -> Result<()> {
    let dir = tempdir()?;
    let tree = Tree::new(Config::new(dir.path()))?;

    tree.put(b"k", b"v1")?;
    let before = tree.memtable_size();
    tree.put(b"k", b"longer-value")?;
    assert_eq!(tree.memtable_size() - before, "longer-value".len() - "v1".len());
    Ok(())
}

// --------------------- Rotation ---------------------

#[test]
fn oversized_memtable_rotates_and_flushes() -> Result<()> {
    let dir = tempdir()?;
    let mut conf = Config::new(dir.path());
    conf.sst_size = 1024;
    let tree = Tree::new(conf)?;

    for i in 0..200u32 {
        tree.put(format!("key{:04}", i).as_bytes(), &[b'v'; 16])?;
    }

    // The rotated memtable reaches level 0 asynchronously.
    assert!(wait_for(
        || tree.level_node_count(0) >= 1,
        Duration::from_secs(5)
    ));
    assert!(count_sst_files(dir.path()) >= 1);

    // Every key remains readable across the rotation.
    for i in 0..200u32 {
        assert!(
            tree.get(format!("key{:04}", i).as_bytes())?.is_some(),
            "key{:04} lost",
            i
        );
    }
    Ok(())
}

#[test]
fn each_memtable_has_its_own_wal() -> Result<()> {
    let dir = tempdir()?;
    let mut conf = Config::new(dir.path());
    conf.sst_size = 1024;
    let tree = Tree::new(conf)?;

    assert_eq!(count_wal_files(dir.path()), 1);

    for i in 0..400u32 {
        tree.put(format!("key{:04}", i).as_bytes(), &[b'v'; 16])?;
    }

    // Flushed memtables delete their WALs; exactly the active one (plus
    // any still-unflushed rotations) remains.
    assert!(wait_for(
        || count_wal_files(dir.path()) == 1,
        Duration::from_secs(5)
    ));
    Ok(())
}

#[test]
fn wal_error_leaves_memtable_unchanged() -> Result<()> {
    let dir = tempdir()?;
    let tree = Tree::new(Config::new(dir.path()))?;
    tree.put(b"k", b"v")?;

    // An empty key fails validation before the WAL or memtable see it.
    let entries = tree.memtable_entries();
    assert!(tree.put(b"", b"x").is_err());
    assert_eq!(tree.memtable_entries(), entries);
    Ok(())
}
