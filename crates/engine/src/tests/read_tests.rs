use super::helpers::*;
use crate::{Config, Tree};
use anyhow::Result;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn empty_tree_returns_not_found() -> Result<()> {
    let dir = tempdir()?;
    let tree = Tree::new(Config::new(dir.path()))?;

    assert_eq!(tree.get(b"anything")?, None);
    Ok(())
}

#[test]
fn reads_hit_every_layer() -> Result<()> {
    let dir = tempdir()?;
    let mut conf = Config::new(dir.path());
    conf.sst_size = 512;
    let tree = Tree::new(conf)?;

    // Old generation: pushed through rotation into SSTables.
    for i in 0..100u32 {
        tree.put(format!("old{:04}", i).as_bytes(), b"disk")?;
    }
    assert!(wait_for(
        || tree.level_node_count(0) >= 1,
        Duration::from_secs(5)
    ));

    // New generation: still in the active memtable.
    tree.put(b"fresh", b"memory")?;

    assert_eq!(tree.get(b"fresh")?, Some(b"memory".to_vec()));
    assert_eq!(tree.get(b"old0042")?, Some(b"disk".to_vec()));
    assert_eq!(tree.get(b"old0099")?, Some(b"disk".to_vec()));
    assert_eq!(tree.get(b"absent")?, None);
    Ok(())
}

#[test]
fn overwrite_across_memtable_and_sst() -> Result<()> {
    let dir = tempdir()?;
    let mut conf = Config::new(dir.path());
    conf.sst_size = 2048;
    let tree = Tree::new(conf)?;

    // 100 distinct keys, then overwrite key 42.
    for i in 0..100u32 {
        tree.put(format!("key{:04}", i).as_bytes(), format!("v{}", i).as_bytes())?;
    }
    tree.put(b"key0042", b"overwritten")?;

    // Push enough new keys through to rotate the memtable (and with it
    // both versions of key 42) onto disk.
    for i in 100..400u32 {
        tree.put(format!("key{:04}", i).as_bytes(), &[b'x'; 16])?;
    }
    assert!(wait_for(
        || tree.level_node_count(0) >= 1,
        Duration::from_secs(5)
    ));

    assert_eq!(tree.get(b"key0042")?, Some(b"overwritten".to_vec()));
    Ok(())
}

#[test]
fn newest_write_wins_across_generations() -> Result<()> {
    let dir = tempdir()?;
    let mut conf = Config::new(dir.path());
    conf.sst_size = 512;
    let tree = Tree::new(conf)?;

    // Write three generations of the same key with flushes between them.
    for (round, value) in [b"gen0", b"gen1", b"gen2"].iter().enumerate() {
        tree.put(b"versioned", *value)?;
        for i in 0..60u32 {
            tree.put(format!("pad{}{:04}", round, i).as_bytes(), &[b'p'; 8])?;
        }
    }
    assert!(wait_for(
        || tree.level_node_count(0) >= 2,
        Duration::from_secs(5)
    ));

    assert_eq!(tree.get(b"versioned")?, Some(b"gen2".to_vec()));
    Ok(())
}

#[test]
fn binary_keys_and_values() -> Result<()> {
    let dir = tempdir()?;
    let tree = Tree::new(Config::new(dir.path()))?;

    let key = vec![0x00, 0xff, 0x80, 0x01];
    let value = vec![0xde, 0xad, 0xbe, 0xef, 0x00];
    tree.put(&key, &value)?;
    assert_eq!(tree.get(&key)?, Some(value));
    Ok(())
}
