use std::io::Write;

use sourcefs_core::factory::SourceFactory;
use sourcefs_core::provider::read_to_vec;
use sourcefs_core::registry::Registry;
use sourcefs_core::source::{FileSource, SourceRef};

fn write_all(file: &SourceRef, data: &[u8]) {
    let mut out = file.output_stream(false).unwrap();
    out.write_all(data).unwrap();
    out.close().unwrap();
}

#[test]
fn memory_hard_and_symbolic_links() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let target = factory.create_file_source("/F").unwrap();
    write_all(&target, b"abc");

    let hard_slot = factory.create_file_source("/H").unwrap();
    let hard = factory
        .create_hard_link(hard_slot, target.clone())
        .unwrap();

    let sym_slot = factory.create_file_source("/S").unwrap();
    let sym = factory
        .create_symbolic_link(sym_slot, target.clone())
        .unwrap();

    // A hard link is indistinguishable from the real file.
    assert!(hard.linked_to().unwrap().is_none());
    // A symbolic link reveals its target.
    let revealed = sym.linked_to().unwrap().expect("symlink target");
    assert_eq!(revealed.absolute_path(), target.absolute_path());
    // The target itself is not a link.
    assert!(target.linked_to().unwrap().is_none());

    // Identity comes from the link; content comes from the target.
    assert_eq!(hard.name(), "H");
    assert_eq!(sym.name(), "S");
    assert_eq!(hard.absolute_path(), "/H");
    assert_eq!(read_to_vec(&hard).unwrap(), b"abc");
    assert_eq!(read_to_vec(&sym).unwrap(), b"abc");
    assert_eq!(hard.length().unwrap(), 3);

    // Writing through the hard link is visible through the target.
    write_all(&hard, b"xyz");
    assert_eq!(read_to_vec(&target).unwrap(), b"xyz");
    assert_eq!(read_to_vec(&sym).unwrap(), b"xyz");
}

#[test]
fn memory_symlink_survives_fresh_lookup() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let target = factory.create_file_source("/data.txt").unwrap();
    write_all(&target, b"abc");
    let slot = factory.create_file_source("/alias").unwrap();
    factory.create_symbolic_link(slot, target.clone()).unwrap();

    // Resolve the link path again, without the wrapper in hand.
    let looked_up = factory.create_file_source("/alias").unwrap();
    let revealed = looked_up.linked_to().unwrap().expect("symlink target");
    assert_eq!(revealed.absolute_path(), "/data.txt");
}

#[test]
fn memory_link_metadata_tracks_the_target() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let target = factory.create_file_source("/tracked.txt").unwrap();
    write_all(&target, b"0123456789");
    let slot = factory.create_file_source("/mirror").unwrap();
    let link = factory.create_hard_link(slot, target.clone()).unwrap();

    assert!(link.exists().unwrap());
    assert!(link.is_file().unwrap());
    assert_eq!(link.length().unwrap(), 10);

    target.set_readable(false, true).unwrap();
    assert!(!link.can_read().unwrap());
    target.set_readable(true, true).unwrap();
    assert!(link.can_read().unwrap());
}

#[cfg(unix)]
#[test]
fn disk_links_use_the_native_filesystem() {
    let registry = Registry::new();
    let factory = registry.disk_factory();
    let temp = tempfile::tempdir().unwrap();
    let base = temp.path().to_string_lossy().into_owned();

    let target = factory.create_file_source(&format!("{base}/F")).unwrap();
    write_all(&target, b"abc");

    let hard_slot = factory.create_file_source(&format!("{base}/H")).unwrap();
    let hard = factory.create_hard_link(hard_slot, target.clone()).unwrap();

    let sym_slot = factory.create_file_source(&format!("{base}/S")).unwrap();
    let sym = factory
        .create_symbolic_link(sym_slot, target.clone())
        .unwrap();

    assert!(hard.linked_to().unwrap().is_none());
    let revealed = sym.linked_to().unwrap().expect("symlink target");
    assert_eq!(revealed.absolute_path(), target.absolute_path());

    write_all(&hard, b"xyz");
    assert_eq!(read_to_vec(&target).unwrap(), b"xyz");
    assert_eq!(read_to_vec(&sym).unwrap(), b"xyz");
}
