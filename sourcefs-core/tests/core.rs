use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use sourcefs_core::error::FsError;
use sourcefs_core::factory::SourceFactory;
use sourcefs_core::provider::read_to_vec;
use sourcefs_core::registry::Registry;
use sourcefs_core::source::{FileSource, FileType, SourceRef};

fn write_all(file: &SourceRef, data: &[u8]) {
    let mut out = file.output_stream(false).unwrap();
    out.write_all(data).unwrap();
    out.close().unwrap();
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn memory_node_exists_only_after_type_is_set() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let file = factory.create_file_source("/dir/sub/file.txt").unwrap();
    assert!(!file.exists().unwrap());
    assert_eq!(file.file_type().unwrap(), FileType::Undefined);

    // Intermediate nodes were created lazily but are not real either.
    let dir = factory.create_file_source("/dir").unwrap();
    assert!(!dir.exists().unwrap());

    write_all(&file, b"hello");
    assert!(file.exists().unwrap());
    assert!(file.is_file().unwrap());
    assert_eq!(file.length().unwrap(), 5);

    // The parent chain is still lazy until mkdirs.
    assert!(!dir.exists().unwrap());
    assert!(dir.mkdirs().unwrap());
    assert!(dir.is_directory().unwrap());
}

#[test]
fn memory_roots_and_canonical_paths() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let roots = factory.list_roots().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].absolute_path(), "/");

    let file = factory.create_file_source("/a/./b/../c/file.txt").unwrap();
    assert_eq!(file.canonical_path().unwrap(), "/a/c/file.txt");
    assert_eq!(file.name(), "file.txt");
    assert_eq!(file.parent_path().unwrap(), "/a/c");
}

#[test]
fn memory_relative_paths_resolve_against_current_directory() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let dir = factory.create_file_source("/work/area").unwrap();
    dir.mkdirs().unwrap();
    factory.set_current_directory(dir).unwrap();

    let file = factory.create_file_source("notes.txt").unwrap();
    assert_eq!(file.canonical_path().unwrap(), "/work/area/notes.txt");

    let up = factory.create_file_source("../other.txt").unwrap();
    assert_eq!(up.canonical_path().unwrap(), "/work/other.txt");
}

#[test]
fn memory_rename_moves_identity() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let a = factory.create_file_source("/A").unwrap();
    write_all(&a, b"hi");

    let b = factory.create_file_source("/B").unwrap();
    assert!(a.rename_to(b.as_ref()).unwrap());

    // The old handle observes a nonexistent file; the new one has the
    // content.
    assert!(!a.exists().unwrap());
    assert!(b.exists().unwrap());
    assert_eq!(read_to_vec(&b).unwrap(), b"hi");
}

#[test]
fn memory_rename_refuses_existing_destination_and_root() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let a = factory.create_file_source("/A").unwrap();
    write_all(&a, b"a");
    let b = factory.create_file_source("/B").unwrap();
    write_all(&b, b"b");

    assert!(!a.rename_to(b.as_ref()).unwrap());

    let root = factory.create_file_source("/").unwrap();
    assert!(!root.rename_to(a.as_ref()).unwrap());
}

#[test]
fn memory_delete_unlinks_from_parent() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let dir = factory.create_file_source("/dir").unwrap();
    dir.mkdirs().unwrap();
    let file = factory.create_file_source("/dir/file.txt").unwrap();
    write_all(&file, b"x");

    assert_eq!(dir.list().unwrap().len(), 1);
    assert!(file.delete().unwrap());
    assert!(!file.exists().unwrap());
    assert!(dir.list().unwrap().is_empty());

    // Deleting a missing file reports false, not an error.
    assert!(!file.delete().unwrap());

    // The root never deletes.
    let root = factory.create_file_source("/").unwrap();
    assert!(!root.delete().unwrap());
}

#[test]
fn memory_append_publishes_on_close() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let file = factory.create_file_source("/log.txt").unwrap();
    write_all(&file, b"one");

    let mut out = file.output_stream(true).unwrap();
    out.write_all(b"two").unwrap();
    // Nothing published yet.
    assert_eq!(read_to_vec(&file).unwrap(), b"one");
    out.close().unwrap();
    assert_eq!(read_to_vec(&file).unwrap(), b"onetwo");
}

#[test]
fn memory_new_file_becomes_real_at_stream_acquisition() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let file = factory.create_file_source("/fresh.txt").unwrap();
    assert!(!file.exists().unwrap());
    let out = file.output_stream(true).unwrap();
    // Real before a single byte is written.
    assert!(file.is_file().unwrap());
    drop(out);
    assert_eq!(file.length().unwrap(), 0);
}

#[test]
fn memory_access_denied_is_distinct_from_not_found() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let file = factory.create_file_source("/secret.txt").unwrap();
    write_all(&file, b"top");
    file.set_readable(false, true).unwrap();

    match file.input_stream() {
        Err(FsError::AccessDenied(_)) => {}
        other => panic!("expected AccessDenied, got {:?}", other.err()),
    }

    let missing = factory.create_file_source("/nope/missing.txt").unwrap();
    // A missing file is simply empty data on this backend; reading the
    // directory named by a missing path must not claim access problems.
    assert!(missing.input_stream().is_ok());
}

#[test]
fn memory_read_only_refuses_writes() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let file = factory.create_file_source("/frozen.txt").unwrap();
    write_all(&file, b"x");
    assert!(file.set_read_only().unwrap());
    assert!(file.can_read().unwrap());
    assert!(!file.can_write().unwrap());

    match file.output_stream(false) {
        Err(FsError::AccessDenied(_)) => {}
        other => panic!("expected AccessDenied, got {:?}", other.err()),
    }
}

#[test]
fn memory_directory_streams_refuse() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let dir = factory.create_file_source("/dir").unwrap();
    dir.mkdirs().unwrap();

    match dir.input_stream() {
        Err(FsError::IsADirectory(_)) => {}
        other => panic!("expected IsADirectory, got {:?}", other.err()),
    }
    match dir.output_stream(false) {
        Err(FsError::IsADirectory(_)) => {}
        other => panic!("expected IsADirectory, got {:?}", other.err()),
    }
}

#[test]
fn memory_timestamps_are_settable() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let file = factory.create_file_source("/stamp.txt").unwrap();
    write_all(&file, b"x");

    let then = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
    assert!(file.set_modified(then).unwrap());
    assert!(file.set_accessed(then).unwrap());
    assert!(file.set_created(then).unwrap());
    assert_eq!(file.modified().unwrap(), then);
    assert_eq!(file.accessed().unwrap(), then);
    assert_eq!(file.created().unwrap(), then);
}

#[test]
fn cross_backend_containment_is_false_not_an_error() {
    let registry = Registry::new();
    let memory = registry.memory_factory();
    let disk = registry.disk_factory();

    let mem_file = memory.create_file_source("/a/b").unwrap();
    let disk_file = disk.create_file_source("/a").unwrap();

    assert!(!mem_file.is_child_of(disk_file.as_ref()));
    assert!(!disk_file.is_child_of(mem_file.as_ref()));

    let mem_parent = memory.create_file_source("/a").unwrap();
    assert!(mem_file.is_child_of(mem_parent.as_ref()));
}

#[test]
fn memory_versioning_is_reserved() {
    let registry = Registry::new();
    let factory = registry.memory_factory();
    let file = factory.create_file_source("/v.txt").unwrap();
    write_all(&file, b"x");

    assert!(!file.is_version_supported());
    assert_eq!(file.version().unwrap(), 0);
    assert_eq!(file.max_version().unwrap(), 0);
    assert!(!file.set_version(3, true).unwrap());
}

#[test]
fn disk_round_trip_in_tempdir() -> anyhow::Result<()> {
    init_tracing();
    let temp = tempfile::tempdir()?;
    let registry = Registry::new();
    let factory = registry.disk_factory();

    let base = temp.path().to_string_lossy().into_owned();
    let file = factory.create_file_source(&format!("{base}/data/out.txt"))?;
    assert!(!file.exists()?);

    let dir = factory.create_file_source(&format!("{base}/data"))?;
    assert!(dir.mkdirs()?);
    write_all(&file, b"payload");

    assert!(file.is_file()?);
    assert_eq!(file.length()?, 7);
    assert_eq!(read_to_vec(&file)?, b"payload");
    assert_eq!(file.name(), "out.txt");

    let children = dir.list()?;
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name(), "out.txt");

    assert!(file.delete()?);
    assert!(!file.exists()?);
    assert!(!file.delete()?);
    Ok(())
}

#[test]
fn disk_create_new_file_is_atomic_about_existence() {
    let temp = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    let factory = registry.disk_factory();

    let path = format!("{}/one.txt", temp.path().to_string_lossy());
    let file = factory.create_file_source(&path).unwrap();
    assert!(file.create_new_file().unwrap());
    assert!(!file.create_new_file().unwrap());
}

#[test]
fn disk_relative_paths_resolve_against_current_directory() -> anyhow::Result<()> {
    init_tracing();
    let temp = tempfile::tempdir()?;
    let registry = Registry::new();
    let factory = registry.disk_factory();

    let dir = factory.create_file_source(&temp.path().to_string_lossy())?;
    factory.set_current_directory(dir)?;

    let file = factory.create_file_source("rel.txt")?;
    write_all(&file, b"r");
    assert!(temp.path().join("rel.txt").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn disk_permissions_round_trip() {
    let temp = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    let factory = registry.disk_factory();

    let path = format!("{}/perm.txt", temp.path().to_string_lossy());
    let file = factory.create_file_source(&path).unwrap();
    write_all(&file, b"x");

    assert!(file.set_readable(true, false).unwrap());
    assert!(file.set_writable(false, false).unwrap());
    assert!(file.can_owner_read().unwrap());
    assert!(!file.can_owner_write().unwrap());
    assert!(!file.can_group_write().unwrap());
    assert!(!file.can_other_write().unwrap());

    // Restore owner write so the tempdir can clean up.
    assert!(file.set_owner_writable(true).unwrap());
    assert!(file.can_owner_write().unwrap());
}

#[test]
fn connect_properties_never_echo_passwords() {
    let registry = Registry::new();
    let factory = registry.memory_factory();

    let mut props = factory.connect_properties();
    props.set("password", "hunter2");
    factory.set_connect_properties(props.clone());

    let shown = format!("{props:?}");
    assert!(!shown.contains("hunter2"));
    assert!(!props.session_key_fragment().contains("hunter2"));
}

#[test]
fn registry_open_resolves_urls() {
    let registry = Registry::new();

    let file = registry.open("filesource:/spool/a.txt?sourcetype=memory").unwrap();
    assert_eq!(file.factory().type_id(), "memory");
    assert_eq!(file.absolute_path(), "/spool/a.txt");

    assert!(registry.open("filesource:/x?sourcetype=bogus").is_err());
}

#[test]
fn memory_disconnect_resets_the_tree() {
    let registry = Registry::new();
    let factory = registry.memory_factory();
    factory.connect().unwrap();

    let file = factory.create_file_source("/keep.txt").unwrap();
    write_all(&file, b"data");
    assert!(file.exists().unwrap());

    factory.disconnect().unwrap();
    assert!(!factory.is_connected());
    let after = factory.create_file_source("/keep.txt").unwrap();
    assert!(!after.exists().unwrap());
}

#[test]
fn head_and_tail_slice_the_data() {
    let registry = Registry::new();
    let factory = registry.memory_factory();
    let file = factory.create_file_source("/ht.txt").unwrap();
    write_all(&file, b"0123456789");

    assert_eq!(file.head(4).unwrap(), b"0123");
    assert_eq!(file.tail(3).unwrap(), b"789");
    assert_eq!(file.head(100).unwrap(), b"0123456789");
    assert_eq!(file.tail(100).unwrap(), b"0123456789");
}

#[test]
fn content_type_comes_from_the_extension() {
    let registry = Registry::new();
    let factory = registry.memory_factory();
    let file = factory.create_file_source("/page.html").unwrap();
    assert_eq!(file.content_type(), Some("text/html"));

    let raw = factory.create_file_source("/blob.bin").unwrap();
    assert_eq!(raw.content_type(), None);
}

#[test]
fn to_uri_names_backend_and_session() {
    let registry = Registry::new();
    let factory = registry.memory_factory();
    factory.connect().unwrap();
    let id = factory.session_id().unwrap();

    let file = factory.create_file_source("/u.txt").unwrap();
    let uri = file.to_uri();
    assert!(uri.starts_with("filesource:/u.txt?sourcetype=memory"));
    assert!(uri.ends_with(&format!("sessionId={id}")));
}

#[test]
fn filters_narrow_listings() {
    let registry = Registry::new();
    let factory = registry.memory_factory();
    let dir = factory.create_file_source("/d").unwrap();
    dir.mkdirs().unwrap();
    for name in ["a.txt", "b.log", "c.txt"] {
        let file = factory.create_file_source(&format!("/d/{name}")).unwrap();
        write_all(&file, b"x");
    }

    let txt_only = dir
        .list_filtered(&|f: &dyn FileSource| f.name().ends_with(".txt"))
        .unwrap();
    let names: Vec<String> = txt_only.iter().map(|f| f.name()).collect();
    assert_eq!(names, vec!["a.txt", "c.txt"]);
}

#[test]
fn owner_and_group_are_recorded_on_memory_nodes() {
    use sourcefs_core::principal::{Group, User};

    let registry = Registry::new();
    let factory = registry.memory_factory();
    let file = factory.create_file_source("/owned.txt").unwrap();
    write_all(&file, b"x");

    let user = User::with_group(1000, "alice", Group::new(100, "staff"));
    assert!(file.set_owner(&user).unwrap());
    assert!(file.set_group(user.group()).unwrap());
    assert_eq!(file.owner().unwrap().name(), "alice");
    assert_eq!(file.group().unwrap().name(), "staff");
}

#[test]
fn serializable_surface_round_trips_through_json() -> anyhow::Result<()> {
    use sourcefs_core::factory::ConnectProperties;
    use sourcefs_core::perms::acl::AclConfig;
    use sourcefs_core::perms::PermissionSet;

    let mut props = ConnectProperties::new();
    props.set("host", "example.com");
    props.set("name", "box");
    let json = serde_json::to_string(&props)?;
    let back: ConnectProperties = serde_json::from_str(&json)?;
    assert_eq!(back.get("host"), Some("example.com"));

    let perms = PermissionSet::from_symbolic("rwxr-x---")?;
    let back: PermissionSet = serde_json::from_str(&serde_json::to_string(&perms)?)?;
    assert_eq!(back, perms);

    let config = AclConfig::default();
    let back: AclConfig = serde_json::from_str(&serde_json::to_string(&config)?)?;
    assert_eq!(back.group_name, "Users");
    assert_eq!(back.other_name, "Other");
    Ok(())
}

#[test]
fn source_refs_are_shareable_across_threads() {
    let registry = Registry::new();
    let factory = registry.memory_factory();
    let file: SourceRef = factory.create_file_source("/shared.txt").unwrap();
    write_all(&file, b"x");

    let clone = Arc::clone(&file);
    let handle = std::thread::spawn(move || clone.length().unwrap());
    assert_eq!(handle.join().unwrap(), 1);
}
