use std::io::Write;
use std::sync::Arc;

use sourcefs_core::error::FsError;
use sourcefs_core::factory::{FactoryRef, SourceFactory};
use sourcefs_core::perms::PermissionSet;
use sourcefs_core::provider::{
    read_to_vec, AccessMode, AttrValue, CopyOption, SourceFileSystem,
};
use sourcefs_core::registry::Registry;
use sourcefs_core::source::{FileSource, SourceRef};

fn memory_fs() -> (Arc<Registry>, SourceFileSystem) {
    let registry = Registry::new();
    let factory: FactoryRef = Arc::new(registry.memory_factory());
    (registry, SourceFileSystem::new(factory))
}

fn write_all(file: &SourceRef, data: &[u8]) {
    let mut out = file.output_stream(false).unwrap();
    out.write_all(data).unwrap();
    out.close().unwrap();
}

fn create(fs: &SourceFileSystem, path: &str, data: &[u8]) {
    let file = fs.path(path).source().unwrap();
    write_all(&file, data);
}

#[test]
fn directory_streams_are_filtered_and_single_pass() {
    let (_registry, fs) = memory_fs();
    fs.path("/dir").source().unwrap().mkdirs().unwrap();
    for name in ["a.txt", "b.log", "c.txt", "d.log"] {
        create(&fs, &format!("/dir/{name}"), b"x");
    }

    let dir = fs.path("/dir");
    let mut stream = fs
        .directory_stream(
            &dir,
            Some(Box::new(|p| p.raw().ends_with(".log"))),
        )
        .unwrap();

    let names: Vec<String> = stream
        .by_ref()
        .map(|p| p.file_name().unwrap().raw().to_string())
        .collect();
    assert_eq!(names, vec!["b.log", "d.log"]);

    // Exhausted; the stream does not restart.
    assert!(stream.next().is_none());
}

#[test]
fn directory_stream_refuses_non_directories() {
    let (_registry, fs) = memory_fs();
    create(&fs, "/file.txt", b"x");

    match fs.directory_stream(&fs.path("/file.txt"), None) {
        Err(FsError::NotADirectory(_)) => {}
        other => panic!("expected NotADirectory, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn copy_refuses_an_existing_destination() {
    let (_registry, fs) = memory_fs();
    create(&fs, "/src.txt", b"source");
    create(&fs, "/dst.txt", b"already here");

    match fs.copy(&fs.path("/src.txt"), &fs.path("/dst.txt"), &[]) {
        Err(FsError::AlreadyExists(_)) => {}
        other => panic!("expected AlreadyExists, got {other:?}"),
    }
    // The destination is untouched.
    assert_eq!(
        read_to_vec(&fs.path("/dst.txt").source().unwrap()).unwrap(),
        b"already here"
    );
}

#[test]
fn copy_onto_itself_is_a_no_op() {
    let (_registry, fs) = memory_fs();
    create(&fs, "/same.txt", b"stable");

    fs.copy(&fs.path("/same.txt"), &fs.path("/same.txt"), &[])
        .unwrap();
    assert_eq!(
        read_to_vec(&fs.path("/same.txt").source().unwrap()).unwrap(),
        b"stable"
    );
}

#[test]
fn copy_refuses_a_link_destination() {
    let (registry, fs) = memory_fs();
    let factory = fs.factory().clone();
    let _ = registry;

    create(&fs, "/orig.txt", b"x");
    let slot = factory.create_file_source("/alias").unwrap();
    let orig = factory.create_file_source("/orig.txt").unwrap();
    factory.create_symbolic_link(slot, orig).unwrap();

    create(&fs, "/src.txt", b"y");
    match fs.copy(&fs.path("/src.txt"), &fs.path("/alias"), &[]) {
        Err(FsError::AlreadyExists(_)) => {}
        other => panic!("expected AlreadyExists, got {other:?}"),
    }
}

#[test]
fn copy_moves_bytes_and_optionally_attributes() {
    let (_registry, fs) = memory_fs();
    create(&fs, "/from.txt", b"payload");

    fs.copy(&fs.path("/from.txt"), &fs.path("/to.txt"), &[])
        .unwrap();
    assert_eq!(
        read_to_vec(&fs.path("/to.txt").source().unwrap()).unwrap(),
        b"payload"
    );

    let from = fs.path("/from.txt").source().unwrap();
    let stamp = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(86_400);
    from.set_modified(stamp).unwrap();

    fs.copy(
        &fs.path("/from.txt"),
        &fs.path("/stamped.txt"),
        &[CopyOption::CopyAttributes],
    )
    .unwrap();
    let copied = fs.path("/stamped.txt").source().unwrap();
    assert_eq!(copied.modified().unwrap(), stamp);
}

#[test]
fn copying_a_directory_creates_an_empty_directory() {
    let (_registry, fs) = memory_fs();
    fs.path("/tree").source().unwrap().mkdirs().unwrap();
    create(&fs, "/tree/leaf.txt", b"x");

    fs.copy(&fs.path("/tree"), &fs.path("/copy"), &[]).unwrap();
    let copy = fs.path("/copy").source().unwrap();
    assert!(copy.is_directory().unwrap());
    assert!(copy.list().unwrap().is_empty());
}

#[test]
fn move_uses_the_backend_rename() {
    let (_registry, fs) = memory_fs();
    create(&fs, "/old.txt", b"hi");

    fs.move_to(&fs.path("/old.txt"), &fs.path("/new.txt")).unwrap();
    assert!(!fs.path("/old.txt").source().unwrap().exists().unwrap());
    assert_eq!(
        read_to_vec(&fs.path("/new.txt").source().unwrap()).unwrap(),
        b"hi"
    );

    // Renaming onto an existing destination fails loudly.
    create(&fs, "/blocker.txt", b"z");
    assert!(fs
        .move_to(&fs.path("/new.txt"), &fs.path("/blocker.txt"))
        .is_err());
}

#[test]
fn delete_refuses_non_empty_directories() {
    let (_registry, fs) = memory_fs();
    fs.path("/full").source().unwrap().mkdirs().unwrap();
    create(&fs, "/full/kid.txt", b"x");

    match fs.delete(&fs.path("/full")) {
        Err(FsError::IsADirectory(_)) => {}
        other => panic!("expected IsADirectory, got {other:?}"),
    }

    fs.delete(&fs.path("/full/kid.txt")).unwrap();
    fs.delete(&fs.path("/full")).unwrap();
    assert!(!fs.path("/full").source().unwrap().exists().unwrap());

    match fs.delete(&fs.path("/full")) {
        Err(FsError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn create_directory_refuses_existing_paths() {
    let (_registry, fs) = memory_fs();
    fs.create_directory(&fs.path("/fresh")).unwrap();
    assert!(fs.path("/fresh").source().unwrap().is_directory().unwrap());

    match fs.create_directory(&fs.path("/fresh")) {
        Err(FsError::AlreadyExists(_)) => {}
        other => panic!("expected AlreadyExists, got {other:?}"),
    }
}

#[test]
fn attribute_views_requery_the_backend() {
    let (_registry, fs) = memory_fs();
    create(&fs, "/watched.txt", b"first");

    let view = fs.attribute_view(&fs.path("/watched.txt"), true).unwrap();
    assert_eq!(view.read().unwrap().size, 5);

    // No snapshot: a later read sees the new state.
    let file = fs.path("/watched.txt").source().unwrap();
    write_all(&file, b"first and second");
    assert_eq!(view.read().unwrap().size, 16);

    let attrs = view.read().unwrap();
    assert!(attrs.is_regular_file);
    assert!(!attrs.is_directory);
    assert!(!attrs.is_symbolic_link);
}

#[test]
fn attribute_view_applies_permission_sets() {
    let (_registry, fs) = memory_fs();
    create(&fs, "/bits.txt", b"x");

    let view = fs.attribute_view(&fs.path("/bits.txt"), true).unwrap();
    let perms = PermissionSet::from_symbolic("r-xr-x---").unwrap();
    view.set_permissions(&perms).unwrap();

    let read_back = view.read().unwrap().permissions;
    assert_eq!(read_back.symbolic(), "r-xr-x---");

    let perms = PermissionSet::from_symbolic("rw-r-xr--").unwrap();
    view.set_permissions(&perms).unwrap();
    assert_eq!(view.read().unwrap().permissions.symbolic(), "rw-r-xr--");
}

#[test]
fn bulk_attribute_reads_expand_wildcards() {
    let (_registry, fs) = memory_fs();
    create(&fs, "/attrs.txt", b"12345");

    let basic = fs.read_attributes(&fs.path("/attrs.txt"), "*").unwrap();
    assert!(basic.contains_key("size"));
    assert!(basic.contains_key("lastModifiedTime"));
    assert!(basic.contains_key("isDirectory"));
    // Ownership is posix-view only.
    assert!(!basic.contains_key("owner"));
    assert!(!basic.contains_key("permissions"));

    let posix = fs
        .read_attributes(&fs.path("/attrs.txt"), "posix:*")
        .unwrap();
    assert!(posix.contains_key("owner"));
    assert!(posix.contains_key("group"));
    assert!(posix.contains_key("permissions"));
    assert_eq!(posix.get("size"), Some(&AttrValue::Size(5)));

    let narrow = fs
        .read_attributes(&fs.path("/attrs.txt"), "posix:permissions,owner,size")
        .unwrap();
    assert_eq!(narrow.len(), 3);

    // Unknown names are skipped, not fatal.
    let odd = fs
        .read_attributes(&fs.path("/attrs.txt"), "size,flavor")
        .unwrap();
    assert_eq!(odd.len(), 1);
}

#[test]
fn check_access_matches_the_permission_bits() {
    let (_registry, fs) = memory_fs();
    create(&fs, "/guarded.txt", b"x");

    fs.check_access(&fs.path("/guarded.txt"), &[AccessMode::Read, AccessMode::Write])
        .unwrap();

    let file = fs.path("/guarded.txt").source().unwrap();
    file.set_writable(false, true).unwrap();
    match fs.check_access(&fs.path("/guarded.txt"), &[AccessMode::Write]) {
        Err(FsError::AccessDenied(_)) => {}
        other => panic!("expected AccessDenied, got {other:?}"),
    }

    match fs.check_access(&fs.path("/absent.txt"), &[AccessMode::Read]) {
        Err(FsError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn is_same_file_requires_same_backend_and_path() {
    let registry = Registry::new();
    let memory: FactoryRef = Arc::new(registry.memory_factory());
    let disk: FactoryRef = Arc::new(registry.disk_factory());
    let fs = SourceFileSystem::new(memory.clone());

    create(&fs, "/x.txt", b"x");
    assert!(fs
        .is_same_file(&fs.path("/x.txt"), &fs.path("/x.txt"))
        .unwrap());
    assert!(!fs
        .is_same_file(&fs.path("/x.txt"), &fs.path("/y.txt"))
        .unwrap());

    let disk_path = sourcefs_core::path::SourcePath::new("/x.txt", disk);
    assert!(!fs.is_same_file(&fs.path("/x.txt"), &disk_path).unwrap());
}

#[test]
fn file_store_reports_backend_identity() {
    let (_registry, fs) = memory_fs();
    let store = fs.file_store();
    assert_eq!(store.name(), "Memory");
    assert_eq!(store.store_type(), "memory");
    assert!(!store.is_read_only());
    assert!(matches!(store.total_space(), Err(FsError::Unsupported(_))));
}

#[test]
fn path_algebra_matches_segment_arithmetic() {
    let (_registry, fs) = memory_fs();
    let path = fs.path("/one/two/three");

    assert!(path.is_absolute());
    assert_eq!(path.root().unwrap().raw(), "/");
    assert_eq!(path.file_name().unwrap().raw(), "three");
    assert_eq!(path.parent().unwrap().raw(), "/one/two");
    assert_eq!(path.name_count(), 3);
    assert_eq!(path.name(0).unwrap().raw(), "one");
    assert_eq!(path.name(2).unwrap().raw(), "three");
    assert_eq!(path.subpath(0, 2).raw(), "/one/two");
    assert_eq!(path.subpath(1, 3).raw(), "two/three");

    assert!(path.starts_with(&fs.path("/one")));
    assert!(!path.starts_with(&fs.path("one")));
    assert!(path.ends_with(&fs.path("three")));

    let resolved = path.resolve(&fs.path("four")).unwrap();
    assert_eq!(resolved.raw(), "/one/two/three/four");
    let absolute = path.resolve(&fs.path("/elsewhere")).unwrap();
    assert_eq!(absolute.raw(), "/elsewhere");

    let relative = path.relativize(&fs.path("/one/two/three/c/d")).unwrap();
    assert_eq!(relative.raw(), "c/d");
    let empty = path.relativize(&fs.path("/one/two/three")).unwrap();
    assert_eq!(empty.raw(), "");
    assert!(path.relativize(&fs.path("rel/path")).is_err());

    let messy = fs.path("/one/./two/../two/three");
    assert_eq!(messy.normalize().raw(), "/one/two/three");
    assert_eq!(
        messy.compare(&path).unwrap(),
        std::cmp::Ordering::Equal
    );

    assert_eq!(
        path.to_uri(),
        "filesource:/one/two/three?sourcetype=memory"
    );
}
