#![allow(missing_docs)]

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use formspool::{ItemState, SerializedItem, StorageItem, StorageItemError, StorageItemFactory};
use uuid::Uuid;

const THRESHOLD: u64 = 16;

#[test]
fn in_memory_item_round_trips_through_json() {
    let root = temp_root();
    let content = content_bytes(THRESHOLD as usize);
    let item = written_item(&root, &content);
    assert!(item.is_in_memory());

    let json = serde_json::to_string(&item).expect("serialize item");
    let restored: StorageItem = serde_json::from_str(&json).expect("deserialize item");

    assert!(restored.is_in_memory());
    assert_eq!(restored.size(), item.size());
    assert_eq!(
        restored.get_bytes().expect("restored content"),
        item.get_bytes().expect("original content")
    );
    assert_eq!(restored.field_name(), "textField");
    assert_eq!(restored.content_type(), "text/plain");
    assert!(restored.is_form_field());
    assert_eq!(restored.file_name(), Some("My File Name"));
    assert_eq!(restored.size_threshold(), THRESHOLD);
    assert_eq!(restored.spool_directory(), Some(root.as_path()));

    drop(restored);
    drop(item);
    cleanup(root);
}

#[test]
fn spooled_item_round_trips_after_spool_file_is_gone() {
    let root = temp_root();
    let content = content_bytes(THRESHOLD as usize * 3);
    let mut item = written_item(&root, &content);
    assert!(!item.is_in_memory());

    let snapshot = item.snapshot().expect("snapshot item");
    item.dispose();
    assert_eq!(spool_files(&root), 0);

    let restored = StorageItem::restore(snapshot).expect("restore item");
    assert!(restored.is_in_memory());
    assert_eq!(restored.size(), content.len() as u64);
    assert_eq!(restored.get_bytes().expect("restored content"), content);
    assert_eq!(spool_files(&root), 0);

    drop(restored);
    cleanup(root);
}

#[test]
fn snapshot_captures_absolute_directory_and_content() {
    let root = temp_root();
    let item = written_item(&root, b"abc");
    let snapshot = item.snapshot().expect("snapshot item");

    assert_eq!(snapshot.field_name, "textField");
    assert_eq!(snapshot.size_threshold, THRESHOLD);
    let directory = PathBuf::from(snapshot.spool_directory.as_deref().expect("directory"));
    assert!(directory.is_absolute());
    assert_eq!(snapshot.content.as_deref(), Some(&b"abc"[..]));

    let empty = factory(&root).create_item("empty", "", true, None);
    assert_eq!(empty.snapshot().expect("snapshot empty").content, None);

    drop(item);
    drop(empty);
    cleanup(root);
}

#[test]
fn restore_rejects_nul_character_before_filesystem_access() {
    let root = temp_root();
    let item = written_item(&root, &content_bytes(THRESHOLD as usize));
    let mut snapshot = item.snapshot().expect("snapshot item");
    snapshot.spool_directory = Some(format!("{}\0", root.display()));

    let err = StorageItem::restore(snapshot.clone()).expect_err("NUL must be rejected");
    assert!(matches!(err, StorageItemError::InvalidPath { .. }));

    let json = serde_json::to_string(&snapshot).expect("serialize snapshot");
    let err = serde_json::from_str::<StorageItem>(&json).expect_err("NUL must be rejected");
    assert!(err.to_string().contains("NUL"));

    drop(item);
    cleanup(root);
}

#[test]
fn restore_rejects_relative_and_traversal_directories() {
    let root = temp_root();
    let item = written_item(&root, b"abc");
    let snapshot = item.snapshot().expect("snapshot item");

    for directory in ["relative/uploads".to_owned(), format!("{}/../x", root.display())] {
        let mut hostile = snapshot.clone();
        hostile.spool_directory = Some(directory);
        assert!(StorageItem::restore(hostile)
            .expect_err("hostile path must be rejected")
            .is_invalid_path());
    }

    drop(item);
    cleanup(root);
}

#[test]
fn restore_rejects_regular_file_as_directory() {
    let root = temp_root();
    let file = root.join("file");
    std::fs::write(&file, b"not a directory").expect("create regular file");
    let item = written_item(&root, &content_bytes(THRESHOLD as usize));
    let mut snapshot = item.snapshot().expect("snapshot item");
    snapshot.spool_directory = Some(file.to_str().expect("utf-8 path").to_owned());

    let err = StorageItem::restore(snapshot).expect_err("file is not a directory");
    assert!(matches!(err, StorageItemError::Io(_)));

    drop(item);
    cleanup(root);
}

#[test]
fn restore_rejects_missing_directory() {
    let root = temp_root();
    let item = written_item(&root, b"abc");
    let mut snapshot = item.snapshot().expect("snapshot item");
    let missing = root.join("gone");
    snapshot.spool_directory = Some(missing.to_str().expect("utf-8 path").to_owned());

    let err = StorageItem::restore(snapshot).expect_err("missing directory");
    assert!(matches!(err, StorageItemError::Io(_)));
    assert!(!missing.exists());

    drop(item);
    cleanup(root);
}

#[test]
fn restored_item_can_spill_again_into_validated_directory() {
    let root = temp_root();
    let item = written_item(&root, b"0123456789");
    let mut restored = StorageItem::restore(item.snapshot().expect("snapshot item"))
        .expect("restore item");
    assert_eq!(restored.state(), ItemState::Writable);
    {
        let mut sink = restored.open_write_sink().expect("restored item is writable");
        sink.write_all(b"0123456789").expect("spilling write");
        sink.close().expect("close sink");
    }

    assert!(!restored.is_in_memory());
    let path = restored.spool_path().expect("spooled").to_path_buf();
    assert!(path.starts_with(&root));
    assert_eq!(
        restored.get_bytes().expect("content"),
        &b"01234567890123456789"[..]
    );

    restored.dispose();
    assert!(!path.exists());
    drop(item);
    cleanup(root);
}

#[test]
fn restore_enforces_max_item_size() {
    let serialized = SerializedItem {
        field_name: "upload".to_owned(),
        content_type: "application/octet-stream".to_owned(),
        is_form_field: false,
        file_name: None,
        size_threshold: 4,
        spool_directory: None,
        max_item_size: Some(4),
        content: Some(bytes::Bytes::from_static(b"too long")),
    };

    let err = StorageItem::restore(serialized).expect_err("content over limit");
    assert!(matches!(
        err,
        StorageItemError::ItemSizeLimitExceeded {
            max_item_size: 4,
            ..
        }
    ));
}

fn factory(root: &Path) -> StorageItemFactory {
    StorageItemFactory::builder()
        .size_threshold(THRESHOLD)
        .spool_directory(root)
        .build()
        .expect("builder config should validate")
}

fn written_item(root: &Path, content: &[u8]) -> StorageItem {
    let mut item = factory(root).create_item("textField", "text/plain", true, Some("My File Name"));
    {
        let mut sink = item.open_write_sink().expect("sink should open");
        sink.write_all(content).expect("write content");
        sink.close().expect("close sink");
    }
    item
}

fn content_bytes(size: usize) -> Vec<u8> {
    (0..size).map(|index| b'0' + (index % 10) as u8).collect()
}

fn spool_files(root: &Path) -> usize {
    std::fs::read_dir(root)
        .expect("read spool root")
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("upload_"))
        .count()
}

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("formspool-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&root).expect("create temp root");
    root
}

fn cleanup(path: PathBuf) {
    let _ = std::fs::remove_dir_all(path);
}
