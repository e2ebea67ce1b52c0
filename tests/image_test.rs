use std::path::{Path, PathBuf};

use flatfs::{FileSystemError, FilesystemImage, InodeAttributes, RegionLayout};
use tempfile::{tempdir, TempDir};

fn write_source(dir: &TempDir, name: &str, len: usize) -> PathBuf {
    let path = dir.path().join(name);
    let content: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
    std::fs::write(&path, content).unwrap();
    path
}

fn small_image(dir: &TempDir) -> FilesystemImage {
    // 58 个数据块，59,392 字节可用
    let mut image = FilesystemImage::with_layout(RegionLayout::new(72, 4));
    image.create_image(dir.path().join("small.img")).unwrap();
    image
}

#[test]
fn standard_image_insert_scenario() {
    let dir = tempdir().unwrap();
    let mut image = FilesystemImage::new();
    image.create_image(dir.path().join("disk.img")).unwrap();
    assert_eq!(image.layout().first_data_block(), 790);

    let before = image.free_space().unwrap();
    assert_eq!(before, 64_746 * 1024);

    let source = write_source(&dir, "report.bin", 2500);
    image.insert_file(&source).unwrap();

    let info = image.file_info("report.bin").unwrap();
    assert_eq!(info.size, 2500);
    assert_eq!(info.blocks, vec![790, 791, 792]);
    assert_eq!(image.free_space().unwrap(), before - 3072);
}

#[test]
fn insert_larger_than_free_space_changes_nothing() {
    let dir = tempdir().unwrap();
    let mut image = small_image(&dir);
    let free = image.free_space().unwrap();
    assert!(free < 60_000);

    let big = write_source(&dir, "big.bin", 70_000);
    let store_before = image.block_store().unwrap().clone();

    let err = image.insert_file(&big).unwrap_err();
    assert!(matches!(
        err,
        FileSystemError::InsufficientSpace { needed: 70_000, .. }
    ));
    assert_eq!(image.free_space().unwrap(), free);
    assert!(image.list_files().unwrap().is_empty());
    assert_eq!(image.block_store().unwrap(), &store_before);
}

#[test]
fn free_space_drops_by_whole_blocks() {
    let dir = tempdir().unwrap();
    let mut image = small_image(&dir);

    for (name, len) in [("a", 1), ("b", 1024), ("c", 1025), ("d", 0)] {
        let before = image.free_space().unwrap();
        image.insert_file(write_source(&dir, name, len)).unwrap();
        let expected = (len as u64).div_ceil(1024) * 1024;
        assert_eq!(before - image.free_space().unwrap(), expected, "file {}", name);
    }
}

#[test]
fn listing_follows_insert_order() {
    let dir = tempdir().unwrap();
    let mut image = small_image(&dir);
    assert!(image.list_files().unwrap().is_empty());

    image.insert_file(write_source(&dir, "a.txt", 10)).unwrap();
    image.insert_file(write_source(&dir, "b.txt", 10)).unwrap();

    let names: Vec<&str> = image.list_files().unwrap().collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
}

#[test]
fn two_files_never_share_blocks() {
    let dir = tempdir().unwrap();
    let mut image = small_image(&dir);
    image.insert_file(write_source(&dir, "one", 5000)).unwrap();
    image.insert_file(write_source(&dir, "two", 3000)).unwrap();

    let one = image.file_info("one").unwrap().blocks;
    let two = image.file_info("two").unwrap().blocks;
    assert_eq!(one.len(), 5);
    assert_eq!(two.len(), 3);
    assert!(one.iter().all(|b| !two.contains(b)));
}

#[test]
fn directory_fills_up() {
    let dir = tempdir().unwrap();
    let mut image = small_image(&dir);
    for i in 0..4 {
        image
            .insert_file(write_source(&dir, &format!("f{}", i), 10))
            .unwrap();
    }
    let err = image
        .insert_file(write_source(&dir, "extra", 10))
        .unwrap_err();
    assert!(matches!(err, FileSystemError::DirectoryExhausted));
    assert_eq!(image.list_files().unwrap().len(), 4);
}

#[test]
fn oversized_and_missing_sources_are_rejected() {
    let dir = tempdir().unwrap();
    let mut image = FilesystemImage::new();
    image.create_image(dir.path().join("disk.img")).unwrap();

    let huge = write_source(&dir, "huge", 1024 * 1024 + 1);
    assert!(matches!(
        image.insert_file(&huge),
        Err(FileSystemError::FileTooLarge { .. })
    ));
    assert!(matches!(
        image.insert_file(dir.path().join("missing")),
        Err(FileSystemError::SourceNotFound(_))
    ));
    assert!(image.list_files().unwrap().is_empty());
}

#[test]
fn save_then_load_reproduces_every_byte() {
    let dir = tempdir().unwrap();
    let image_path = dir.path().join("disk.img");
    let mut image = FilesystemImage::new();
    image.create_image(&image_path).unwrap();
    image.insert_file(write_source(&dir, "a.txt", 2500)).unwrap();
    image.insert_file(write_source(&dir, "b.txt", 9000)).unwrap();
    image
        .set_attribute("b.txt", InodeAttributes::HIDDEN, true)
        .unwrap();
    assert!(image.has_unsaved_changes());
    image.save_image().unwrap();
    assert!(!image.has_unsaved_changes());

    let saved = std::fs::read(&image_path).unwrap();
    assert_eq!(saved.len() as u64, image.layout().image_bytes());
    assert_eq!(saved.as_slice(), image.block_store().unwrap().as_bytes());

    let mut reopened = FilesystemImage::new();
    reopened.load_image(&image_path).unwrap();
    assert_eq!(
        reopened.block_store().unwrap(),
        image.block_store().unwrap()
    );
    assert_eq!(
        reopened.list_files().unwrap().collect::<Vec<_>>(),
        vec!["a.txt", "b.txt"]
    );
    assert!(reopened
        .file_info("b.txt")
        .unwrap()
        .attributes
        .contains(InodeAttributes::HIDDEN));
    assert_eq!(reopened.free_space().unwrap(), image.free_space().unwrap());
}

#[test]
fn retrieve_copies_content_back_out() {
    let dir = tempdir().unwrap();
    let mut image = small_image(&dir);
    let source = write_source(&dir, "data.bin", 3333);
    image.insert_file(&source).unwrap();

    let out = dir.path().join("out.bin");
    assert_eq!(image.retrieve_file("data.bin", &out).unwrap(), 3333);
    assert_eq!(std::fs::read(&out).unwrap(), std::fs::read(&source).unwrap());
    assert!(matches!(
        image.read_file("nope"),
        Err(FileSystemError::NotFound(_))
    ));
}

#[test]
fn load_of_missing_image_fails_and_keeps_current_one() {
    let dir = tempdir().unwrap();
    let mut image = small_image(&dir);
    image.insert_file(write_source(&dir, "a.txt", 10)).unwrap();

    let missing = dir.path().join("missing.img");
    assert!(matches!(
        image.load_image(&missing),
        Err(FileSystemError::ImageNotFound(_))
    ));
    assert!(!Path::new(&missing).exists());
    assert!(image.is_open());
    assert_eq!(image.list_files().unwrap().collect::<Vec<_>>(), vec!["a.txt"]);
}

#[test]
fn close_does_not_save() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("small.img");
    let mut image = small_image(&dir);
    image.insert_file(write_source(&dir, "a.txt", 10)).unwrap();
    image.close_image().unwrap();
    assert!(matches!(image.free_space(), Err(FileSystemError::ImageNotOpen)));

    image.load_image(&path).unwrap();
    assert!(image.list_files().unwrap().is_empty());
}

#[test]
fn create_truncates_existing_image() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("small.img");
    let mut image = small_image(&dir);
    image.insert_file(write_source(&dir, "a.txt", 10)).unwrap();
    image.save_image().unwrap();

    image.create_image(&path).unwrap();
    assert!(image.list_files().unwrap().is_empty());

    let mut reopened = FilesystemImage::with_layout(RegionLayout::new(72, 4));
    reopened.load_image(&path).unwrap();
    assert!(reopened.list_files().unwrap().is_empty());
    assert_eq!(reopened.free_space().unwrap(), 58 * 1024);
}

#[test]
fn image_with_wrong_geometry_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("small.img");
    small_image(&dir).save_image().unwrap();

    let mut image = FilesystemImage::new();
    assert!(matches!(
        image.load_image(&path),
        Err(FileSystemError::Corrupted(_))
    ));
    assert!(!image.is_open());
}
