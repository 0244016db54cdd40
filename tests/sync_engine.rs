use bucketsync_lib::core::{fingerprint_file, ScanEntry, SyncConfig, SyncEngine, SyncState};
use bucketsync_lib::storage::memory::InjectedFailure;
use bucketsync_lib::storage::{Metadata, MemoryStore, ObjectStore, FINGERPRINT_KEY};
use bucketsync_lib::{StoreError, SyncError};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const BUCKET: &str = "test-bucket";

/// 创建 `111.txt`、`222.txt` ... 这样的文件，内容相同
fn create_files(root: &Path, count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| {
            let name = format!("{i}{i}{i}.txt");
            fs::write(root.join(&name), "XXXXXXXXXXX").unwrap();
            name
        })
        .collect()
}

fn engine_for(store: &MemoryStore) -> SyncEngine {
    SyncEngine::new(Arc::new(store.clone()))
}

fn states(entries: &[ScanEntry]) -> BTreeMap<String, SyncState> {
    entries
        .iter()
        .map(|e| (e.path.clone(), e.state))
        .collect()
}

async fn upload_with_fingerprint(store: &MemoryStore, root: &Path, key: &str) {
    let path = root.join(key);
    let mut metadata = Metadata::new();
    metadata.insert(
        FINGERPRINT_KEY.to_string(),
        fingerprint_file(&path).unwrap().to_string(),
    );
    store.put_object(key, &path, metadata).await.unwrap();
}

#[tokio::test]
async fn test_scan_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    let engine = engine_for(&store);

    let files = create_files(dir.path(), 10);
    let mut uploaded = Vec::new();

    for (i, name) in files.iter().enumerate() {
        // 隔一个上传一个
        if i % 2 == 0 {
            upload_with_fingerprint(&store, dir.path(), name).await;
            uploaded.push(name.clone());
        }
        // 修改已上传的 777.txt
        if i == 6 {
            fs::write(dir.path().join(name), "yyyyyyyyyyyy").unwrap();
        }
    }

    assert_eq!(store.list_objects().await.unwrap().len(), 5);

    let entries = engine.scan(dir.path()).await.unwrap();
    assert_eq!(entries.len(), 10);

    for entry in &entries {
        assert_eq!(entry.kind.to_string(), "FILE");
        if entry.path == "777.txt" {
            assert_eq!(entry.state, SyncState::NotSynced);
        } else if uploaded.contains(&entry.path) {
            assert_eq!(entry.state, SyncState::Synced);
        } else {
            assert_eq!(entry.state, SyncState::NotUploaded);
        }
    }

    let synced = entries
        .iter()
        .filter(|e| e.state == SyncState::Synced)
        .count();
    assert_eq!(synced, 4);
}

#[tokio::test]
async fn test_sync_uploads_everything_into_empty_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    let engine = engine_for(&store);
    create_files(dir.path(), 10);

    let before = engine.scan(dir.path()).await.unwrap();
    assert_eq!(before.len(), 10);
    assert!(before.iter().all(|e| e.state == SyncState::NotUploaded));

    let report = engine.sync(dir.path(), false).await.unwrap();
    assert_eq!(report.files_scanned, 10);
    assert_eq!(report.files_uploaded, 10);
    assert_eq!(report.bytes_uploaded, 10 * 11);
    assert!(report
        .entries
        .iter()
        .all(|e| e.state == SyncState::Uploaded));

    let after = engine.scan(dir.path()).await.unwrap();
    assert_eq!(after.len(), 10);
    assert!(after.iter().all(|e| e.state == SyncState::Synced));
}

#[tokio::test]
async fn test_uploaded_metadata_records_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    fs::create_dir_all(dir.path().join("docs/2024")).unwrap();
    fs::write(dir.path().join("docs/2024/report.txt"), "quarterly numbers").unwrap();

    engine_for(&store).sync(dir.path(), false).await.unwrap();

    let objects = store.snapshot();
    let object = objects.get("docs/2024/report.txt").expect("key is the relative path");
    let expected = fingerprint_file(&dir.path().join("docs/2024/report.txt")).unwrap();
    assert_eq!(
        object.metadata.get(FINGERPRINT_KEY).map(String::as_str),
        Some(expected.as_str())
    );
    assert_eq!(object.data, b"quarterly numbers");
}

#[tokio::test]
async fn test_second_sync_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    let engine = engine_for(&store);
    create_files(dir.path(), 6);

    engine.sync(dir.path(), false).await.unwrap();
    let puts_after_first = store.put_count();
    assert_eq!(puts_after_first, 6);

    let report = engine.sync(dir.path(), false).await.unwrap();
    assert_eq!(store.put_count(), puts_after_first);
    assert_eq!(report.files_uploaded, 0);
    assert_eq!(report.files_skipped, 6);
    assert!(report.entries.iter().all(|e| e.state == SyncState::Synced));
}

#[tokio::test]
async fn test_dry_run_leaves_bucket_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    let engine = engine_for(&store);
    let files = create_files(dir.path(), 4);

    upload_with_fingerprint(&store, dir.path(), &files[0]).await;
    upload_with_fingerprint(&store, dir.path(), &files[1]).await;
    fs::write(dir.path().join(&files[1]), "changed").unwrap();
    let puts_before = store.put_count();

    let objects_before: BTreeMap<_, _> = store
        .snapshot()
        .into_iter()
        .map(|(k, v)| (k, (v.data, v.metadata)))
        .collect();
    let scan_before = states(&engine.scan(dir.path()).await.unwrap());

    let report = engine.sync(dir.path(), true).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.files_uploaded, 0);
    assert_eq!(report.files_pending, 3);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(states(&report.entries), scan_before);

    let objects_after: BTreeMap<_, _> = store
        .snapshot()
        .into_iter()
        .map(|(k, v)| (k, (v.data, v.metadata)))
        .collect();
    assert_eq!(objects_before, objects_after);
    assert_eq!(store.put_count(), puts_before);

    let scan_after = states(&engine.scan(dir.path()).await.unwrap());
    assert_eq!(scan_before, scan_after);
    assert_eq!(scan_after[&files[0]], SyncState::Synced);
    assert_eq!(scan_after[&files[1]], SyncState::NotSynced);
    assert_eq!(scan_after[&files[2]], SyncState::NotUploaded);
}

#[tokio::test]
async fn test_modified_file_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    let engine = engine_for(&store);
    let files = create_files(dir.path(), 5);

    engine.sync(dir.path(), false).await.unwrap();
    fs::write(dir.path().join(&files[2]), "edited in place").unwrap();

    let scan = states(&engine.scan(dir.path()).await.unwrap());
    for name in &files {
        let expected = if name == &files[2] {
            SyncState::NotSynced
        } else {
            SyncState::Synced
        };
        assert_eq!(scan[name], expected, "{name}");
    }

    let report = engine.sync(dir.path(), false).await.unwrap();
    assert_eq!(report.files_uploaded, 1);
    assert!(engine
        .scan(dir.path())
        .await
        .unwrap()
        .iter()
        .all(|e| e.state == SyncState::Synced));
}

#[tokio::test]
async fn test_object_without_fingerprint_is_not_synced() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    let engine = engine_for(&store);
    fs::write(dir.path().join("legacy.bin"), "XXXXXXXXXXX").unwrap();

    // 内容一致但没有指纹元数据
    store.insert("legacy.bin", b"XXXXXXXXXXX".to_vec(), Metadata::new());

    let scan = engine.scan(dir.path()).await.unwrap();
    assert_eq!(scan[0].state, SyncState::NotSynced);

    engine.sync(dir.path(), false).await.unwrap();
    let scan = engine.scan(dir.path()).await.unwrap();
    assert_eq!(scan[0].state, SyncState::Synced);
}

#[tokio::test]
async fn test_every_file_reported_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    let engine = engine_for(&store);

    let mut expected = HashSet::new();
    for rel in ["a.txt", "b/c.txt", "b/d/e.txt", "b/d/f.txt", "g/h.txt"] {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, rel).unwrap();
        expected.insert(rel.to_string());
    }
    fs::create_dir_all(dir.path().join("empty/dir")).unwrap();
    upload_with_fingerprint(&store, dir.path(), "b/c.txt").await;

    let entries = engine.scan(dir.path()).await.unwrap();
    let seen: HashSet<String> = entries.iter().map(|e| e.path.clone()).collect();
    assert_eq!(entries.len(), expected.len());
    assert_eq!(seen, expected);
    assert!(entries.iter().all(|e| matches!(
        e.state,
        SyncState::NotUploaded | SyncState::Synced | SyncState::NotSynced
    )));
}

#[tokio::test]
async fn test_store_failure_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    let engine = engine_for(&store);
    for name in ["a.txt", "b.txt", "c.txt", "d.txt"] {
        fs::write(dir.path().join(name), name).unwrap();
    }
    store.inject_failure("c.txt", InjectedFailure::PermissionDenied, None);

    let err = engine.sync(dir.path(), false).await.unwrap_err();
    assert!(matches!(err, SyncError::Store(StoreError::PermissionDenied(_))));

    // 失败之前的文件已上传，之后的文件没有处理
    let keys = store.list_objects().await.unwrap();
    assert_eq!(keys, vec!["a.txt".to_string(), "b.txt".to_string()]);

    // 扫描同样不会把失败当成 "未上传"
    assert!(engine.scan(dir.path()).await.is_err());
}

#[tokio::test]
async fn test_transient_failures_are_not_retried_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    store.inject_failure("a.txt", InjectedFailure::Transient, Some(1));

    let err = engine_for(&store).sync(dir.path(), false).await.unwrap_err();
    assert!(matches!(err, SyncError::Store(StoreError::Transient(_))));
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_transient_failures_are_retried_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    fs::write(dir.path().join("b.txt"), "b").unwrap();
    store.inject_failure("b.txt", InjectedFailure::Transient, Some(2));

    let engine = SyncEngine::with_config(
        Arc::new(store.clone()),
        SyncConfig {
            max_retries: 3,
            retry_base_delay_ms: 1,
            ..Default::default()
        },
    );

    let report = engine.sync(dir.path(), false).await.unwrap();
    assert_eq!(report.files_uploaded, 2);
}

#[tokio::test]
async fn test_permission_errors_are_never_retried() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    store.inject_failure("a.txt", InjectedFailure::PermissionDenied, Some(1));

    let engine = SyncEngine::with_config(
        Arc::new(store.clone()),
        SyncConfig {
            max_retries: 5,
            retry_base_delay_ms: 1,
            ..Default::default()
        },
    );

    assert!(engine.sync(dir.path(), false).await.is_err());
}

#[tokio::test]
async fn test_set_bucket_rebinds_the_client() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new("first");
    store.create_bucket("second");
    create_files(dir.path(), 3);

    let mut engine = engine_for(&store);
    engine.sync(dir.path(), false).await.unwrap();

    engine.set_bucket("second").unwrap();
    assert_eq!(engine.bucket(), "second");
    let scan = engine.scan(dir.path()).await.unwrap();
    assert!(scan.iter().all(|e| e.state == SyncState::NotUploaded));

    engine.sync(dir.path(), false).await.unwrap();
    assert_eq!(store.bind("second").list_objects().await.unwrap().len(), 3);
    assert_eq!(store.bind("first").list_objects().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_missing_bucket_is_an_operational_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new("first");
    create_files(dir.path(), 1);

    let mut engine = engine_for(&store);
    engine.set_bucket("does-not-exist").unwrap();

    let err = engine.scan(dir.path()).await.unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));
}

#[tokio::test]
async fn test_empty_bucket_name_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    create_files(dir.path(), 1);
    let engine = engine_for(&MemoryStore::new(""));

    assert!(matches!(
        engine.scan(dir.path()).await,
        Err(SyncError::Config(_))
    ));
    assert!(matches!(
        engine.sync(dir.path(), true).await,
        Err(SyncError::Config(_))
    ));
}

#[tokio::test]
async fn test_missing_root_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    let missing: PathBuf = dir.path().join("not-there");

    let err = engine_for(&store).sync(&missing, false).await.unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_download_object_creates_parent_dirs() {
    let src = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    fs::create_dir_all(src.path().join("nested")).unwrap();
    fs::write(src.path().join("nested/file.txt"), "payload").unwrap();

    engine_for(&store).sync(src.path(), false).await.unwrap();

    let target = dest.path().join("a/b/file.txt");
    store.download_object("nested/file.txt", &target).await.unwrap();
    assert_eq!(fs::read_to_string(target).unwrap(), "payload");

    let err = store
        .download_object("nested/missing.txt", &dest.path().join("x"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_file_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(dir.path().join(name), name).unwrap();
    }
    let locked = dir.path().join("b.txt");
    set_mode(&locked, 0o000);
    if fs::read(&locked).is_ok() {
        // root 不受权限位限制
        set_mode(&locked, 0o644);
        return;
    }

    let result = engine_for(&store).sync(dir.path(), false).await;
    set_mode(&locked, 0o644);

    assert!(matches!(result, Err(SyncError::Io { .. })));
    assert_eq!(store.put_count(), 1);
    assert_eq!(store.list_objects().await.unwrap(), vec!["a.txt".to_string()]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_directory_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(BUCKET);
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    fs::create_dir(dir.path().join("m")).unwrap();
    fs::write(dir.path().join("m/inner.txt"), "inner").unwrap();
    fs::write(dir.path().join("z.txt"), "z").unwrap();

    let locked = dir.path().join("m");
    set_mode(&locked, 0o000);
    if fs::read_dir(&locked).is_ok() {
        set_mode(&locked, 0o755);
        return;
    }

    let result = engine_for(&store).sync(dir.path(), false).await;
    set_mode(&locked, 0o755);

    assert!(matches!(result, Err(SyncError::Io { .. })));
    assert_eq!(store.list_objects().await.unwrap(), vec!["a.txt".to_string()]);
}
