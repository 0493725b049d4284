use chrono::{Duration as ChronoDuration, Utc};
use duscope_cache::{CacheConfig, NavigationCache, Navigator, ScanCache, Source};
use duscope_scan::{CancellationToken, FileTree, TreeScanner};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// `root/top.bin` (100), `root/music/a.mp3` (40), `root/music/rock/b.mp3`
/// (60), `root/empty/`.
fn sample_fs(root: &Path) {
    fs::write(root.join("top.bin"), vec![0u8; 100]).unwrap();
    fs::create_dir_all(root.join("music/rock")).unwrap();
    fs::write(root.join("music/a.mp3"), vec![0u8; 40]).unwrap();
    fs::write(root.join("music/rock/b.mp3"), vec![0u8; 60]).unwrap();
    fs::create_dir(root.join("empty")).unwrap();
}

fn scan(path: &Path) -> FileTree {
    TreeScanner::default().scan(path, &CancellationToken::new())
}

fn open(dir: &Path) -> ScanCache {
    ScanCache::open(CacheConfig::new(dir))
}

fn json_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .count()
}

#[test]
fn test_round_trip_across_reopen() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let tree = scan(data.path());

    open(cache_dir.path()).put(data.path(), &tree);
    let restored = open(cache_dir.path()).get(data.path()).unwrap();

    assert_eq!(restored.len(), tree.len());
    for index in tree.walk() {
        let original = tree.node(index);
        let copy = restored.node(restored.find(&original.path).unwrap());
        assert_eq!(copy.is_dir, original.is_dir);
        assert_eq!(copy.size, original.size);
        assert_eq!(copy.file_count, original.file_count);
        assert_eq!(copy.folder_count, original.folder_count);
        assert_eq!(copy.scanned, original.scanned);
        assert_eq!(copy.modified, original.modified);
        assert_eq!(copy.child_count(), original.child_count());
    }
}

#[test]
fn test_index_totals_match_root() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let tree = scan(data.path());
    let cache = open(cache_dir.path());

    cache.put(data.path(), &tree);

    let entries = cache.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].size, 200);
    assert_eq!(entries[0].file_count, 1);
    assert_eq!(entries[0].folder_count, 3);
}

#[test]
fn test_expired_entry_is_absent() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let tree = scan(data.path());
    let cache = open(cache_dir.path());

    cache.put_at(data.path(), &tree, Utc::now() - ChronoDuration::days(8));

    assert!(!cache.is_fresh(data.path()));
    assert!(cache.get(data.path()).is_none());
    assert!(cache.is_empty());
    assert_eq!(json_files(cache_dir.path()), 1);
}

#[test]
fn test_custom_expiration_window() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let tree = scan(data.path());
    let config = CacheConfig::builder()
        .dir(cache_dir.path())
        .expiration(Duration::from_secs(60))
        .build()
        .unwrap();
    let cache = ScanCache::open(config);

    cache.put_at(data.path(), &tree, Utc::now() - ChronoDuration::seconds(30));
    assert!(cache.is_fresh(data.path()));

    cache.put_at(data.path(), &tree, Utc::now() - ChronoDuration::minutes(5));
    assert!(!cache.is_fresh(data.path()));
}

#[test]
fn test_partial_resolution_from_ancestor() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let cache = open(cache_dir.path());
    cache.put(data.path(), &scan(data.path()));

    let music = data.path().join("music");
    let sub = cache.get(&music).unwrap();

    assert_eq!(sub.root_path(), music.as_path());
    assert_eq!(sub.root().size, 100);
    assert_eq!(sub.root().file_count, 1);
    assert_eq!(sub.root().folder_count, 1);
    assert_eq!(sub.len(), 4);
    assert!(cache.get(data.path().join("missing")).is_none());
}

#[test]
fn test_deepest_ancestor_wins() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let cache = open(cache_dir.path());
    cache.put(data.path(), &scan(data.path()));

    let music = data.path().join("music");
    fs::write(music.join("rock/c.mp3"), vec![0u8; 5]).unwrap();
    cache.put(&music, &scan(&music));

    let rock = cache.get(music.join("rock")).unwrap();
    assert_eq!(rock.root().size, 65);
}

#[test]
fn test_expired_ancestor_not_used() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let cache = open(cache_dir.path());

    cache.put_at(
        data.path(),
        &scan(data.path()),
        Utc::now() - ChronoDuration::days(30),
    );

    assert!(cache.get(data.path().join("music")).is_none());
}

#[test]
fn test_dangling_entry_removed() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let cache = open(cache_dir.path());
    cache.put(data.path(), &scan(data.path()));

    let payload = cache_dir.path().join(&cache.entries()[0].file_name);
    fs::remove_file(payload).unwrap();

    assert!(cache.get(data.path()).is_none());
    assert!(cache.entries().is_empty());
    assert!(open(cache_dir.path()).is_empty());
}

#[test]
fn test_malformed_payload_is_a_miss() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let cache = open(cache_dir.path());
    cache.put(data.path(), &scan(data.path()));

    let payload = cache_dir.path().join(&cache.entries()[0].file_name);
    fs::write(&payload, b"{\"version\": 1, \"nodes\": [{\"oops\": true}]}").unwrap();

    assert!(cache.get(data.path()).is_none());
    assert!(cache.is_empty());
    assert!(!payload.exists());
}

#[test]
fn test_unreadable_index_starts_empty() {
    let cache_dir = TempDir::new().unwrap();
    fs::write(cache_dir.path().join("index.json"), b"not json").unwrap();

    let cache = open(cache_dir.path());

    assert!(cache.is_empty());
}

#[test]
fn test_repeated_put_reuses_payload_file() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let cache = open(cache_dir.path());

    let tree = scan(data.path());
    cache.put(data.path(), &tree);
    cache.put(data.path(), &tree);
    cache.put(data.path(), &tree);

    assert_eq!(cache.len(), 1);
    // index.json plus one payload
    assert_eq!(json_files(cache_dir.path()), 2);
}

#[test]
fn test_invalidate_and_clear() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let cache = open(cache_dir.path());
    let music = data.path().join("music");
    cache.put(data.path(), &scan(data.path()));
    cache.put(&music, &scan(&music));

    assert!(cache.invalidate(&music));
    assert!(!cache.invalidate(&music));
    assert_eq!(cache.len(), 1);
    assert_eq!(json_files(cache_dir.path()), 2);

    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(json_files(cache_dir.path()), 1);
    assert!(open(cache_dir.path()).is_empty());
}

#[test]
fn test_clear_leaves_foreign_files() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    fs::write(cache_dir.path().join("package.json"), b"{}").unwrap();
    fs::write(cache_dir.path().join("notes.txt"), b"keep").unwrap();
    // Left behind by an earlier session; payload-shaped, so it goes.
    fs::write(cache_dir.path().join("0123456789abcdef.json"), b"{}").unwrap();
    let cache = open(cache_dir.path());
    cache.put(data.path(), &scan(data.path()));

    cache.clear();

    assert!(cache_dir.path().join("package.json").exists());
    assert!(cache_dir.path().join("notes.txt").exists());
    assert!(!cache_dir.path().join("0123456789abcdef.json").exists());
    // index.json and package.json
    assert_eq!(json_files(cache_dir.path()), 2);
}

#[test]
fn test_changed_prefix_length_drops_old_payload() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let tree = scan(data.path());
    let with_prefix = |len: usize| {
        let config = CacheConfig::builder()
            .dir(cache_dir.path())
            .hash_prefix_len(len)
            .build()
            .unwrap();
        ScanCache::open(config)
    };

    with_prefix(8).put(data.path(), &tree);
    let cache = with_prefix(16);
    cache.put(data.path(), &tree);

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.entries()[0].file_name.len(), 16 + ".json".len());
    assert_eq!(json_files(cache_dir.path()), 2);
    assert!(cache.get(data.path()).is_some());
}

#[test]
fn test_navigator_lookup_order() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let music = data.path().join("music");

    let first = Navigator::new(NavigationCache::new(), open(cache_dir.path()));
    assert_eq!(first.resolve(&music).source, Source::Listing);

    first.record(data.path(), scan(data.path()));
    let resolved = first.resolve(&music);
    assert_eq!(resolved.source, Source::Memory);
    assert_eq!(resolved.node.node().size, 100);

    // A new session finds the scan on disk, then keeps it in memory.
    let second = Navigator::new(NavigationCache::new(), open(cache_dir.path()));
    assert_eq!(second.resolve(&music).source, Source::Disk);
    assert_eq!(second.resolve(music.join("rock")).source, Source::Memory);

    second.forget(data.path());
    assert_eq!(second.resolve(&music).source, Source::Listing);
}

#[test]
fn test_disk_hit_keeps_newer_session_scans() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let music = data.path().join("music");
    open(cache_dir.path()).put(data.path(), &scan(data.path()));

    let navigator = Navigator::new(NavigationCache::new(), open(cache_dir.path()));
    fs::write(music.join("new.mp3"), vec![0u8; 7]).unwrap();
    navigator.memory().insert(std::sync::Arc::new(scan(&music)));

    assert_eq!(navigator.resolve(data.path()).source, Source::Disk);
    let resolved = navigator.resolve(&music);
    assert_eq!(resolved.source, Source::Memory);
    assert_eq!(resolved.node.node().size, 107);
}

#[test]
fn test_listing_merges_cached_sizes() {
    let cache_dir = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sample_fs(data.path());
    let music = data.path().join("music");
    let navigator = Navigator::new(NavigationCache::new(), open(cache_dir.path()));
    navigator.disk().put(&music, &scan(&music));

    let resolved = navigator.resolve(data.path());

    assert_eq!(resolved.source, Source::Listing);
    let tree = resolved.node.tree();
    let music_node = tree.node(tree.find(&music).unwrap());
    assert!(music_node.scanned);
    assert_eq!(music_node.size, 100);
    let empty = tree.node(tree.find(data.path().join("empty")).unwrap());
    assert!(!empty.scanned);
    assert_eq!(empty.known_size(), None);
}
