use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use arbor_tree::{
    Browser, DriveRecord, DriveSource, LoadState, NodeAttrs, PathNode, TreeError, TreeItem,
};

async fn wait_for<F>(timeout: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

async fn wait_for_state(item: &TreeItem, state: LoadState) -> bool {
    wait_for(Duration::from_secs(5), || item.state() == state).await
}

fn sync_browser() -> Browser {
    Browser::builder()
        .cache(false)
        .watcher(false)
        .build()
        .unwrap()
}

fn create_tree(temp: &TempDir) {
    fs::create_dir(temp.path().join("sub")).unwrap();
    fs::write(temp.path().join("a.txt"), "a").unwrap();
    fs::write(temp.path().join("b.log"), "b").unwrap();
    fs::write(temp.path().join(".hidden"), "h").unwrap();
}

#[tokio::test]
async fn synchronous_population_without_cache() {
    let temp = TempDir::new().unwrap();
    create_tree(&temp);

    let browser = sync_browser();
    let item = browser.item(temp.path()).unwrap();

    let children = item.children();
    assert_eq!(item.state(), LoadState::Loaded);
    let names: Vec<_> = children.iter().map(|c| c.name().to_string()).collect();
    // directories first, then case-insensitive by name
    assert_eq!(names, vec!["sub", ".hidden", "a.txt", "b.log"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn asynchronous_population_with_cache() {
    let temp = TempDir::new().unwrap();
    create_tree(&temp);

    let browser = Browser::builder().watcher(false).build().unwrap();
    let item = browser.item(temp.path()).unwrap();

    item.children();
    assert!(wait_for_state(&item, LoadState::Loaded).await);
    assert_eq!(item.children().len(), 4);
    assert!(browser.preloader().unwrap().is_memoized(temp.path()));

    browser.shutdown().await;
}

#[tokio::test]
async fn load_state_transitions_are_observable() {
    let temp = TempDir::new().unwrap();
    create_tree(&temp);

    let browser = Browser::builder().watcher(false).build().unwrap();
    let item = browser.item(temp.path()).unwrap();
    let mut states = item.state_changes();

    item.populate().unwrap();
    let reached_loaded = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if *states.borrow_and_update() == LoadState::Loaded {
                break;
            }
            states.changed().await.unwrap();
        }
    })
    .await;
    assert!(reached_loaded.is_ok());

    browser.shutdown().await;
}

#[tokio::test]
async fn memoized_done_entries_are_adopted_without_waiting() {
    let temp = TempDir::new().unwrap();
    create_tree(&temp);

    let browser = Browser::builder().watcher(false).build().unwrap();
    let preloader = browser.preloader().unwrap().clone();

    // Complete a computation for the path up front.
    let seeded = PathNode::regular(temp.path().join("seeded"), NodeAttrs::file(0, None), None);
    let handle = preloader.start(temp.path(), move |_| Ok(vec![seeded]));
    handle.join().await;

    let item = browser.item(temp.path()).unwrap();
    item.populate().unwrap();

    // The done entry was adopted synchronously, no join needed.
    assert_eq!(item.state(), LoadState::Loaded);
    let children = item.children();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name(), "seeded");

    browser.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_population_attempt_is_reported() {
    let temp = TempDir::new().unwrap();

    let browser = Browser::builder().watcher(false).build().unwrap();
    let preloader = browser.preloader().unwrap().clone();

    // Seed a pending computation so the item's join stays in flight.
    preloader.start(temp.path(), |cancel| {
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(5));
        }
        Err(arbor_tree::ListError::Interrupted)
    });

    let item = browser.item(temp.path()).unwrap();
    item.populate().unwrap();
    assert_eq!(item.state(), LoadState::Loading);

    let err = item.populate().unwrap_err();
    assert!(matches!(err, TreeError::PopulationInFlight { .. }));

    // Cancellation settles the item and evicts the matching entry.
    item.cancel();
    assert_eq!(item.state(), LoadState::Canceled);
    assert!(!preloader.is_memoized(temp.path()));

    browser.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn canceled_item_rearms_on_next_access() {
    let temp = TempDir::new().unwrap();
    create_tree(&temp);

    let browser = Browser::builder().watcher(false).build().unwrap();
    let preloader = browser.preloader().unwrap().clone();

    preloader.start(temp.path(), |cancel| {
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(5));
        }
        Err(arbor_tree::ListError::Interrupted)
    });

    let item = browser.item(temp.path()).unwrap();
    item.populate().unwrap();
    item.cancel();
    assert_eq!(item.state(), LoadState::Canceled);

    // Next access starts a fresh population that succeeds.
    item.children();
    assert!(wait_for_state(&item, LoadState::Loaded).await);
    assert_eq!(item.children().len(), 4);

    browser.shutdown().await;
}

#[tokio::test]
async fn idempotent_reload_yields_equal_child_sets() {
    let temp = TempDir::new().unwrap();
    create_tree(&temp);

    let browser = sync_browser();
    let item = browser.item(temp.path()).unwrap();

    let first: Vec<String> = item.children().iter().map(|c| c.name().into()).collect();
    item.request_reload();
    assert_eq!(item.state(), LoadState::NotLoaded);
    let second: Vec<String> = item.children().iter().map(|c| c.name().into()).collect();

    assert_eq!(first, second);
}

#[tokio::test]
async fn reload_discards_the_cache_entry() {
    let temp = TempDir::new().unwrap();
    create_tree(&temp);

    let browser = Browser::builder().watcher(false).build().unwrap();
    let item = browser.item(temp.path()).unwrap();

    item.children();
    assert!(wait_for_state(&item, LoadState::Loaded).await);
    assert!(browser.preloader().unwrap().is_memoized(temp.path()));

    item.request_reload();
    assert!(!browser.preloader().unwrap().is_memoized(temp.path()));

    browser.shutdown().await;
}

#[tokio::test]
async fn population_failure_is_recorded_not_thrown() {
    let temp = TempDir::new().unwrap();
    let doomed = temp.path().join("doomed");
    fs::create_dir(&doomed).unwrap();

    let browser = sync_browser();
    let item = browser.item(&doomed).unwrap();
    fs::remove_dir(&doomed).unwrap();

    let children = item.children();
    assert!(children.is_empty());
    assert_eq!(item.state(), LoadState::LoadedWithError);
    assert!(item.node().creation_error().is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_subdirectory_is_isolated() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let locked = temp.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(temp.path().join("plain.txt"), "x").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    let openable = fs::read_dir(&locked).is_ok();

    let browser = sync_browser();
    let parent = browser.item(temp.path()).unwrap();

    // The parent listing succeeds and reports the locked entry.
    let children = parent.children();
    assert_eq!(parent.state(), LoadState::Loaded);
    let locked_child = children.iter().find(|c| c.name() == "locked").unwrap();
    assert_eq!(locked_child.is_leaf(), !openable);

    // Accessing the locked entry itself yields empty children and no
    // panic, whichever way the probe went.
    let locked_item = browser.item(&locked).unwrap();
    let locked_children = locked_item.children();
    assert!(locked_children.is_empty());

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
}

#[tokio::test]
async fn leaf_access_never_enumerates() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("plain.txt");
    fs::write(&file, "x").unwrap();

    let browser = sync_browser();
    let item = browser.item(&file).unwrap();

    assert!(item.node().is_leaf());
    assert!(item.children().is_empty());
    assert_eq!(item.state(), LoadState::NotLoaded);
}

#[tokio::test]
async fn filter_reapplies_to_cached_children() {
    let temp = TempDir::new().unwrap();
    create_tree(&temp);

    let browser = sync_browser();
    let item = browser.item(temp.path()).unwrap();
    assert_eq!(item.children().len(), 4);

    browser.set_filter(Some(Arc::new(|node: &PathNode| {
        !node.name().ends_with(".log")
    })));
    let filtered = item.children();
    assert_eq!(filtered.len(), 3);
    assert!(!filtered.iter().any(|c| c.name() == "b.log"));

    browser.set_filter(None);
    assert_eq!(item.children().len(), 4);
}

#[tokio::test]
async fn hidden_entries_follow_the_config() {
    let temp = TempDir::new().unwrap();
    create_tree(&temp);

    let browser = Browser::builder()
        .config(
            arbor_tree::BrowseConfig::builder()
                .include_hidden(false)
                .build()
                .unwrap(),
        )
        .cache(false)
        .watcher(false)
        .build()
        .unwrap();

    let item = browser.item(temp.path()).unwrap();
    let children = item.children();
    assert_eq!(children.len(), 3);
    assert!(!children.iter().any(|c| c.name() == ".hidden"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn created_file_appears_without_explicit_reload() {
    let temp = TempDir::new().unwrap();

    let browser = Browser::builder().build().unwrap();
    let item = browser.item(temp.path()).unwrap();

    item.children();
    assert!(wait_for_state(&item, LoadState::Loaded).await);
    assert!(item.children().is_empty());

    browser.watch(&item).unwrap();

    let file = temp.path().join("appeared.txt");
    fs::write(&file, "x").unwrap();

    let appeared = wait_for(Duration::from_secs(10), || {
        let children = item.children();
        children.len() == 1 && children[0].path() == file
    })
    .await;
    assert!(appeared, "created file never appeared in the tree");

    browser.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watching_the_same_path_twice_is_rejected() {
    let temp = TempDir::new().unwrap();

    let browser = Browser::builder().build().unwrap();
    let first = browser.item(temp.path()).unwrap();
    let second = browser.item(temp.path()).unwrap();

    browser.watch(&first).unwrap();
    let err = browser.watch(&second).unwrap_err();
    assert!(matches!(err, arbor_tree::BrowseError::AlreadyObserved { .. }));

    browser.unwatch(temp.path());
    browser.watch(&second).unwrap();

    browser.shutdown().await;
}

struct FakeDrives {
    calls: AtomicUsize,
}

impl FakeDrives {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

impl DriveSource for FakeDrives {
    fn drives(&self) -> Result<Vec<DriveRecord>, arbor_tree::DriveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            DriveRecord {
                name: "vda1".to_string(),
                kind: "part".to_string(),
                tran: Some("sata".to_string()),
                fstype: Some("ext4".to_string()),
                size: Some(64 << 30),
                fsavail: Some(10 << 30),
                mountpoint: Some("/".to_string()),
                children: Vec::new(),
            },
            DriveRecord {
                name: "sdb1".to_string(),
                kind: "part".to_string(),
                tran: Some("usb".to_string()),
                fstype: Some("vfat".to_string()),
                size: Some(8 << 30),
                fsavail: None,
                mountpoint: None,
                children: Vec::new(),
            },
        ])
    }
}

#[tokio::test]
async fn root_children_combine_directories_and_drives() {
    let drives = FakeDrives::new();
    let browser = Browser::builder()
        .cache(false)
        .watcher(false)
        .drive_source(drives.clone())
        .build()
        .unwrap();

    let root = browser.root();
    assert!(root.node().is_readable());
    assert_eq!(root.node().depth(), 0);

    let children = root.children();
    // the mounted "/" record deduplicates against the OS root
    assert_eq!(
        children.iter().filter(|c| c.path() == Path::new("/")).count(),
        1
    );
    let stick = children
        .iter()
        .find(|c| c.path() == Path::new("/dev/sdb1"))
        .expect("unmounted drive listed");
    assert!(stick.is_leaf());

    // root() hands out the same item every time
    let again = browser.root();
    assert_eq!(again.path(), root.path());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn drive_rescan_service_refreshes_periodically() {
    let drives = FakeDrives::new();
    let browser = Browser::builder()
        .cache(false)
        .watcher(false)
        .drive_source(drives.clone())
        .build()
        .unwrap();

    browser.start_drive_rescan(Duration::from_millis(40));
    let rescanned = wait_for(Duration::from_secs(5), || {
        drives.calls.load(Ordering::SeqCst) >= 2
    })
    .await;
    assert!(rescanned);

    browser.shutdown().await;
    let settled = drives.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(drives.calls.load(Ordering::SeqCst), settled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_drains_cache_and_stops_watching() {
    let temp = TempDir::new().unwrap();
    create_tree(&temp);

    let browser = Browser::builder().build().unwrap();
    let item = browser.item(temp.path()).unwrap();
    item.children();
    assert!(wait_for_state(&item, LoadState::Loaded).await);

    browser.shutdown().await;

    assert!(browser.preloader().unwrap().is_empty());
    let register_after_stop = browser.watcher().unwrap().register(temp.path());
    assert!(register_after_stop.is_err());
}
