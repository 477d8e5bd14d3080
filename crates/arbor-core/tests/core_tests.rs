use std::sync::Arc;
use std::time::Duration;

use arbor_core::{
    default_comparator, sort_children, BrowseConfig, DriveInfo, DriveKind, ListError, LoadState,
    NodeAttrs, PathNode, Transport,
};

fn dir(path: &str, parent: Option<&Arc<PathNode>>) -> Arc<PathNode> {
    PathNode::regular(path, NodeAttrs::directory(None), parent)
}

fn file(path: &str, parent: Option<&Arc<PathNode>>) -> Arc<PathNode> {
    PathNode::regular(path, NodeAttrs::file(0, None), parent)
}

#[test]
fn population_lifecycle_round_trip() {
    let parent = dir("/data", None);
    assert_eq!(parent.load_state(), LoadState::NotLoaded);
    assert!(parent.current_children().is_empty());

    assert!(parent.begin_loading());
    let mut children = vec![
        file("/data/b.txt", Some(&parent)),
        dir("/data/a", Some(&parent)),
    ];
    sort_children(&mut children, &default_comparator());
    parent.complete_loaded(children);

    assert_eq!(parent.load_state(), LoadState::Loaded);
    let snapshot = parent.current_children();
    assert_eq!(snapshot.len(), 2);
    // directory first under default ordering
    assert_eq!(snapshot[0].name(), "a");
    assert_eq!(snapshot[1].name(), "b.txt");
    assert_eq!(snapshot[0].parent().unwrap().path(), parent.path());
}

#[test]
fn failed_population_is_retained_not_thrown() {
    let parent = dir("/locked", None);
    assert!(parent.begin_loading());
    parent.complete_with_error(Arc::new(ListError::PermissionDenied {
        path: "/locked".into(),
    }));

    assert_eq!(parent.load_state(), LoadState::LoadedWithError);
    assert!(parent.current_children().is_empty());
    let err = parent.creation_error().expect("error retained");
    assert!(matches!(*err, ListError::PermissionDenied { .. }));
}

#[test]
fn reload_discards_state_and_children() {
    let parent = dir("/data", None);
    parent.begin_loading();
    parent.complete_loaded(vec![file("/data/x", Some(&parent))]);
    assert_eq!(parent.load_state(), LoadState::Loaded);

    parent.reset();
    assert_eq!(parent.load_state(), LoadState::NotLoaded);
    assert!(parent.current_children().is_empty());
}

#[test]
fn drive_leaf_invariant_across_variants() {
    let mounted = PathNode::drive(
        "/mnt/stick",
        DriveInfo {
            mounted: true,
            kind: DriveKind::Partition,
            transport: Transport::Usb,
            total: 8 << 30,
            available: 4 << 30,
            fs_type: Some("vfat".into()),
        },
        None,
    );
    let unmounted = PathNode::drive(
        "/dev/sr0",
        DriveInfo {
            mounted: false,
            kind: DriveKind::Rom,
            transport: Transport::Sata,
            total: 700 << 20,
            available: 0,
            fs_type: None,
        },
        None,
    );

    assert!(!mounted.is_leaf());
    assert!(unmounted.is_leaf());
    assert!(unmounted.current_children().is_empty());
    assert_eq!(unmounted.description(), "sata rom drive");
}

#[test]
fn config_ttl_and_patterns_compose() {
    let config = BrowseConfig::builder()
        .include_hidden(false)
        .ignore_patterns(vec!["target".to_string()])
        .preload_ttl(Some(Duration::from_millis(250)))
        .build()
        .unwrap();

    assert!(config.should_skip_hidden(".cache"));
    assert!(config.should_ignore("target"));
    assert_eq!(config.effective_ttl(), Some(Duration::from_millis(250)));
}
