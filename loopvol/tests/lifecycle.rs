//! Integration tests for the volume lifecycle against a fake loop subsystem.

use loopvol::{LoopvolError, Volume};
use loopvol_test_utils::{FakeCall, TEST_VOLUME_SIZE, TestVolumes};

#[test]
fn test_create_then_list_contains_volume_once() {
    let ctx = TestVolumes::new();

    ctx.manager.create("vol1").unwrap();

    let volumes = ctx.manager.list().unwrap();
    assert_eq!(volumes.iter().filter(|v| v.name == "vol1").count(), 1);
}

#[test]
fn test_create_binds_and_labels_device() {
    let ctx = TestVolumes::new();

    let created = ctx.manager.create("vol1").unwrap();

    assert_eq!(created.volume, Volume::new("vol1"));
    assert_eq!(created.minor, 1000);
    assert_eq!(created.device, ctx.dev_dir.join("loop1000"));
    assert_eq!(created.backing_file, ctx.root.join("vol1"));
    assert_eq!(
        std::fs::metadata(&created.backing_file).unwrap().len(),
        TEST_VOLUME_SIZE
    );
    assert_eq!(ctx.host.binding(&created.device), Some(created.backing_file));
    assert_eq!(ctx.host.labelled("vol1"), Some(created.device));
}

#[test]
fn test_create_step_order() {
    let ctx = TestVolumes::new();
    let device = ctx.dev_dir.join("loop1000");

    ctx.manager.create("vol1").unwrap();

    assert_eq!(
        ctx.host.calls(),
        vec![
            FakeCall::CreateNode(device.clone(), 1000),
            FakeCall::Unbind(device.clone()),
            FakeCall::Bind(device.clone(), ctx.root.join("vol1")),
            FakeCall::Format(device, "vol1".to_string()),
        ]
    );
}

#[test]
fn test_stale_detach_failure_is_reported_as_ignored() {
    let ctx = TestVolumes::new();

    let created = ctx.manager.create("vol1").unwrap();

    // Fresh node has nothing bound, so the stale detach fails and is ignored
    assert_eq!(created.ignored.len(), 1);
    assert!(created.ignored[0].is_ignored());
    assert!(created.ignored[0].to_string().contains("stale detach"));
}

#[test]
fn test_create_twice_already_exists() {
    let ctx = TestVolumes::new();

    ctx.manager.create("vol1").unwrap();
    let err = ctx.manager.create("vol1").unwrap_err();

    assert!(err.is_already_exists(), "unexpected error: {err}");
    assert_eq!(ctx.backing_files(), vec!["vol1"]);
    assert_eq!(ctx.nodes(), vec!["loop1000"]);
    assert_eq!(ctx.host.bound_devices(), 1);
}

#[test]
fn test_remove_unknown_not_found_without_mutation() {
    let ctx = TestVolumes::new();
    ctx.manager.create("keep").unwrap();
    let files_before = ctx.backing_files();
    let nodes_before = ctx.nodes();
    ctx.host.clear_calls();

    let err = ctx.manager.remove("ghost").unwrap_err();

    assert!(err.is_not_found(), "unexpected error: {err}");
    assert_eq!(ctx.backing_files(), files_before);
    assert_eq!(ctx.nodes(), nodes_before);
    assert!(ctx.host.calls().is_empty());
}

#[test]
fn test_remove_unknown_leaves_host_device_with_same_label() {
    let ctx = TestVolumes::new();
    let foreign = ctx.dev_dir.join("loop3");
    ctx.host
        .seed_label("data", &foreign, std::path::Path::new("/srv/iso/data.img"));

    let err = ctx.manager.remove("data").unwrap_err();

    assert!(err.is_not_found(), "unexpected error: {err}");
    assert_eq!(
        ctx.host.binding(&foreign),
        Some(std::path::PathBuf::from("/srv/iso/data.img"))
    );
    assert!(ctx.host.calls().is_empty());
}

#[test]
fn test_remove_refuses_device_below_minor_floor() {
    let ctx = TestVolumes::new();
    std::fs::create_dir_all(&ctx.root).unwrap();
    std::fs::write(ctx.root.join("data"), "").unwrap();
    let foreign = ctx.dev_dir.join("loop3");
    ctx.host
        .seed_label("data", &foreign, std::path::Path::new("/srv/iso/data.img"));

    let err = ctx.manager.remove("data").unwrap_err();

    assert!(matches!(err, LoopvolError::Device { .. }), "unexpected error: {err}");
    assert!(ctx.host.binding(&foreign).is_some());
    assert!(ctx.root.join("data").exists());
    assert_eq!(
        ctx.host.calls(),
        vec![FakeCall::FindByLabel("data".to_string())]
    );
}

#[test]
fn test_remove_refuses_device_outside_dev_dir() {
    let ctx = TestVolumes::new();
    std::fs::create_dir_all(&ctx.root).unwrap();
    std::fs::write(ctx.root.join("data"), "").unwrap();
    let foreign = ctx.root.parent().unwrap().join("elsewhere").join("loop1500");
    ctx.host.seed_label("data", &foreign, &ctx.root.join("data"));

    let err = ctx.manager.remove("data").unwrap_err();

    assert!(matches!(err, LoopvolError::Device { .. }), "unexpected error: {err}");
    assert!(ctx.host.binding(&foreign).is_some());
    assert!(ctx.root.join("data").exists());
}

#[test]
fn test_create_remove_list_excludes_volume() {
    let ctx = TestVolumes::new();

    let created = ctx.manager.create("vol1").unwrap();
    ctx.manager.remove("vol1").unwrap();

    assert!(ctx.manager.list().unwrap().is_empty());
    assert!(!created.backing_file.exists());
    assert!(!created.device.exists());
    assert_eq!(ctx.host.binding(&created.device), None);
    assert_eq!(ctx.host.labelled("vol1"), None);
}

#[test]
fn test_remove_step_order() {
    let ctx = TestVolumes::new();
    let created = ctx.manager.create("vol1").unwrap();
    ctx.host.clear_calls();

    ctx.manager.remove("vol1").unwrap();

    assert_eq!(
        ctx.host.calls(),
        vec![
            FakeCall::FindByLabel("vol1".to_string()),
            FakeCall::Unbind(created.device.clone()),
            FakeCall::RemoveNode(created.device),
        ]
    );
}

#[test]
fn test_remove_aborts_on_first_failure() {
    let ctx = TestVolumes::new();
    let created = ctx.manager.create("vol1").unwrap();
    ctx.host.fail_unbind_bound(true);

    let err = ctx.manager.remove("vol1").unwrap_err();

    assert!(matches!(err, LoopvolError::Device { .. }));
    // Later steps were not attempted
    assert!(created.backing_file.exists());
    assert!(created.device.exists());
}

#[test]
fn test_list_idempotent() {
    let ctx = TestVolumes::new();
    ctx.manager.create("b").unwrap();
    ctx.manager.create("a").unwrap();

    let first = ctx.manager.list().unwrap();
    let second = ctx.manager.list().unwrap();

    assert_eq!(first, second);
    assert_eq!(first, vec![Volume::new("a"), Volume::new("b")]);
}

#[test]
fn test_list_on_missing_root_creates_it() {
    let ctx = TestVolumes::new();
    assert!(!ctx.root.exists());

    assert!(ctx.manager.list().unwrap().is_empty());
    assert!(ctx.root.is_dir());
}

#[test]
fn test_list_reflects_backing_files_only() {
    let ctx = TestVolumes::new();
    std::fs::create_dir_all(&ctx.root).unwrap();
    std::fs::write(ctx.root.join("restored"), "").unwrap();

    assert_eq!(ctx.manager.list().unwrap(), vec![Volume::new("restored")]);
    assert_eq!(ctx.manager.get("restored").unwrap(), Some(Volume::new("restored")));
    assert_eq!(ctx.manager.get("missing").unwrap(), None);
}

#[test]
fn test_minor_continues_after_existing_nodes() {
    let ctx = TestVolumes::new();
    for minor in 1000..=1005 {
        ctx.touch_node(minor);
    }

    let created = ctx.manager.create("vol1").unwrap();
    assert_eq!(created.minor, 1006);

    let created = ctx.manager.create("vol2").unwrap();
    assert_eq!(created.minor, 1007);
}

#[test]
fn test_stale_binding_cleared_before_bind() {
    let ctx = TestVolumes::new();
    let device = ctx.dev_dir.join("loop1000");
    // Previous run removed the node without detaching it
    ctx.host
        .seed_label("old", &device, &ctx.root.join("old"));

    let created = ctx.manager.create("vol1").unwrap();

    assert_eq!(created.device, device);
    assert!(created.ignored.is_empty());
    assert_eq!(ctx.host.binding(&device), Some(ctx.root.join("vol1")));
}

#[test]
fn test_create_failure_leaves_partial_state_by_default() {
    let ctx = TestVolumes::new();
    ctx.host.fail_format(true);

    let err = ctx.manager.create("vol1").unwrap_err();

    assert!(matches!(err, LoopvolError::Format { .. }));
    assert_eq!(ctx.backing_files(), vec!["vol1"]);
    assert_eq!(ctx.nodes(), vec!["loop1000"]);
    assert_eq!(ctx.host.bound_devices(), 1);

    // Still listed: existence is the backing file
    assert_eq!(ctx.manager.list().unwrap(), vec![Volume::new("vol1")]);
}

#[test]
fn test_create_failure_rolls_back_when_enabled() {
    let ctx = TestVolumes::with_options(|opts| opts.rollback_on_failure = true);
    ctx.host.fail_format(true);

    let err = ctx.manager.create("vol1").unwrap_err();

    assert!(matches!(err, LoopvolError::Format { .. }));
    assert!(ctx.backing_files().is_empty());
    assert!(ctx.nodes().is_empty());
    assert_eq!(ctx.host.bound_devices(), 0);
}

#[test]
fn test_bind_failure_rolls_back_node_and_file() {
    let ctx = TestVolumes::with_options(|opts| opts.rollback_on_failure = true);
    ctx.host.fail_bind(true);

    let err = ctx.manager.create("vol1").unwrap_err();

    assert!(matches!(err, LoopvolError::Device { .. }));
    assert!(ctx.backing_files().is_empty());
    assert!(ctx.nodes().is_empty());
    // Nothing was bound, so rollback did not try to detach again
    let detaches = ctx
        .host
        .calls()
        .into_iter()
        .filter(|c| matches!(c, FakeCall::Unbind(_)))
        .count();
    assert_eq!(detaches, 1);
}

#[test]
fn test_rollback_keeps_existing_volume_on_duplicate_create() {
    let ctx = TestVolumes::with_options(|opts| opts.rollback_on_failure = true);
    ctx.manager.create("vol1").unwrap();

    let err = ctx.manager.create("vol1").unwrap_err();

    assert!(err.is_already_exists());
    assert_eq!(ctx.backing_files(), vec!["vol1"]);
    assert_eq!(ctx.host.labelled("vol1"), Some(ctx.dev_dir.join("loop1000")));
}

#[test]
fn test_invalid_names_rejected_before_any_step() {
    let ctx = TestVolumes::new();

    for name in ["", "../escape", "-L", "a-name-longer-than-16"] {
        assert!(matches!(
            ctx.manager.create(name),
            Err(LoopvolError::InvalidArgument(_))
        ));
        assert!(matches!(
            ctx.manager.remove(name),
            Err(LoopvolError::InvalidArgument(_))
        ));
    }
    assert!(ctx.host.calls().is_empty());
    assert!(!ctx.root.exists());
}

#[test]
fn test_attach_detach_are_noops() {
    let ctx = TestVolumes::new();
    ctx.manager.create("vol1").unwrap();
    ctx.host.clear_calls();

    ctx.manager.attach("vol1").unwrap();
    ctx.manager.detach("vol1").unwrap();

    assert!(ctx.host.calls().is_empty());
}

#[test]
fn test_lock_file_outside_root() {
    let ctx = TestVolumes::new();
    ctx.manager.create("vol1").unwrap();

    let lock = ctx.manager.options().lock_path();
    assert!(lock.exists());
    assert_eq!(ctx.manager.list().unwrap(), vec![Volume::new("vol1")]);
}

#[test]
fn test_list_with_read_only_lock_file() {
    use std::os::unix::fs::PermissionsExt;

    let ctx = TestVolumes::new();
    ctx.manager.create("vol1").unwrap();

    let lock = ctx.manager.options().lock_path();
    std::fs::set_permissions(&lock, std::fs::Permissions::from_mode(0o444)).unwrap();

    assert_eq!(ctx.manager.list().unwrap(), vec![Volume::new("vol1")]);
}

#[test]
fn test_concurrent_creates_get_distinct_minors() {
    let ctx = TestVolumes::new();
    let names = ["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7"];

    std::thread::scope(|s| {
        for name in names {
            let manager = &ctx.manager;
            s.spawn(move || manager.create(name).unwrap());
        }
    });

    let mut minors: Vec<u32> = names
        .iter()
        .map(|n| {
            let device = ctx.host.labelled(n).unwrap();
            device
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .trim_start_matches("loop")
                .parse()
                .unwrap()
        })
        .collect();
    minors.sort();
    assert_eq!(minors, (1000..1008).collect::<Vec<_>>());
}

#[test]
fn test_full_scenario_default_size() {
    let ctx = TestVolumes::with_options(|opts| {
        opts.volume_size_bytes = loopvol_shared::constants::volume::DEFAULT_SIZE_BYTES
    });

    let created = ctx.manager.create("vol1").unwrap();
    assert!(std::fs::metadata(ctx.root.join("vol1")).unwrap().len() >= 100 * 1024 * 1024);
    assert_eq!(ctx.host.labelled("vol1"), Some(created.device.clone()));
    assert_eq!(
        serde_json::to_string(&ctx.manager.list().unwrap()).unwrap(),
        r#"[{"name":"vol1"}]"#
    );

    ctx.manager.remove("vol1").unwrap();
    assert_eq!(
        serde_json::to_string(&ctx.manager.list().unwrap()).unwrap(),
        "[]"
    );
}
