#![allow(dead_code)]

use assert_cmd::Command;
use loopvol_shared::constants::envs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Isolated CLI environment: temp root, temp device dir, and stub tools
/// configured through a JSON config file.
pub struct TestContext {
    pub cmd: Command,
    pub root: PathBuf,
    pub dev_dir: PathBuf,
    pub config: PathBuf,
    pub dir: TempDir,
}

impl TestContext {
    pub fn new_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_loopvol");
        let mut cmd = Command::new(bin_path);
        cmd.timeout(Duration::from_secs(30));
        cmd.arg("--root").arg(&self.root);
        cmd.arg("--config").arg(&self.config);
        cmd.env_remove(envs::LOOPVOL_ROOT);
        cmd.env_remove(envs::LOOPVOL_CONFIG);
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Place a backing file directly, as a previous run would have left it.
    pub fn seed_volume(&self, name: &str) {
        std::fs::create_dir_all(&self.root).unwrap();
        std::fs::write(self.root.join(name), "").unwrap();
    }
}

fn write_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn loopvol() -> TestContext {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("vols");
    let dev_dir = dir.path().join("dev");
    let bin_dir = dir.path().join("bin");
    std::fs::create_dir_all(&dev_dir).unwrap();
    std::fs::create_dir_all(&bin_dir).unwrap();

    // No device ever carries a label
    let blkid = write_tool(&bin_dir, "blkid", "exit 2");
    let losetup = write_tool(&bin_dir, "losetup", "echo 'losetup: stub' >&2; exit 1");
    let mkfs = write_tool(&bin_dir, "mkfs.ext4", "echo 'mkfs.ext4: stub' >&2; exit 1");

    let config = dir.path().join("config.json");
    let config_json = serde_json::json!({
        "dev_dir": dev_dir,
        "volume_size_bytes": 4096,
        "tools": {
            "blkid": blkid,
            "losetup": losetup,
            "mkfs": mkfs,
        }
    });
    std::fs::write(&config, config_json.to_string()).unwrap();

    let mut ctx = TestContext {
        cmd: Command::new(env!("CARGO_BIN_EXE_loopvol")),
        root,
        dev_dir,
        config,
        dir,
    };
    ctx.cmd = ctx.new_cmd();
    ctx
}
