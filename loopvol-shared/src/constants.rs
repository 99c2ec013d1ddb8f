//! Shared constants for loop-backed volumes.
//!
//! Values the library and CLI must agree on.

/// Loop device numbering
pub mod loop_device {
    /// Kernel major number of loop block devices
    pub const MAJOR: u64 = 7;

    /// Device node name prefix (`loop<minor>`)
    pub const NAME_PREFIX: &str = "loop";

    /// Lowest minor handed out. Lower minors belong to loop devices the
    /// host distribution manages itself.
    pub const MIN_MINOR: u32 = 1000;

    /// Largest minor the kernel accepts (MINORBITS = 20)
    pub const MAX_MINOR: u32 = (1 << 20) - 1;

    /// How many consecutive minors `reserve` probes before giving up
    pub const MAX_RESERVE_ATTEMPTS: u32 = 64;

    /// Permission bits of created device nodes
    pub const NODE_MODE: u32 = 0o660;
}

/// Volume defaults
pub mod volume {
    /// Backing file size (100 MiB)
    pub const DEFAULT_SIZE_BYTES: u64 = 100 * 1024 * 1024;

    /// ext4 labels are at most 16 bytes
    pub const MAX_NAME_LEN: usize = 16;

    /// Permission bits of created backing files
    pub const BACKING_FILE_MODE: u32 = 0o600;
}

/// Default host paths
pub mod paths {
    /// Backing files are stored here
    pub const DEFAULT_ROOT: &str = "/tmp/docker-volumes";

    /// Device directory scanned for loop nodes
    pub const DEFAULT_DEV_DIR: &str = "/dev";
}

/// External tool names
pub mod tools {
    pub const LOSETUP: &str = "losetup";
    pub const BLKID: &str = "blkid";
    pub const MKFS_EXT4: &str = "mkfs.ext4";

    /// `blkid` exit status when no device matches the query
    pub const BLKID_NOT_FOUND_EXIT: i32 = 2;
}

/// Environment variables
pub mod envs {
    /// Overrides the backing-store root
    pub const LOOPVOL_ROOT: &str = "LOOPVOL_ROOT";

    /// Path of the JSON configuration file
    pub const LOOPVOL_CONFIG: &str = "LOOPVOL_CONFIG";

    /// Extra directory searched for external tools before PATH
    pub const LOOPVOL_TOOL_DIR: &str = "LOOPVOL_TOOL_DIR";
}
