//! Application-wide constants
//!
//! Paths, filenames, binary offsets and process names used throughout the
//! editor, kept in one place so the engine and the front end agree on them.

/// Game profile location constants
pub mod game {
    /// Directory under the user's home that holds the game folder
    pub const DOCUMENTS_DIR: &str = "Documents";

    /// Game folder name inside Documents
    pub const GAME_DIR: &str = "Battlefield 6";

    /// Settings folder inside the game folder (searched recursively)
    pub const SETTINGS_DIR: &str = "settings";

    /// Name of the profile file the editor rewrites
    pub const PROFILE_FILENAME: &str = "PROFSAVE_profile";
}

/// Backup naming constants
pub mod backup {
    /// Infix between the original filename and the timestamp
    pub const SUFFIX: &str = ".backup_";

    /// chrono format for the backup timestamp (second resolution)
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

    /// Upper bound on same-second collision suffixes before giving up
    pub const MAX_COLLISION_ATTEMPTS: u32 = 100;
}

/// Atomic write constants
pub mod atomic {
    /// Prefix for temporary files created beside the target
    pub const TEMP_PREFIX: &str = ".tmp_";
}

/// UTF-8 byte-order mark as it appears at the start of decoded text
pub const BOM: char = '\u{FEFF}';

/// EDID / CTA-861 layout constants
pub mod edid {
    /// Size of the base block and of every extension block
    pub const BLOCK_SIZE: usize = 128;

    /// Minimum length for an EDID carrying at least one extension
    pub const MIN_LEN_WITH_EXTENSION: usize = 2 * BLOCK_SIZE;

    /// Extension tag for CEA/CTA-861 blocks
    pub const CTA_EXTENSION_TAG: u8 = 0x02;

    /// Offset of the DTD start byte inside a CTA block
    pub const DTD_OFFSET_INDEX: usize = 2;

    /// First byte of the data block collection
    pub const DATA_BLOCK_START: usize = 4;

    /// Short tag meaning "use extended tag"
    pub const EXTENDED_TAG: u8 = 7;

    /// Extended tag for HDR Static Metadata (CTA-861.3)
    pub const HDR_STATIC_METADATA_TAG: u8 = 0x06;

    /// Offset from the block header to the max luminance code
    pub const MAX_LUMINANCE_OFFSET: usize = 4;

    /// Base luminance of the CTA-861.3 encoding, in nits
    pub const LUMINANCE_BASE_NITS: f64 = 50.0;

    /// Divisor of the code in the exponent of the encoding
    pub const LUMINANCE_CODE_DIVISOR: f64 = 32.0;

    /// sysfs directory listing DRM connectors on Linux
    pub const DRM_SYSFS_DIR: &str = "/sys/class/drm";

    /// Per-connector EDID blob filename
    pub const EDID_FILENAME: &str = "edid";
}

/// Game process detection constants
pub mod process {
    /// Executable names of the game client (compared case-insensitively)
    pub const GAME_PROCESSES: &[&str] = &["bf6.exe"];

    /// procfs root
    pub const PROC_DIR: &str = "/proc";
}

/// Editor configuration file constants
pub mod config {
    /// Directory under the platform config dir
    pub const APP_DIR: &str = "profsave-editor";

    /// TOML configuration filename
    pub const FILENAME: &str = "config.toml";

    /// Environment variable overriding the profile path
    pub const PATH_ENV: &str = "PROFSAVE_PATH";

    /// Environment variable selecting the log level
    pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
}
