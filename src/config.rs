//! Configuration for onirec
//!
//! Centralized configuration with sensible defaults. Both the writer and the
//! reader size their scratch buffers once from these values at construction.

/// Main configuration shared by `OniWriter` and `OniReader`
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Buffer Configuration
    // -------------------------------------------------------------------------
    /// Scratch buffer for one non-data record (header + fields)
    pub max_record_size: usize,

    /// Largest raw frame the reader will hand to a notification sink
    pub max_data_size: usize,

    /// Largest encoded frame payload that may follow a NewData header
    pub max_payload_size: usize,

    // -------------------------------------------------------------------------
    // Playback Configuration
    // -------------------------------------------------------------------------
    /// Rewind to the first record after the header when End is reached
    pub repeat: bool,

    /// Allow index-assisted seeks; when false every seek replays
    pub fast_seek: bool,

    // -------------------------------------------------------------------------
    // Safety Limits
    // -------------------------------------------------------------------------
    /// Hop limit for a single undo-chain walk
    pub max_undo_steps: usize,

    /// Record limit for the legacy stats recovery scan
    pub max_scan_records: usize,

    /// Largest seek table payload loaded at open
    pub max_seek_table_size: usize,
}

/// 1600x1200 RGB, the largest frame any supported device produces
const DEFAULT_MAX_DATA_SIZE: usize = 1600 * 1200 * 3;

impl Default for Config {
    fn default() -> Self {
        Self {
            max_record_size: 20 * 1024, // 20 KB
            max_data_size: DEFAULT_MAX_DATA_SIZE,
            max_payload_size: DEFAULT_MAX_DATA_SIZE + DEFAULT_MAX_DATA_SIZE / 5,
            repeat: false,
            fast_seek: true,
            max_undo_steps: 1_000_000,
            max_scan_records: 1_000_000,
            max_seek_table_size: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the non-data record scratch size (in bytes)
    pub fn max_record_size(mut self, size: usize) -> Self {
        self.config.max_record_size = size;
        self
    }

    /// Set the largest decoded frame (in bytes)
    pub fn max_data_size(mut self, size: usize) -> Self {
        self.config.max_data_size = size;
        self
    }

    /// Set the largest encoded payload (in bytes)
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.config.max_payload_size = size;
        self
    }

    /// Enable or disable repeat playback
    pub fn repeat(mut self, repeat: bool) -> Self {
        self.config.repeat = repeat;
        self
    }

    /// Enable or disable index-assisted seeking
    pub fn fast_seek(mut self, enabled: bool) -> Self {
        self.config.fast_seek = enabled;
        self
    }

    /// Set the undo-chain hop limit
    pub fn max_undo_steps(mut self, steps: usize) -> Self {
        self.config.max_undo_steps = steps;
        self
    }

    /// Set the legacy scan record limit
    pub fn max_scan_records(mut self, records: usize) -> Self {
        self.config.max_scan_records = records;
        self
    }

    /// Set the largest seek table the reader will load (in bytes)
    pub fn max_seek_table_size(mut self, size: usize) -> Self {
        self.config.max_seek_table_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
