use std::path::PathBuf;

/// Runtime configuration for one scan session.
///
/// Assembled by the caller (CLI flags, platform glue) and handed to the
/// engine; the engine never reads process arguments itself.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Base acceptance latency in milliseconds. The per-block ceiling and
    /// the step applied after slow results are derived from this value.
    pub threshold_ms: u32,

    /// Directory holding the per-target endpoint databases and the cached
    /// target document.
    pub data_dir: PathBuf,

    /// Target document to load when no refreshed copy exists in the data
    /// directory. `None` falls back to the bundled document.
    pub override_path: Option<PathBuf>,

    /// Keep only definition lines containing this substring.
    ///
    /// An empty filter keeps every line.
    pub filter: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threshold_ms: 5_000,
            data_dir: std::env::temp_dir(),
            override_path: None,
            filter: String::new(),
        }
    }
}
