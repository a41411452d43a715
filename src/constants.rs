//! # System Constants
//!
//! Operational defaults and well-known names shared by the engine, the
//! operation poller and the staging pipeline.

use std::time::Duration;

/// Events published while a convergence run progresses
pub mod events {
    // Run lifecycle events
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_COMPLETED: &str = "run.completed";
    pub const RUN_FAILED: &str = "run.failed";
    pub const RUN_CANCELLED: &str = "run.cancelled";

    // Task lifecycle events
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";

    // Staging events
    pub const ASSET_STAGED: &str = "asset.staged";
    pub const ASSET_SKIPPED: &str = "asset.skipped";
}

/// Defaults for waiting on long-running cloud operations
pub mod polling {
    use super::Duration;

    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);
    /// Operations slower than this are reported when they finish.
    pub const LONG_OPERATION_THRESHOLD: Duration = Duration::from_secs(60);

    pub const STATUS_PENDING: &str = "PENDING";
    pub const STATUS_RUNNING: &str = "RUNNING";
    pub const STATUS_DONE: &str = "DONE";
}

/// Artifact staging
pub mod staging {
    /// Prefix of the line a container runtime prints after importing an archive.
    pub const LOADED_IMAGE_MARKER: &str = "Loaded image: ";
    pub const DEFAULT_SCRATCH_DIR: &str = "/tmp";
    pub const DEFAULT_DOCKER_EXECUTABLE: &str = "docker";
}

/// Declarative target output
pub mod render {
    pub const CONFIG_FILE_NAME: &str = "cluster.tf.json";
    pub const DEFAULT_OUTPUT_DIR: &str = "out/config";
}

/// Environment variables consulted at startup
pub mod env {
    pub const ENVIRONMENT: &str = "CLUSTERUP_ENV";
    pub const FALLBACK_ENVIRONMENT: &str = "APP_ENV";
    pub const LOG_FORMAT: &str = "CLUSTERUP_LOG_FORMAT";
    pub const CONFIG_PREFIX: &str = "CLUSTERUP";
}
