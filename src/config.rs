use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LISTING_URL: &str = "https://www.gmodstore.com/jobmarket/jobs/browse";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_THUMBNAIL_URL: &str = "https://www.gmodstore.com/favicon.ico";

/// Immutable runtime settings, assembled once in main from CLI flags and
/// environment, then passed into each component's constructor.
#[derive(Debug, Clone)]
pub struct Config {
    /// Webhook target. The one setting without a default; startup aborts
    /// when it is missing.
    pub webhook_url: String,
    /// Browse page to poll.
    pub listing_url: String,
    pub user_agent: String,
    /// Wall-clock interval between poll cycles.
    pub poll_interval: Duration,
    /// Pause between consecutive detail-page fetches.
    pub detail_delay: Duration,
    /// Minimum delay between consecutive webhook deliveries in a batch.
    pub send_delay: Duration,
    /// Backoff after a cycle fails outright.
    pub recovery_delay: Duration,
    /// Where the seen-job ids are persisted.
    pub state_file: PathBuf,
    /// Image shown next to each notification.
    pub thumbnail_url: String,
    /// Footer line on every embed.
    pub footer_text: String,
}

/// Default location for the seen-jobs file: the platform data directory,
/// falling back to the working directory.
pub fn default_state_file() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobwatch") {
        proj_dirs.data_dir().join("seen_jobs.json")
    } else {
        PathBuf::from("seen_jobs.json")
    }
}
