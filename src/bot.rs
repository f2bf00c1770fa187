use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::detail;
use crate::fetch::{self, PageSource};
use crate::listing;
use crate::seen::SeenSet;
use crate::validate;
use crate::webhook::Notify;

/// Cooperative cancellation token. The signal handler only flips the flag;
/// the orchestrator observes it at cycle boundaries and inside every
/// blocking wait.
#[derive(Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives the poll cycle: extract, enrich, validate, dedup-filter, notify,
/// persist. Strictly single-threaded; the seen-set has no other caller.
pub struct Bot<S: PageSource, N: Notify> {
    source: S,
    notifier: N,
    seen: SeenSet,
    config: Config,
    origin: String,
    shutdown: ShutdownFlag,
}

impl<S: PageSource, N: Notify> Bot<S, N> {
    pub fn new(
        config: Config,
        source: S,
        notifier: N,
        seen: SeenSet,
        shutdown: ShutdownFlag,
    ) -> Self {
        let origin = fetch::origin_of(&config.listing_url);
        Self {
            source,
            notifier,
            seen,
            config,
            origin,
            shutdown,
        }
    }

    /// One full poll cycle. Returns the number of listings delivered.
    pub fn run_cycle(&mut self) -> Result<usize> {
        info!("checking listings");

        let html = match self.source.listing_page() {
            Ok(html) => html,
            Err(e) => {
                // Transport failure ends the cycle early with no state
                // mutation.
                warn!("failed to fetch the listing page: {:#}", e);
                return Ok(0);
            }
        };

        let candidates = listing::extract_jobs(&html, &self.origin);
        if candidates.is_empty() {
            info!("no job cards found");
            return Ok(0);
        }
        info!(count = candidates.len(), "found candidate listings");

        let mut eligible = Vec::new();
        for (i, mut job) in candidates.into_iter().enumerate() {
            if self.shutdown.is_triggered() {
                return Ok(0);
            }
            if i > 0 {
                self.pause(self.config.detail_delay);
            }
            debug!("fetching details for {}", job.title);
            let overlay = detail::enrich(&self.source, &job.url);
            overlay.apply_to(&mut job);

            if validate::is_eligible(&job) {
                eligible.push(job);
            } else {
                debug!("filtered out: {} (invalid or expired)", job.title);
            }
        }

        // Keep only unseen jobs, committing each id before delivery is
        // attempted. At-most-once: a failed delivery is not retried on the
        // next cycle.
        let mut new_jobs = Vec::new();
        for job in eligible {
            if !self.seen.contains(&job.job_id) {
                self.seen.mark_seen(&job.job_id);
                new_jobs.push(job);
            }
        }

        if new_jobs.is_empty() {
            info!("no new listings");
            return Ok(0);
        }
        info!(count = new_jobs.len(), "new listings found");

        let mut sent = 0;
        for (i, job) in new_jobs.iter().enumerate() {
            if self.shutdown.is_triggered() {
                break;
            }
            if i > 0 {
                self.pause(self.config.send_delay);
            }
            if self.notifier.send_job(job) {
                sent += 1;
            }
        }

        if let Err(e) = self.seen.flush() {
            // In-memory state survives; a restart may re-notify.
            warn!("failed to persist seen jobs: {:#}", e);
        }

        info!(sent, total = new_jobs.len(), "cycle finished");
        Ok(sent)
    }

    /// Polls until shutdown: first cycle immediately, then on the fixed
    /// interval. A failed cycle backs off for the recovery delay instead of
    /// terminating.
    pub fn run(&mut self) -> Result<()> {
        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            match self.run_cycle() {
                Ok(_) => {
                    debug!(
                        "next check in {}s",
                        self.config.poll_interval.as_secs()
                    );
                    if !self.pause(self.config.poll_interval) {
                        break;
                    }
                }
                Err(e) => {
                    error!("cycle failed: {:#}", e);
                    if !self.pause(self.config.recovery_delay) {
                        break;
                    }
                }
            }
        }

        // The seen-set must survive a clean shutdown even mid-cycle.
        if let Err(e) = self.seen.flush() {
            error!("failed to persist seen jobs on shutdown: {:#}", e);
        }
        info!(seen = self.seen.len(), "shut down cleanly");
        Ok(())
    }

    /// Interruptible sleep; returns false when shutdown was requested.
    fn pause(&self, total: Duration) -> bool {
        wait(&self.shutdown, total)
    }
}

/// Sleeps in short ticks so a shutdown signal interrupts promptly. Returns
/// false when the flag was triggered.
pub fn wait(flag: &ShutdownFlag, total: Duration) -> bool {
    const TICK: Duration = Duration::from_millis(250);
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if flag.is_triggered() {
            return false;
        }
        let step = remaining.min(TICK);
        std::thread::sleep(step);
        remaining -= step;
    }
    !flag.is_triggered()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobListing;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::path::PathBuf;

    struct FixtureSource {
        listing_html: String,
    }

    impl PageSource for FixtureSource {
        fn listing_page(&self) -> Result<String> {
            Ok(self.listing_html.clone())
        }
        fn detail_page(&self, _url: &str) -> Result<String> {
            // Details unavailable; the base record must still go through.
            Err(anyhow!("connection timed out"))
        }
    }

    struct FailingSource;

    impl PageSource for FailingSource {
        fn listing_page(&self) -> Result<String> {
            Err(anyhow!("dns failure"))
        }
        fn detail_page(&self, _url: &str) -> Result<String> {
            Err(anyhow!("dns failure"))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        delivered: RefCell<Vec<String>>,
    }

    impl Notify for RecordingNotifier {
        fn send_job(&self, job: &JobListing) -> bool {
            self.delivered.borrow_mut().push(job.job_id.clone());
            true
        }
    }

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("jobwatch-bot-{}-{}.json", name, std::process::id()))
    }

    fn test_config(state_file: PathBuf) -> Config {
        Config {
            webhook_url: "https://example.invalid/webhook".to_string(),
            listing_url: "https://www.gmodstore.com/jobmarket/jobs/browse".to_string(),
            user_agent: "test".to_string(),
            poll_interval: Duration::from_secs(1800),
            detail_delay: Duration::ZERO,
            send_delay: Duration::ZERO,
            recovery_delay: Duration::ZERO,
            state_file,
            thumbnail_url: "https://example.invalid/icon.ico".to_string(),
            footer_text: "test".to_string(),
        }
    }

    fn three_card_page() -> String {
        // One card without a link, one navigation card, one real job with no
        // due date.
        r#"<html><body>
            <div class="item-listing item-listing--job">
              <div class="item-listing__name" title="Linkless card">Linkless card</div>
            </div>
            <div class="item-listing item-listing--job">
              <a class="item-listing__link" href="/jobmarket/jobs/post"></a>
              <div class="item-listing__name" title="Post a Job">Post a Job</div>
            </div>
            <div class="item-listing item-listing--job">
              <a class="item-listing__link" href="/jobmarket/jobs/real-1"></a>
              <div class="item-listing__name" title="Write a leveling addon">Write a leveling addon</div>
              <div class="item-listing__bottom__right__price">$60.00</div>
              <div class="card-body"><p>Coding - 1 applicant</p></div>
            </div>
        </body></html>"#
            .to_string()
    }

    fn bot_with(
        listing_html: String,
        state_file: PathBuf,
    ) -> Bot<FixtureSource, RecordingNotifier> {
        let config = test_config(state_file.clone());
        let seen = SeenSet::load(&state_file);
        Bot::new(
            config,
            FixtureSource { listing_html },
            RecordingNotifier::default(),
            seen,
            ShutdownFlag::new(),
        )
    }

    #[test]
    fn cycle_delivers_only_the_valid_card() {
        let state = scratch_path("three-cards");
        let _ = std::fs::remove_file(&state);

        let mut bot = bot_with(three_card_page(), state.clone());
        let sent = bot.run_cycle().unwrap();

        assert_eq!(sent, 1);
        assert_eq!(
            bot.notifier.delivered.borrow().as_slice(),
            &["real-1".to_string()]
        );

        // id was appended to the persisted set
        let raw = std::fs::read_to_string(&state).unwrap();
        let persisted: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted, vec!["real-1".to_string()]);

        let _ = std::fs::remove_file(&state);
    }

    #[test]
    fn unchanged_listing_is_delivered_once_across_cycles() {
        let state = scratch_path("two-cycles");
        let _ = std::fs::remove_file(&state);

        let mut bot = bot_with(three_card_page(), state.clone());
        assert_eq!(bot.run_cycle().unwrap(), 1);
        assert_eq!(bot.run_cycle().unwrap(), 0);
        assert_eq!(bot.notifier.delivered.borrow().len(), 1);

        let _ = std::fs::remove_file(&state);
    }

    #[test]
    fn preseeded_state_filters_before_the_notifier() {
        let state = scratch_path("preseeded");
        std::fs::write(&state, r#"["job-42"]"#).unwrap();

        let html = r#"<html><body>
            <div class="item-listing item-listing--job">
              <a class="item-listing__link" href="/jobmarket/jobs/job-42"></a>
              <div class="item-listing__name" title="Known job">Known job</div>
            </div>
        </body></html>"#
            .to_string();

        let mut bot = bot_with(html, state.clone());
        assert_eq!(bot.run_cycle().unwrap(), 0);
        assert!(bot.notifier.delivered.borrow().is_empty());

        let _ = std::fs::remove_file(&state);
    }

    #[test]
    fn listing_fetch_failure_ends_cycle_without_state_mutation() {
        let state = scratch_path("fetch-failure");
        let _ = std::fs::remove_file(&state);

        let config = test_config(state.clone());
        let seen = SeenSet::load(&state);
        let mut bot = Bot::new(
            config,
            FailingSource,
            RecordingNotifier::default(),
            seen,
            ShutdownFlag::new(),
        );

        assert_eq!(bot.run_cycle().unwrap(), 0);
        assert!(bot.notifier.delivered.borrow().is_empty());
        assert!(!state.exists(), "no state file should be written");
    }

    #[test]
    fn wait_returns_early_when_triggered() {
        let flag = ShutdownFlag::new();
        flag.trigger();
        let started = std::time::Instant::now();
        assert!(!wait(&flag, Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_completes_when_not_triggered() {
        let flag = ShutdownFlag::new();
        assert!(wait(&flag, Duration::from_millis(10)));
    }
}
