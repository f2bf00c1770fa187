use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use tracing::{info, warn};

use crate::listing::is_navigation_title;
use crate::models::{JobListing, NOT_AVAILABLE};

/// Decides whether a fully-merged record should be notified.
pub fn is_eligible(job: &JobListing) -> bool {
    eligible_on(job, Local::now().date_naive())
}

/// Same predicate with an injected "today" so expiry is testable.
pub fn eligible_on(job: &JobListing, today: NaiveDate) -> bool {
    if job.url.is_empty() || job.job_id.is_empty() {
        return false;
    }
    if !job.status.is_active() {
        return false;
    }
    if is_navigation_title(&job.title) {
        return false;
    }
    due_date_ok(&job.due_date, today)
}

fn due_date_ok(due: &str, today: NaiveDate) -> bool {
    let due = due.trim();
    // No due date means the job is open-ended.
    if due.is_empty() || due == NOT_AVAILABLE || due.eq_ignore_ascii_case("none") {
        return true;
    }

    match parse_due_date(due) {
        Some(date) => {
            let still_open = date >= today;
            if !still_open {
                info!("job expired, due date was {}", due);
            }
            still_open
        }
        None => {
            // Fail open: an ambiguous date must never silently drop a
            // listing.
            warn!("could not parse due date '{}', keeping the listing", due);
            true
        }
    }
}

/// Tries the date formats the site has been seen to use, most specific
/// first. Time-of-day is discarded.
pub fn parse_due_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in [
        "%Y-%m-%d", // 2026-01-15
        "%b %d, %Y", // Jan 15, 2026
        "%B %d, %Y", // January 15, 2026
        "%d %b %Y", // 15 Jan 2026
        "%d %B %Y", // 15 January 2026
        "%m/%d/%Y", // 01/15/2026
        "%d/%m/%Y", // 15/01/2026
    ] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    None
}
