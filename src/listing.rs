use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::models::{JobListing, JobStatus, NOT_AVAILABLE};

/// Path fragment every real job posting URL carries.
const JOB_PATH: &str = "/jobmarket/jobs/";

/// Navigation chrome that shows up where job titles do. None of these are
/// postings.
const CHROME_TITLES: &[&str] = &["post a job", "browse jobs", "create job", "title not found", ""];

pub fn is_navigation_title(title: &str) -> bool {
    CHROME_TITLES.contains(&title.trim().to_lowercase().as_str())
}

/// Parses the browse page into candidate job records. Detail-only fields are
/// default-filled (`status=Apply`, `views=0`, `due_date="N/A"`). One bad card
/// never discards the rest of the batch.
pub fn extract_jobs(html: &str, origin: &str) -> Vec<JobListing> {
    let document = Html::parse_document(html);

    let primary = match Selector::parse("div.item-listing.item-listing--job") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let mut cards: Vec<ElementRef> = document.select(&primary).collect();

    if cards.is_empty() {
        // Markup drift: fall back to the looser card signature.
        warn!("no 'item-listing--job' cards found, trying the looser selector");
        if let Ok(fallback) = Selector::parse("div.item-listing") {
            cards = document.select(&fallback).collect();
        }
    }

    debug!(count = cards.len(), "found job cards");

    cards
        .into_iter()
        .filter_map(|card| extract_card(card, origin))
        .collect()
}

fn extract_card(card: ElementRef, origin: &str) -> Option<JobListing> {
    let link_sel = Selector::parse("a.item-listing__link").ok()?;
    let name_sel = Selector::parse("div.item-listing__name").ok()?;
    let price_sel = Selector::parse("div.item-listing__bottom__right__price").ok()?;
    let body_sel = Selector::parse("div.card-body p").ok()?;
    let listed_sel = Selector::parse("v-date-time[time]").ok()?;

    // The link is the unique identifier; a card without one is dropped
    // silently rather than aborting the batch.
    let href = card.select(&link_sel).next()?.value().attr("href")?;
    let url = if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}{}", origin.trim_end_matches('/'), href)
    };
    if !url.contains(JOB_PATH) {
        return None;
    }
    let job_id = url.trim_end_matches('/').rsplit('/').next()?.to_string();

    // Prefer the title attribute, the visible text may be truncated.
    let title = match card.select(&name_sel).next() {
        Some(el) => {
            let attr = el.value().attr("title").unwrap_or("").trim().to_string();
            if attr.is_empty() { element_text(el) } else { attr }
        }
        None => "Title not found".to_string(),
    };
    if is_navigation_title(&title) {
        return None;
    }

    let budget = card
        .select(&price_sel)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let (category, applications) = match card.select(&body_sel).next() {
        Some(p) => parse_category_line(&element_text(p)),
        None => (NOT_AVAILABLE.to_string(), 0),
    };

    let listed_date = card
        .select(&listed_sel)
        .next()
        .and_then(|el| el.value().attr("time"))
        .map(|t| t.trim().to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let mut job = JobListing {
        job_id,
        url,
        title,
        budget,
        category,
        applications,
        views: 0,
        status: JobStatus::Apply,
        due_date: NOT_AVAILABLE.to_string(),
        listed_date,
        description: String::new(),
    };
    job.synthesize_description();
    Some(job)
}

/// The card body line reads like "Gamemode - 2 applicants". Split on the last
/// " - " and pull the count out of the trailing segment; anything that does
/// not match keeps the whole line as category with zero applicants.
fn parse_category_line(line: &str) -> (String, u32) {
    if line.is_empty() {
        return (NOT_AVAILABLE.to_string(), 0);
    }
    if let Some((category, tail)) = line.rsplit_once(" - ") {
        let count = regex::Regex::new(r"(?i)(\d+)\s*applicant")
            .ok()
            .and_then(|re| re.captures(tail))
            .and_then(|cap| cap[1].parse().ok())
            .unwrap_or(0);
        (category.trim().to_string(), count)
    } else {
        (line.to_string(), 0)
    }
}

fn element_text(el: ElementRef) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
