use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::fetch::PageSource;
use crate::models::{JobDetails, JobStatus};

/// One extraction strategy. Each detail field carries an ordered list of
/// these; the first rule that yields a value wins.
enum Rule {
    /// Structural match: take an attribute (or the text) of the first
    /// element the selector hits.
    Css {
        selector: &'static str,
        attr: Option<&'static str>,
    },
    /// Anchor on a text node matching the label, then take the text of the
    /// nearest following element with one of the given tag names.
    Label {
        text: &'static str,
        exact: bool,
        take_from: &'static [&'static str],
    },
    /// Scan the whole document text; capture group 1 is the value.
    Pattern { pattern: &'static str },
}

const STATUS_RULES: &[Rule] = &[Rule::Css {
    selector: "span[class*='status'], div[class*='status']",
    attr: None,
}];

const BUDGET_RULES: &[Rule] = &[Rule::Label {
    text: "Budget",
    exact: true,
    take_from: &["div", "span", "dd"],
}];

const DUE_DATE_RULES: &[Rule] = &[
    Rule::Label {
        text: "due date",
        exact: false,
        take_from: &["span", "div", "time", "dd"],
    },
    Rule::Css {
        selector: "v-date-time[time]",
        attr: Some("time"),
    },
    Rule::Css {
        selector: "time[datetime]",
        attr: Some("datetime"),
    },
];

const APPLICATION_RULES: &[Rule] = &[
    Rule::Label {
        text: "Applications",
        exact: true,
        take_from: &["dd", "span", "div"],
    },
    Rule::Pattern {
        pattern: r"(?i)(\d+)\s*applicant",
    },
    Rule::Pattern {
        pattern: r"(?i)applications[:\s]+(\d+)",
    },
];

const VIEW_RULES: &[Rule] = &[
    Rule::Label {
        text: "Views",
        exact: true,
        take_from: &["dd", "span", "div"],
    },
    Rule::Pattern {
        pattern: r"(?i)([\d,]+)\s*views?",
    },
    Rule::Pattern {
        pattern: r"(?i)views[:\s]+([\d,]+)",
    },
];

const CATEGORY_RULES: &[Rule] = &[Rule::Label {
    text: "Category",
    exact: true,
    take_from: &["dd", "a"],
}];

/// Fetches a job's own page and extracts whatever detail fields it exposes.
/// Transport errors never escape this step: the caller gets an empty overlay
/// and proceeds with the listing-page record.
pub fn enrich<S: PageSource>(source: &S, url: &str) -> JobDetails {
    match source.detail_page(url) {
        Ok(html) => parse_details(&html),
        Err(e) => {
            warn!("detail fetch failed for {}: {:#}", url, e);
            JobDetails::default()
        }
    }
}

/// Pure extraction over a detail page document.
pub fn parse_details(html: &str) -> JobDetails {
    let document = Html::parse_document(html);

    JobDetails {
        status: evaluate(&document, STATUS_RULES).and_then(|s| JobStatus::parse_known(&s)),
        budget: evaluate(&document, BUDGET_RULES),
        due_date: evaluate(&document, DUE_DATE_RULES),
        applications: evaluate(&document, APPLICATION_RULES).and_then(|s| first_number(&s)),
        views: evaluate(&document, VIEW_RULES).and_then(|s| first_number(&s)),
        category: evaluate(&document, CATEGORY_RULES).and_then(clean_category),
    }
}

fn evaluate(document: &Html, rules: &[Rule]) -> Option<String> {
    for rule in rules {
        let value = match rule {
            Rule::Css { selector, attr } => css_value(document, selector, *attr),
            Rule::Label {
                text,
                exact,
                take_from,
            } => label_anchor(document, text, *exact, take_from),
            Rule::Pattern { pattern } => pattern_capture(document, pattern),
        };
        if let Some(v) = value {
            let v = v.trim().to_string();
            if !v.is_empty() {
                return Some(v);
            }
        }
    }
    None
}

fn css_value(document: &Html, selector: &str, attr: Option<&str>) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let el = document.select(&sel).next()?;
    if let Some(name) = attr {
        if let Some(value) = el.value().attr(name) {
            if !value.trim().is_empty() {
                return Some(value.to_string());
            }
        }
    }
    Some(element_text(el))
}

/// Walks the document in order: find the first text node matching the label,
/// then take the text of the next element (in document order) whose tag is in
/// `take_from`. Mirrors how the fields are laid out as label/value pairs.
fn label_anchor(document: &Html, label: &str, exact: bool, take_from: &[&str]) -> Option<String> {
    let nodes: Vec<_> = document.tree.root().descendants().collect();
    let needle = label.to_lowercase();

    for (i, node) in nodes.iter().enumerate() {
        let scraper::Node::Text(t) = node.value() else {
            continue;
        };
        let text = t.trim();
        let hit = if exact {
            text.eq_ignore_ascii_case(label)
        } else {
            text.to_lowercase().contains(&needle)
        };
        if !hit {
            continue;
        }

        for later in &nodes[i + 1..] {
            let scraper::Node::Element(el) = later.value() else {
                continue;
            };
            if !take_from.contains(&el.name()) {
                continue;
            }
            let Some(el_ref) = ElementRef::wrap(*later) else {
                continue;
            };
            let value = element_text(el_ref);
            if !value.is_empty() {
                return Some(value);
            }
        }
        // Anchored on this label and found nothing after it; let the next
        // rule in the chain have a go.
        return None;
    }
    None
}

fn pattern_capture(document: &Html, pattern: &str) -> Option<String> {
    let re = regex::Regex::new(pattern).ok()?;
    let text = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    re.captures(&text).map(|cap| cap[1].to_string())
}

/// Pulls the first integer out of free text, tolerating thousands separators
/// ("1,234 views" -> 1234).
fn first_number(s: &str) -> Option<u32> {
    let re = regex::Regex::new(r"(\d[\d,]*)").ok()?;
    let cap = re.captures(s)?;
    cap[1].replace(',', "").parse().ok()
}

/// Categories are short names like "Gamemode"; anything long or prefixed
/// "Job:" is the anchor walking into unrelated content.
fn clean_category(text: String) -> Option<String> {
    if text.len() < 50 && !text.starts_with("Job:") {
        Some(text)
    } else {
        None
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

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};

    struct DeadSource;

    impl PageSource for DeadSource {
        fn listing_page(&self) -> Result<String> {
            Err(anyhow!("unreachable"))
        }
        fn detail_page(&self, _url: &str) -> Result<String> {
            Err(anyhow!("connection timed out"))
        }
    }

    #[test]
    fn transport_failure_yields_empty_overlay() {
        let details = enrich(&DeadSource, "https://example.com/jobmarket/jobs/x");
        assert!(details.status.is_none());
        assert!(details.budget.is_none());
        assert!(details.due_date.is_none());
    }

    #[test]
    fn status_from_badge_element() {
        let html = r#"<html><body>
            <span class="job-status-badge">In Progress</span>
        </body></html>"#;
        let details = parse_details(html);
        assert_eq!(details.status, Some(JobStatus::InProgress));
    }

    #[test]
    fn status_element_with_junk_text_is_ignored() {
        let html = r#"<html><body>
            <div class="order-status">shipped yesterday</div>
        </body></html>"#;
        assert_eq!(parse_details(html).status, None);
    }

    #[test]
    fn budget_from_label_anchor() {
        let html = r#"<html><body>
            <div class="card">
              <strong>Budget</strong>
              <div class="card-text">$150.00</div>
            </div>
        </body></html>"#;
        let details = parse_details(html);
        assert_eq!(details.budget, Some("$150.00".to_string()));
    }

    #[test]
    fn due_date_from_label_anchor() {
        let html = r#"<html><body>
            <dt>DUE DATE</dt>
            <dd>Jan 15, 2099</dd>
        </body></html>"#;
        let details = parse_details(html);
        assert_eq!(details.due_date, Some("Jan 15, 2099".to_string()));
    }

    #[test]
    fn due_date_falls_back_to_time_attribute() {
        let html = r#"<html><body>
            <v-date-time time="2099-03-01T00:00:00Z"></v-date-time>
        </body></html>"#;
        let details = parse_details(html);
        assert_eq!(details.due_date, Some("2099-03-01T00:00:00Z".to_string()));
    }

    #[test]
    fn applications_from_label_then_pattern() {
        let labeled = r#"<html><body><dt>Applications</dt><dd>7</dd></body></html>"#;
        assert_eq!(parse_details(labeled).applications, Some(7));

        let prose = r#"<html><body><p>This job has 12 applicants so far.</p></body></html>"#;
        assert_eq!(parse_details(prose).applications, Some(12));
    }

    #[test]
    fn views_strip_thousands_separators() {
        let html = r#"<html><body><p>Seen by 1,234 views</p></body></html>"#;
        assert_eq!(parse_details(html).views, Some(1234));
    }

    #[test]
    fn category_rejects_long_or_foreign_text() {
        let good = r#"<html><body><dt>Category</dt><dd>Modelling</dd></body></html>"#;
        assert_eq!(parse_details(good).category, Some("Modelling".to_string()));

        let long = format!(
            r#"<html><body><dt>Category</dt><dd>{}</dd></body></html>"#,
            "x".repeat(80)
        );
        assert_eq!(parse_details(&long).category, None);

        let foreign = r#"<html><body><dt>Category</dt><dd>Job: do my thing</dd></body></html>"#;
        assert_eq!(parse_details(foreign).category, None);
    }

    #[test]
    fn unrecognized_page_yields_empty_overlay() {
        let details = parse_details("<html><body><h1>404</h1></body></html>");
        assert!(details.status.is_none());
        assert!(details.budget.is_none());
        assert!(details.due_date.is_none());
        assert!(details.applications.is_none());
        assert!(details.views.is_none());
        assert!(details.category.is_none());
    }

    #[test]
    fn first_number_handles_commas() {
        assert_eq!(first_number("1,234"), Some(1234));
        assert_eq!(first_number("42 applicants"), Some(42));
        assert_eq!(first_number("no digits"), None);
    }

    #[test]
    fn chain_prefers_label_over_attribute() {
        // Both a label pair and a v-date-time are present; the label wins.
        let html = r#"<html><body>
            <dt>Due date</dt><dd>Feb 2, 2099</dd>
            <v-date-time time="2099-01-01T00:00:00Z"></v-date-time>
        </body></html>"#;
        assert_eq!(parse_details(html).due_date, Some("Feb 2, 2099".to_string()));
    }
}
