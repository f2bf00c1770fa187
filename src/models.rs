use serde::{Deserialize, Serialize};

/// Sentinel for fields the markup did not provide.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Apply,
    InProgress,
    Negotiations,
    Finished,
    Other,
}

impl JobStatus {
    /// Parses only statuses the site actually renders on detail pages.
    /// Returns None for arbitrary text so a stray "status" element can't
    /// overwrite the listing default.
    pub fn parse_known(s: &str) -> Option<Self> {
        match s.trim() {
            "Apply" => Some(JobStatus::Apply),
            "In Progress" => Some(JobStatus::InProgress),
            "Negotiations" => Some(JobStatus::Negotiations),
            "Finished" => Some(JobStatus::Finished),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Apply => "Apply",
            JobStatus::InProgress => "In Progress",
            JobStatus::Negotiations => "Negotiations",
            JobStatus::Finished => "Finished",
            JobStatus::Other => "Other",
        }
    }

    /// A job is still open for work in these states.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobStatus::Apply | JobStatus::InProgress | JobStatus::Negotiations
        )
    }

    /// Embed accent color by status.
    pub fn color(&self) -> u32 {
        match self {
            JobStatus::Apply => 0x00FF00,
            JobStatus::InProgress => 0xFFFF00,
            JobStatus::Negotiations => 0xFFA500,
            JobStatus::Finished => 0x808080,
            JobStatus::Other => 0x3498DB,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            JobStatus::Apply => "\u{1F7E2}",        // green circle
            JobStatus::InProgress => "\u{1F7E1}",   // yellow circle
            JobStatus::Negotiations => "\u{1F7E0}", // orange circle
            JobStatus::Finished => "\u{26AB}",      // black circle
            JobStatus::Other => "\u{1F535}",        // blue circle
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One marketplace job posting, as assembled from the browse page and
/// (optionally) its own detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListing {
    /// Trailing path segment of the canonical URL. Stable across fetches.
    pub job_id: String,
    pub url: String,
    pub title: String,
    pub budget: String,      // free-form price text, "N/A" when absent
    pub category: String,    // "N/A" when absent
    pub applications: u32,
    pub views: u32,
    pub status: JobStatus,
    pub due_date: String,    // raw site text, "N/A" when absent
    pub listed_date: String, // "N/A" when absent
    pub description: String,
}

impl JobListing {
    /// Summary shown in the embed body. The site renders real descriptions
    /// client-side, so this is synthesized from the fields we do have.
    pub fn synthesize_description(&mut self) {
        let plural = if self.applications == 1 { "" } else { "s" };
        self.description = format!(
            "Budget: {} | Category: {} | {} application{}",
            self.budget, self.category, self.applications, plural
        );
    }
}

/// Field overlay produced by the detail enricher. Present fields overwrite
/// the base record; absent fields leave it untouched.
#[derive(Debug, Clone, Default)]
pub struct JobDetails {
    pub status: Option<JobStatus>,
    pub budget: Option<String>,
    pub due_date: Option<String>,
    pub applications: Option<u32>,
    pub views: Option<u32>,
    pub category: Option<String>,
}

impl JobDetails {
    pub fn apply_to(&self, job: &mut JobListing) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(budget) = &self.budget {
            job.budget = budget.clone();
        }
        if let Some(due) = &self.due_date {
            job.due_date = due.clone();
        }
        if let Some(apps) = self.applications {
            job.applications = apps;
        }
        if let Some(views) = self.views {
            job.views = views;
        }
        if let Some(category) = &self.category {
            job.category = category.clone();
        }
        job.synthesize_description();
    }
}
