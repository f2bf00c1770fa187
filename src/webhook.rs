use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{JobListing, NOT_AVAILABLE};

/// Ceiling on delivery attempts for one message; sustained throttling fails
/// visibly instead of retrying forever.
const MAX_SEND_ATTEMPTS: u32 = 3;
/// Wait when a 429 carries no usable retry_after.
const DEFAULT_RETRY_AFTER: f64 = 5.0;
/// Cap on server-suggested waits.
const MAX_RETRY_AFTER: f64 = 60.0;
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivery seam between the orchestrator and the webhook endpoint.
pub trait Notify {
    fn send_job(&self, job: &JobListing) -> bool;
}

#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
pub struct Embed {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Thumbnail>,
    pub fields: Vec<EmbedField>,
    pub footer: Footer,
}

#[derive(Debug, Serialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Serialize)]
pub struct Footer {
    pub text: String,
}

/// What a single POST came back with.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PostOutcome {
    Delivered,
    RateLimited { retry_after: Duration },
    Rejected,
}

pub struct WebhookClient {
    http: reqwest::blocking::Client,
    url: String,
    thumbnail_url: String,
    footer_text: String,
}

impl WebhookClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .build()
            .context("failed to build webhook HTTP client")?;
        Ok(Self {
            http,
            url: config.webhook_url.clone(),
            thumbnail_url: config.thumbnail_url.clone(),
            footer_text: config.footer_text.clone(),
        })
    }

    fn build_embed(&self, job: &JobListing) -> Embed {
        let mut fields = Vec::new();

        if !job.budget.is_empty() {
            fields.push(EmbedField {
                name: "\u{1F4B0} Budget".to_string(),
                value: job.budget.clone(),
                inline: true,
            });
        }
        if !job.category.is_empty() {
            fields.push(EmbedField {
                name: "\u{1F4C1} Category".to_string(),
                value: job.category.clone(),
                inline: true,
            });
        }
        fields.push(EmbedField {
            name: "\u{1F4CA} Status".to_string(),
            value: format!("{} {}", job.status.glyph(), job.status),
            inline: true,
        });
        fields.push(EmbedField {
            name: "\u{1F4DD} Applications".to_string(),
            value: job.applications.to_string(),
            inline: true,
        });
        fields.push(EmbedField {
            name: "\u{1F441}\u{FE0F} Views".to_string(),
            value: job.views.to_string(),
            inline: true,
        });
        if !job.due_date.is_empty() && job.due_date != NOT_AVAILABLE {
            fields.push(EmbedField {
                name: "\u{23F0} Due Date".to_string(),
                value: job.due_date.clone(),
                inline: true,
            });
        }

        Embed {
            title: job.title.clone(),
            url: Some(job.url.clone()),
            description: job.description.clone(),
            color: job.status.color(),
            thumbnail: Some(Thumbnail {
                url: self.thumbnail_url.clone(),
            }),
            fields,
            footer: Footer {
                text: self.footer_text.clone(),
            },
        }
    }

    fn post_payload(&self, payload: &WebhookPayload) -> Result<PostOutcome> {
        let response = self
            .http
            .post(&self.url)
            .timeout(SEND_TIMEOUT)
            .json(payload)
            .send()
            .context("failed to reach the webhook endpoint")?;

        let status = response.status();
        if status.as_u16() == 204 {
            return Ok(PostOutcome::Delivered);
        }
        if status.as_u16() == 429 {
            let secs = response
                .json::<serde_json::Value>()
                .ok()
                .and_then(|body| body.get("retry_after").and_then(|v| v.as_f64()))
                .unwrap_or(DEFAULT_RETRY_AFTER)
                .clamp(0.0, MAX_RETRY_AFTER);
            return Ok(PostOutcome::RateLimited {
                retry_after: Duration::from_secs_f64(secs),
            });
        }

        let body = response.text().unwrap_or_default();
        warn!("webhook rejected the message: {} - {}", status, body);
        Ok(PostOutcome::Rejected)
    }

    /// Sends a static probe embed; used once at startup before the polling
    /// loop begins.
    pub fn test_connectivity(&self) -> bool {
        let payload = WebhookPayload {
            embeds: vec![Embed {
                title: "\u{1F680} Job market watcher started".to_string(),
                url: None,
                description: "Watching for new job listings.".to_string(),
                color: 0x00FF00,
                thumbnail: None,
                fields: Vec::new(),
                footer: Footer {
                    text: self.footer_text.clone(),
                },
            }],
        };
        let delivered = deliver_with(
            MAX_SEND_ATTEMPTS,
            || self.post_payload(&payload),
            std::thread::sleep,
        );
        if delivered {
            info!("webhook connectivity test passed");
        }
        delivered
    }
}

impl Notify for WebhookClient {
    fn send_job(&self, job: &JobListing) -> bool {
        let payload = WebhookPayload {
            embeds: vec![self.build_embed(job)],
        };
        let delivered = deliver_with(
            MAX_SEND_ATTEMPTS,
            || self.post_payload(&payload),
            std::thread::sleep,
        );
        if delivered {
            info!("sent listing: {}", job.title);
        }
        delivered
    }
}

/// Bounded delivery loop: a 429 sleeps the server-suggested duration and
/// retries the same message until the attempt budget runs out; every other
/// failure is final.
fn deliver_with(
    max_attempts: u32,
    mut post: impl FnMut() -> Result<PostOutcome>,
    mut sleep: impl FnMut(Duration),
) -> bool {
    for attempt in 1..=max_attempts {
        match post() {
            Ok(PostOutcome::Delivered) => return true,
            Ok(PostOutcome::RateLimited { retry_after }) => {
                if attempt == max_attempts {
                    warn!(
                        "still rate limited after {} attempts, giving up on this message",
                        max_attempts
                    );
                    return false;
                }
                warn!("rate limited, waiting {:.1}s", retry_after.as_secs_f64());
                sleep(retry_after);
            }
            Ok(PostOutcome::Rejected) => return false,
            Err(e) => {
                warn!("delivery failed: {:#}", e);
                return false;
            }
        }
    }
    false
}
