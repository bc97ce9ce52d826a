//! Click event model for asynchronous click accounting.

use chrono::{DateTime, Utc};

/// A redirect that should be counted against its link.
///
/// Created on the redirect path and handed to
/// [`crate::domain::click_worker::run_click_worker`] through a bounded channel,
/// so counting never delays the redirect response.
#[derive(Debug, Clone)]
pub struct ClickEvent {
    pub link_id: u64,
    pub short_code: String,
    pub clicked_at: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

impl ClickEvent {
    pub fn new(
        link_id: u64,
        short_code: String,
        ip: Option<String>,
        user_agent: Option<&str>,
        referer: Option<&str>,
    ) -> Self {
        Self {
            link_id,
            short_code,
            clicked_at: Utc::now(),
            ip,
            user_agent: user_agent.map(|s| s.to_string()),
            referer: referer.map(|s| s.to_string()),
        }
    }
}
