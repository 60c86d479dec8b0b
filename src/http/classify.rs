// Error classification for failed responses.
// Maps status codes to typed errors and escalates partner-host auth failures.

use std::sync::LazyLock;

use regex::Regex;
use tracing::error;
use url::Url;

use crate::error::FetchError;

use super::request::ErrorOverrides;

/// Host whose 403s are escalated to the bot developer.
pub const DEFAULT_PARTNER_HOST: &str = "api.stratz.com";

/// Longest slice of an error body quoted in a developer diagnostic.
pub const MAX_DIAGNOSTIC_BODY: usize = 1500;

const PARTNER_USER_MESSAGE: &str = "Got a STRATZ auth error. I've notified the bot developer of the issue. Try again in a day or so.";

static RAY_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Cloudflare Ray ID: <strong class="font-semibold">([a-zA-Z0-9]+)</strong>"#)
        .expect("ray id pattern is valid")
});

/// Turn a non-200 status into the matching typed error.
///
/// 404 becomes `NotFound`; everything else is logged and becomes `Http`.
pub fn classify(url: &str, status: u16, overrides: &ErrorOverrides) -> FetchError {
    let message = overrides.message_for(status, url);
    if status == 404 {
        return FetchError::NotFound {
            message,
            url: url.to_string(),
        };
    }

    error!(%url, status, "http {} error", status);
    FetchError::Http {
        message,
        url: url.to_string(),
        status,
    }
}

/// Pull the Cloudflare ray identifier out of a block page, if there is one.
pub fn extract_ray_id(body: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(body).ok()?;
    RAY_ID_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether `url` points at `partner_host`.
pub fn is_partner_host(url: &str, partner_host: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(partner_host)))
        .unwrap_or(false)
}

/// A 403 from the partner API, kept for escalation to the developer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
    pub url: String,
    pub ray_id: Option<String>,
    pub body: Option<String>,
}

impl AuthFailure {
    pub fn new(url: &str, ray_id: Option<String>, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let body = if text.trim().is_empty() {
            None
        } else {
            Some(truncate(&text, MAX_DIAGNOSTIC_BODY).to_string())
        };

        Self {
            url: url.to_string(),
            ray_id,
            body,
        }
    }

    /// Diagnostic for the operator. Never shown to the end user.
    pub fn developer_message(&self) -> String {
        let mut message = format!("Http 403 Auth error on STRATZ request:\n<{}>\n", self.url);
        match &self.ray_id {
            Some(id) => {
                message.push_str(&format!(
                    "\nGotta complain in discord using this cloudflare ID: {}",
                    id
                ));
            }
            None => {
                message.push_str(
                    "\nAPI token probably expired. Gotta get new one: <https://stratz.com/api>",
                );
            }
        }
        if let Some(body) = &self.body {
            message.push_str(&format!("\n```{}```", body));
        }
        message
    }

    pub fn into_error(self) -> FetchError {
        FetchError::DeveloperNotif {
            user_message: PARTNER_USER_MESSAGE.to_string(),
            developer_message: self.developer_message(),
        }
    }
}

/// Cut `text` to at most `max` bytes on a char boundary.
fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
