use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use crate::services::db_models::Guest;
use crate::types::AppConfig;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Fire-and-forget notifier for new guest registrations. When the Resend
/// credentials are not configured it stays disabled and every call is a
/// logged no-op; a delivery failure never reaches the caller.
#[derive(Clone)]
pub struct EmailNotifier {
    client: reqwest::Client,
    api_key: Option<String>,
    owner: Option<String>,
    enabled: bool,
}

impl EmailNotifier {
    pub fn from_config(config: &AppConfig) -> Self {
        let enabled = config.send_email_on_guest_create
            && config.resend_api_key.is_some()
            && config.email_owner.is_some();

        if !enabled {
            debug!("email notifications disabled");
        }

        Self {
            client: reqwest::Client::new(),
            api_key: config.resend_api_key.clone(),
            owner: config.email_owner.clone(),
            enabled,
        }
    }

    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: None,
            owner: None,
            enabled: false,
        }
    }

    pub async fn notify_guest_created(&self, guest: Guest) {
        if !self.enabled {
            debug!(guest = %guest.name, "skipping guest-created email");
            return;
        }

        match tokio::time::timeout(SEND_TIMEOUT, self.send(&guest)).await {
            Ok(Ok(())) => debug!(guest = %guest.name, "guest-created email sent"),
            Ok(Err(err)) => warn!(guest = %guest.name, error = %err, "guest-created email failed"),
            Err(_) => warn!(guest = %guest.name, "guest-created email timed out"),
        }
    }

    async fn send(&self, guest: &Guest) -> Result<(), reqwest::Error> {
        // `enabled` guarantees both values are present.
        let (Some(api_key), Some(owner)) = (&self.api_key, &self.owner) else {
            return Ok(());
        };

        let body = json!({
            "from": "Wedding API <onboarding@resend.dev>",
            "to": [owner],
            "subject": format!("New guest: {}", guest.name),
            "html": render_guest_html(guest),
        });

        self.client
            .post(RESEND_ENDPOINT)
            .timeout(SEND_TIMEOUT)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

fn render_guest_html(guest: &Guest) -> String {
    let row = |label: &str, value: &str| {
        format!("<tr><td><strong>{label}</strong></td><td>{value}</td></tr>")
    };

    let mut rows = String::new();
    rows.push_str(&row("Name", &guest.name));
    rows.push_str(&row("Email", guest.email.as_deref().unwrap_or("Not provided")));
    rows.push_str(&row("Phone", guest.phone.as_deref().unwrap_or("Not provided")));
    rows.push_str(&row(
        "Attendance",
        if guest.attending { "Confirmed" } else { "Pending" },
    ));
    rows.push_str(&row("Meal type", &guest.meal_type));
    rows.push_str(&row(
        "Needs transport",
        if guest.needs_transport { "Yes" } else { "No" },
    ));
    rows.push_str(&row("Allergies", guest.allergies.as_deref().unwrap_or("None")));
    rows.push_str(&row("Notes", guest.notes.as_deref().unwrap_or("None")));

    format!(
        "<h3>New guest registered</h3><table>{rows}</table>\
         <p>This is an automated message from the guest management system.</p>"
    )
}
