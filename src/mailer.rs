//! Email delivery of generated artifacts over authenticated SMTP.

use std::path::Path;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::{error, info};

use crate::error::{CourseLensError, Result};

/// Mail relay settings, read from the process environment.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub receivers: Vec<String>,
}

impl MailConfig {
    pub fn from_env() -> Result<Self> {
        let get = |key: &str| {
            std::env::var(key)
                .map_err(|_| CourseLensError::Config(format!("Missing environment variable: {key}")))
        };

        let port = get("EMAIL_PORT")?
            .parse()
            .map_err(|_| CourseLensError::Config("EMAIL_PORT must be a port number".to_string()))?;

        let receivers = get("EMAIL_RECEIVERS")?
            .split(',')
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        Ok(Self {
            host: get("EMAIL_HOST")?,
            port,
            username: get("EMAIL_USERNAME")?,
            password: get("EMAIL_PASSWORD")?,
            receivers,
        })
    }
}

fn content_type_for(path: &Path) -> ContentType {
    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("mp3") => "audio/mpeg",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    };
    ContentType::parse(mime).unwrap_or(ContentType::TEXT_PLAIN)
}

/// Construct the multipart message: a plain-text body plus zero or more
/// binary attachments with extension-appropriate MIME subtypes. Split out
/// from `send` so message construction is testable without a transport.
pub fn build_message(
    from: &str,
    recipients: &[String],
    subject: &str,
    body: &str,
    attachments: &[&Path],
) -> Result<Message> {
    let mut builder = Message::builder()
        .from(from.parse::<Mailbox>()?)
        .subject(subject);
    for recipient in recipients {
        builder = builder.to(recipient.parse()?);
    }

    let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(body.to_string()));
    for path in attachments {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        multipart = multipart.singlepart(Attachment::new(filename).body(bytes, content_type_for(path)));
    }

    Ok(builder.multipart(multipart)?)
}

/// Send the message to all recipients. This is the one boundary where
/// failures are swallowed into a boolean: every failure (config, address,
/// connect, auth, send) is logged and reported as `false`.
pub fn send(
    config: &MailConfig,
    recipients: &[String],
    subject: &str,
    body: &str,
    attachments: &[&Path],
) -> bool {
    match try_send(config, recipients, subject, body, attachments) {
        Ok(()) => {
            info!("Email sent to {}", recipients.join(", "));
            true
        }
        Err(e) => {
            error!("Email Error: {e}");
            false
        }
    }
}

/// Read the relay settings from the environment and send. A configuration
/// failure is swallowed like any other delivery failure.
pub fn send_from_env(recipients: &[String], subject: &str, body: &str, attachments: &[&Path]) -> bool {
    match MailConfig::from_env() {
        Ok(config) => send(&config, recipients, subject, body, attachments),
        Err(e) => {
            error!("Email Error: {e}");
            false
        }
    }
}

fn try_send(
    config: &MailConfig,
    recipients: &[String],
    subject: &str,
    body: &str,
    attachments: &[&Path],
) -> Result<()> {
    if recipients.is_empty() {
        return Err(CourseLensError::Config("No recipients configured".to_string()));
    }

    let message = build_message(&config.username, recipients, subject, body, attachments)?;

    let credentials = Credentials::new(config.username.clone(), config.password.clone());
    let transport = SmtpTransport::starttls_relay(&config.host)?
        .credentials(credentials)
        .port(config.port)
        .build();

    transport.send(&message)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipients() -> Vec<String> {
        vec!["analyst@example.com".to_string()]
    }

    #[test]
    fn test_zero_attachments_still_builds_valid_multipart() {
        let message = build_message(
            "sender@example.com",
            &recipients(),
            "Daily Course Insights - 2024-06-01",
            "Attached are your latest daily insights.",
            &[],
        )
        .unwrap();

        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("multipart/mixed"));
        assert!(formatted.contains("Attached are your latest daily insights."));
        assert!(formatted.contains("Subject: Daily Course Insights - 2024-06-01"));
    }

    #[test]
    fn test_attachments_get_extension_appropriate_subtypes() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("auto_podcast.mp3");
        let document = dir.path().join("auto_insights.pdf");
        std::fs::write(&audio, b"mp3 bytes").unwrap();
        std::fs::write(&document, b"pdf bytes").unwrap();

        let message = build_message(
            "sender@example.com",
            &recipients(),
            "Report",
            "body",
            &[audio.as_path(), document.as_path()],
        )
        .unwrap();

        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("audio/mpeg"));
        assert!(formatted.contains("application/pdf"));
        assert!(formatted.contains("auto_podcast.mp3"));
        assert!(formatted.contains("auto_insights.pdf"));
    }

    #[test]
    fn test_multiple_recipients_are_addressed() {
        let many = vec![
            "one@example.com".to_string(),
            "two@example.com".to_string(),
        ];
        let message = build_message("sender@example.com", &many, "s", "b", &[]).unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("one@example.com"));
        assert!(formatted.contains("two@example.com"));
    }

    #[test]
    fn test_invalid_recipient_is_an_error() {
        let bad = vec!["not an address".to_string()];
        assert!(build_message("sender@example.com", &bad, "s", "b", &[]).is_err());
    }

    #[test]
    fn test_send_swallows_transport_failure_into_false() {
        let config = MailConfig {
            host: "smtp.invalid.localdomain".to_string(),
            port: 2525,
            username: "sender@example.com".to_string(),
            password: "secret".to_string(),
            receivers: recipients(),
        };

        assert!(!send(&config, &recipients(), "subject", "body", &[]));
    }

    #[test]
    fn test_send_from_env_without_configuration_is_false() {
        std::env::remove_var("EMAIL_HOST");
        assert!(!send_from_env(&recipients(), "subject", "body", &[]));
    }

    #[test]
    fn test_mail_config_requires_all_variables() {
        std::env::remove_var("EMAIL_HOST");
        let err = MailConfig::from_env().unwrap_err();
        assert!(matches!(err, CourseLensError::Config(_)));
    }

    #[test]
    fn test_send_with_no_recipients_is_false_not_a_panic() {
        let config = MailConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "sender@example.com".to_string(),
            password: "secret".to_string(),
            receivers: Vec::new(),
        };

        assert!(!send(&config, &[], "subject", "body", &[]));
    }
}
