use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info};

use crate::config::Config;
use crate::error::AppError;

/// Transport d'emails : send(to, subject, html)
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError>;
}

/// Envoi via une API HTTP transactionnelle (POST JSON + Bearer)
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: &str, api_key: Option<String>, from: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.to_string(),
            api_key,
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        let mut request = self.client.post(&self.api_url).json(&json!({
            "from": self.from,
            "to": [to],
            "subject": subject,
            "html": html_body,
        }));

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            error!(%status, to, "Mail API rejected the message");
            return Err(AppError::Internal(format!("Failed to send email: mail API answered {}", status)));
        }

        info!(to, subject, "Email sent");
        Ok(())
    }
}

/// Pas de transport configuré : on journalise seulement (dev local)
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<(), AppError> {
        info!(to, subject, "MAIL_API_URL not set, email not delivered");
        Ok(())
    }
}

pub struct EmailService;

impl EmailService {
    /// Sujet + corps HTML du mail d'activation
    pub fn activation_email(config: &Config, token: &str) -> (String, String) {
        let link = format!("{}/activation/{}", config.frontend_url.trim_end_matches('/'), token);
        let body = format!(
            "<h2>Welcome to LinkUni!</h2>\
             <p>Please click the link below to activate your account:</p>\
             <p><a href=\"{link}\">Activate my account</a></p>\
             <p>This link expires in {minutes} minutes.</p>",
            link = html_escape::encode_double_quoted_attribute(&link),
            minutes = config.activation_expiration_secs / 60,
        );
        ("Activate your LinkUni account".to_string(), body)
    }

    pub fn password_reset_email(config: &Config, firstname: &str, token: &str) -> (String, String) {
        let link = format!("{}/reset-password/{}", config.frontend_url.trim_end_matches('/'), token);
        let body = format!(
            "<p>Hi {name},</p>\
             <p>We received a request to reset your password.</p>\
             <p><a href=\"{link}\">Reset my password</a></p>\
             <p>This link expires in {minutes} minutes. If you did not ask for it, ignore this email.</p>",
            name = html_escape::encode_text(firstname),
            link = html_escape::encode_double_quoted_attribute(&link),
            minutes = config.reset_expiration_secs / 60,
        );
        ("Reset your LinkUni password".to_string(), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_email_links_to_frontend() {
        let config = Config::for_tests();
        let (subject, body) = EmailService::activation_email(&config, "abc.def.ghi");

        assert!(subject.contains("Activate"));
        assert!(body.contains("http://localhost:3000/activation/abc.def.ghi"));
        assert!(body.contains("30 minutes"));
    }

    #[test]
    fn test_reset_email_escapes_name() {
        let config = Config::for_tests();
        let (_, body) = EmailService::password_reset_email(&config, "<b>Eve</b>", "tok");

        assert!(body.contains("&lt;b&gt;Eve&lt;/b&gt;"));
        assert!(!body.contains("<b>Eve"));
        assert!(body.contains("/reset-password/tok"));
        assert!(body.contains("15 minutes"));
    }

    #[test]
    fn test_links_are_attribute_escaped() {
        let mut config = Config::for_tests();
        config.frontend_url = "http://app\" onclick=\"x".to_string();

        let (_, activation) = EmailService::activation_email(&config, "tok");
        let (_, reset) = EmailService::password_reset_email(&config, "Eve", "tok");

        for body in [activation, reset] {
            assert!(body.contains("&quot; onclick=&quot;x"));
            assert!(!body.contains("\" onclick"));
        }
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        assert!(LogMailer.send("a@b.c", "subject", "<p>x</p>").await.is_ok());
    }

    fn direct_mailer(url: &str, api_key: Option<&str>) -> HttpMailer {
        HttpMailer {
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            ..HttpMailer::new(url, api_key.map(str::to_string), "LinkUni <no-reply@linkuni.app>")
        }
    }

    /// Serveur HTTP d'une seule requête : renvoie l'URL et la requête brute reçue
    async fn one_shot_server(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/emails", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..n]);

                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let content_length = text[..end]
                        .lines()
                        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!("HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status_line);
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });

        (url, handle)
    }

    #[tokio::test]
    async fn test_http_mailer_posts_json_with_bearer() {
        let (url, server) = one_shot_server("202 Accepted").await;
        let mailer = direct_mailer(&url, Some("mail-key"));

        mailer.send("lea@uni.ca", "Hello", "<p>hi</p>").await.unwrap();

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /emails"));
        assert!(lower.contains("authorization: bearer mail-key"));
        assert!(lower.contains("content-type: application/json"));

        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["to"], serde_json::json!(["lea@uni.ca"]));
        assert_eq!(json["subject"], "Hello");
        assert_eq!(json["html"], "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_http_mailer_maps_error_status_to_internal() {
        let (url, server) = one_shot_server("500 Internal Server Error").await;
        let mailer = direct_mailer(&url, None);

        let result = mailer.send("lea@uni.ca", "Hello", "<p>hi</p>").await;
        assert!(matches!(result, Err(AppError::Internal(m)) if m.contains("500")));

        let request = server.await.unwrap();
        assert!(!request.to_ascii_lowercase().contains("authorization:"));
    }
}
