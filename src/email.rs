use crate::config::AppConfig;
use crate::errors::AppError;
use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

pub const OTP_SUBJECT: &str = "Verify Your Email";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, recipient: &str, subject: &str, body: &str)
        -> Result<(), AppError>;
}

/// Plain-text body of the verification email.
pub fn otp_email_body(
    name: &str,
    otp: &str,
    client_ip: Option<&str>,
    valid_minutes: u64,
    frontend_origin: &str,
) -> String {
    let name = if name.trim().is_empty() { "User" } else { name.trim() };
    format!(
        "Hello {name},\n\n\
         You need to verify your email address to continue using ClimeCast.\n\
         Enter the following code to verify your email address:\n\n\
         {otp}\n\n\
         This OTP is valid for {valid_minutes} minutes only.\n\
         If you did not request this, please ignore this email.\n\n\
         The request originated from IP address: {ip}\n\n\
         Thank you,\nClimeCast Team\n{frontend_origin}\n",
        ip = client_ip.unwrap_or("Unknown"),
    )
}

pub struct LettreEmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl LettreEmailSender {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());
        let invalid_host = |e: lettre::transport::smtp::Error| {
            AppError::ConfigError(format!("Invalid SMTP host {}: {}", config.smtp_server, e))
        };

        // Port 1025 is a local catcher (Mailpit) without TLS or auth.
        let mailer = if config.smtp_port == 1025 {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_server)
                .port(config.smtp_port)
                .build()
        } else if config.smtp_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
                .map_err(invalid_host)?
                .port(config.smtp_port)
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server)
                .map_err(invalid_host)?
                .port(config.smtp_port)
                .credentials(creds)
                .build()
        };

        let from = format!("{} <{}>", config.mail_from_name, config.mail_from)
            .parse()
            .map_err(|e| AppError::ConfigError(format!("Invalid SMTP_MAIL_FROM: {}", e)))?;

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl EmailSender for LettreEmailSender {
    async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), AppError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| AppError::EmailError(format!("Invalid recipient {}: {}", recipient, e)))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| AppError::EmailError(e.to_string()))?;

        let response = self
            .mailer
            .send(message)
            .await
            .map_err(|e| AppError::EmailError(e.to_string()))?;
        debug!(code = %response.code(), "email accepted by relay");
        Ok(())
    }
}
