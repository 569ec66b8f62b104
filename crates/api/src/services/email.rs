//! Transactional email over SMTP.
//!
//! Uses lettre for delivery with Askama templates, one HTML and one plain
//! text rendering per message.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::SmtpConfig;
use crate::models::Order;
use crate::services::auth::otp::OTP_TTL_MINUTES;

#[derive(Template)]
#[template(path = "email/otp.html")]
struct OtpEmailHtml<'a> {
    store_name: &'a str,
    code: &'a str,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/otp.txt")]
struct OtpEmailText<'a> {
    store_name: &'a str,
    code: &'a str,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderEmailHtml<'a> {
    name: &'a str,
    order_number: &'a str,
    lines: &'a [(String, String)],
    total: String,
    payment_method: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderEmailText<'a> {
    name: &'a str,
    order_number: &'a str,
    lines: &'a [(String, String)],
    total: String,
    payment_method: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay host is invalid.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send a sign-in code.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_otp(&self, to: &str, store_name: &str, code: &str) -> Result<(), EmailError> {
        let html = OtpEmailHtml {
            store_name,
            code,
            ttl_minutes: OTP_TTL_MINUTES,
        }
        .render()?;
        let text = OtpEmailText {
            store_name,
            code,
            ttl_minutes: OTP_TTL_MINUTES,
        }
        .render()?;

        self.send_multipart_email(to, &format!("Your {store_name} sign-in code"), &text, &html)
            .await
    }

    /// Send an order confirmation to the customer.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        name: &str,
        order: &Order,
    ) -> Result<(), EmailError> {
        let lines: Vec<(String, String)> = order
            .items
            .iter()
            .map(|item| {
                (
                    format!("{} x {}", item.name, item.quantity),
                    item.line_total().to_string(),
                )
            })
            .collect();
        let total = order.total.to_string();
        let payment_method = order.payment_method.as_str();

        let html = OrderEmailHtml {
            name,
            order_number: &order.order_number,
            lines: &lines,
            total: total.clone(),
            payment_method,
        }
        .render()?;
        let text = OrderEmailText {
            name,
            order_number: &order.order_number,
            lines: &lines,
            total,
            payment_method,
        }
        .render()?;

        self.send_multipart_email(
            to,
            &format!("Order {} received", order.order_number),
            &text,
            &html,
        )
        .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_templates_render_code() {
        let html = OtpEmailHtml {
            store_name: "Drape",
            code: "482913",
            ttl_minutes: OTP_TTL_MINUTES,
        }
        .render()
        .unwrap();
        assert!(html.contains("482913"));
        assert!(html.contains("10 minutes"));

        let text = OtpEmailText {
            store_name: "Drape",
            code: "482913",
            ttl_minutes: OTP_TTL_MINUTES,
        }
        .render()
        .unwrap();
        assert!(text.contains("Your sign-in code is: 482913"));
    }

    #[test]
    fn test_order_template_lists_lines() {
        let lines = vec![("Banarasi Silk x 2".to_string(), "5998.00".to_string())];
        let text = OrderEmailText {
            name: "Meera",
            order_number: "DRP-20260101-ABC123",
            lines: &lines,
            total: "6047.00".to_string(),
            payment_method: "cod",
        }
        .render()
        .unwrap();
        assert!(text.contains("DRP-20260101-ABC123"));
        assert!(text.contains("Banarasi Silk x 2  Rs. 5998.00"));
        assert!(text.contains("Total: Rs. 6047.00"));
    }
}
