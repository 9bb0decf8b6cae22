use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::{Value, json};

use crate::config::SmtpConfig;
use crate::models::EmailTemplate;

use super::context::ProcessContext;
use super::template;
use super::{DestinationKind, DestinationVariant, ProcessError};

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl Mailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("SMTP error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .build();
        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }

    async fn send(
        &self,
        sender: Option<&str>,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), ProcessError> {
        let from = sender.unwrap_or(&self.from);
        let message = Message::builder()
            .from(
                from.parse()
                    .map_err(|e| ProcessError::Permanent(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| ProcessError::Permanent(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| ProcessError::Permanent(format!("Failed to build email: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ProcessError::Transient(format!("Failed to send email: {e}")))?;
        Ok(())
    }
}

/// Gmail and plain email destinations share one SMTP delivery path; they
/// differ only in kind tag and default sender semantics.
pub struct EmailVariant {
    kind: DestinationKind,
    mailer: Option<Arc<Mailer>>,
}

impl EmailVariant {
    pub fn new(kind: DestinationKind, mailer: Option<Arc<Mailer>>) -> Self {
        debug_assert!(matches!(
            kind,
            DestinationKind::Gmail | DestinationKind::Email
        ));
        Self { kind, mailer }
    }

    fn parse_template(value: &Value) -> Result<EmailTemplate, ProcessError> {
        let mut tmpl: EmailTemplate = serde_json::from_value(value.clone())
            .map_err(|e| ProcessError::Permanent(format!("Malformed email template: {e}")))?;
        // An omitted recipient defaults to the sender address.
        if tmpl.to.is_empty() {
            match tmpl.sender.as_deref() {
                Some(sender) if !sender.is_empty() => tmpl.to = sender.to_string(),
                _ => {
                    return Err(ProcessError::Permanent(
                        "to is required when no sender is set".into(),
                    ));
                }
            }
        }
        for (name, field) in [("subject", &tmpl.subject), ("body", &tmpl.body)] {
            if field.is_empty() {
                return Err(ProcessError::Permanent(format!("{name} is required")));
            }
        }
        Ok(tmpl)
    }
}

#[async_trait]
impl DestinationVariant for EmailVariant {
    fn kind(&self) -> DestinationKind {
        self.kind
    }

    fn is_valid(&self, value: &str) -> bool {
        value.contains('@') && !value.contains(char::is_whitespace)
    }

    async fn create_attachment(
        &self,
        _destination: &crate::models::Destination,
        _endpoint: &crate::models::Endpoint,
        args: &Value,
    ) -> Result<Value, ProcessError> {
        // Validate the template shape up front; the blob is stored as-is.
        Self::parse_template(args)?;
        Ok(args.clone())
    }

    async fn process(
        &self,
        ctx: &ProcessContext,
        _destination: &crate::models::Destination,
        attachment: &crate::models::EndpointDestination,
    ) -> Result<Option<Value>, ProcessError> {
        let mailer = self.mailer.as_ref().ok_or_else(|| {
            ProcessError::Permanent("SMTP transport is not configured".into())
        })?;

        let tmpl = Self::parse_template(&attachment.template)?;
        let to = template::render(&tmpl.to, ctx);
        let subject = template::render(&tmpl.subject, ctx);
        let body = template::render(&tmpl.body, ctx);

        mailer
            .send(tmpl.sender.as_deref(), &to, &subject, &body)
            .await?;

        Ok(Some(json!({ "message": "Email sent", "to": to })))
    }
}
