use async_trait::async_trait;
use serde_json::{Value, json};

use crate::models::WebhookTemplate;

use super::context::ProcessContext;
use super::template;
use super::{DestinationKind, DestinationVariant, ProcessError};

pub struct WebhookVariant {
    client: reqwest::Client,
}

impl WebhookVariant {
    pub fn new() -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self { client })
    }

    fn parse_template(value: &Value) -> Result<WebhookTemplate, ProcessError> {
        let tmpl: WebhookTemplate = serde_json::from_value(value.clone())
            .map_err(|e| ProcessError::Permanent(format!("Malformed webhook template: {e}")))?;
        if !tmpl.url.starts_with("http://") && !tmpl.url.starts_with("https://") {
            return Err(ProcessError::Permanent(
                "url must be an http(s) URL".into(),
            ));
        }
        Ok(tmpl)
    }
}

#[async_trait]
impl DestinationVariant for WebhookVariant {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Webhook
    }

    fn is_valid(&self, value: &str) -> bool {
        value.starts_with("http://") || value.starts_with("https://")
    }

    async fn create_attachment(
        &self,
        _destination: &crate::models::Destination,
        _endpoint: &crate::models::Endpoint,
        args: &Value,
    ) -> Result<Value, ProcessError> {
        Self::parse_template(args)?;
        Ok(args.clone())
    }

    async fn process(
        &self,
        ctx: &ProcessContext,
        _destination: &crate::models::Destination,
        attachment: &crate::models::EndpointDestination,
    ) -> Result<Option<Value>, ProcessError> {
        let tmpl = Self::parse_template(&attachment.template)?;
        let url = template::render(&tmpl.url, ctx);

        let body = json!({
            "data": &ctx.submission.data,
            "endpoint": &ctx.endpoint.name,
            "submission_id": &ctx.submission.id,
            "submitted_at": &ctx.submission.created_at,
        });

        let mut req = match tmpl.method.as_deref() {
            Some("PUT") => self.client.put(&url),
            _ => self.client.post(&url),
        };
        for (k, v) in &tmpl.headers {
            req = req.header(k, template::render(v, ctx));
        }

        let resp = req
            .json(&body)
            .send()
            .await
            .map_err(|e| ProcessError::Transient(format!("Webhook request failed: {e}")))?;

        let status = resp.status().as_u16();
        let resp_body: String = resp
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(1024)
            .collect();

        if (200..300).contains(&status) {
            Ok(Some(json!({ "status_code": status, "body": resp_body })))
        } else {
            let msg = format!("Webhook returned {status}: {resp_body}");
            Err(if status == 429 || status >= 500 {
                ProcessError::Transient(msg)
            } else {
                ProcessError::Permanent(msg)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn template_requires_http_url() {
        assert!(WebhookVariant::parse_template(&json!({"url": "https://example.com/hook"})).is_ok());
        assert!(WebhookVariant::parse_template(&json!({"url": "ftp://example.com"})).is_err());
        assert!(WebhookVariant::parse_template(&json!({})).is_err());
    }
}
