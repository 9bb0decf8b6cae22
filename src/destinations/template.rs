use std::sync::LazyLock;

use regex::Regex;

use super::context::ProcessContext;

static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+(?:\.\w+)*)\}\}").unwrap());

/// Replace {{variable}} placeholders with values from the context.
pub fn render(template: &str, ctx: &ProcessContext) -> String {
    TEMPLATE_RE
        .replace_all(template, |caps: &regex::Captures| {
            let path = &caps[1];
            resolve(path, ctx).unwrap_or_default()
        })
        .to_string()
}

fn resolve(path: &str, ctx: &ProcessContext) -> Option<String> {
    let parts: Vec<&str> = path.splitn(2, '.').collect();
    match parts.as_slice() {
        ["data", field] => json_string_field(&ctx.submission.data, field),
        ["endpoint", "name"] => Some(ctx.endpoint.name.clone()),
        ["endpoint", "id"] => Some(ctx.endpoint.id.to_string()),
        ["submission", "id"] => Some(ctx.submission.id.to_string()),
        ["submission", "created_at"] => Some(ctx.submission.created_at.to_rfc3339()),
        ["submission", "referrer"] => ctx.submission.referrer.clone(),
        _ => None,
    }
}

fn json_string_field(value: &serde_json::Value, field: &str) -> Option<String> {
    match value.get(field)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use crate::models::{Endpoint, Submission};

    use super::*;

    fn ctx() -> ProcessContext {
        let endpoint = Endpoint {
            id: Uuid::now_v7(),
            organization_id: Uuid::now_v7(),
            name: "contact".into(),
            token: None,
            redirect_url: None,
            referrer_pattern: None,
            strict: false,
            fields: None,
            created_at: Utc::now(),
        };
        let submission = Submission {
            id: Uuid::now_v7(),
            endpoint_id: endpoint.id,
            data: json!({"name": "Alice", "count": 3}),
            referrer: Some("https://example.com/form".into()),
            user_agent: None,
            ip: None,
            created_at: Utc::now(),
        };
        ProcessContext {
            submission,
            endpoint,
        }
    }

    #[test]
    fn renders_data_fields() {
        let ctx = ctx();
        assert_eq!(render("Hi {{data.name}}", &ctx), "Hi Alice");
        assert_eq!(render("n={{data.count}}", &ctx), "n=3");
    }

    #[test]
    fn unknown_placeholders_render_empty() {
        let ctx = ctx();
        assert_eq!(render("x{{data.missing}}y", &ctx), "xy");
        assert_eq!(render("{{nope.nope}}", &ctx), "");
    }

    #[test]
    fn renders_endpoint_and_submission_vars() {
        let ctx = ctx();
        assert_eq!(render("{{endpoint.name}}", &ctx), "contact");
        assert_eq!(
            render("{{submission.id}}", &ctx),
            ctx.submission.id.to_string()
        );
    }
}
