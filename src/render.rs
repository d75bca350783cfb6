// SPDX-License-Identifier: Apache-2.0
use serde::Serialize;
use std::fmt::Write;
use tracing::instrument;

use crate::config::{EmailSection, SequenceConfig};
use crate::nonce::SUBMIT_ACTION;

/// Client script, inlined when the page has to stand on its own
pub const FORM_SCRIPT: &str = include_str!("../static/form-submission.js");
pub const FORM_SCRIPT_PATH: &str = "/static/form-submission.js";

/// Where the browser sends the assembled payload
#[derive(Debug, Clone)]
pub enum FormTarget {
    /// Straight to the webhook with the API key in the page
    Direct,
    /// JSON body to the REST route
    Rest { url: String },
    /// Form-encoded body with a nonce to the relay route
    Relay { url: String, nonce: String },
}

#[derive(Debug, Clone)]
pub enum ScriptSource {
    Inline,
    Url(String),
}

/// Settings object handed to the client script as `window.seqgateSettings`
#[derive(Debug, Serialize)]
pub struct ClientSettings<'a> {
    pub form_id: &'a str,
    pub topic: &'a str,
    pub brevo_list_id: i64,
    pub total_emails: i64,
    pub days_between_emails: i64,
    pub topic_depth: i64,
    pub email_structure: &'a [EmailSection],
    pub context: &'a str,
    pub custom_inputs: Vec<&'a str>,
    pub success_url: Option<&'a str>,
    pub mode: &'static str,
    pub submit_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<&'a str>,
}

impl<'a> ClientSettings<'a> {
    pub fn new(config: &'a SequenceConfig, target: &'a FormTarget) -> Self {
        let (mode, submit_url, api_key, action, nonce) = match target {
            FormTarget::Direct => ("direct", config.api_endpoint.as_str(), config.api_key(), None, None),
            FormTarget::Rest { url } => ("rest", url.as_str(), None, None, None),
            FormTarget::Relay { url, nonce } => {
                ("relay", url.as_str(), None, Some(SUBMIT_ACTION), Some(nonce.as_str()))
            }
        };

        Self {
            form_id: &config.form_id,
            topic: &config.topic,
            brevo_list_id: config.list_id,
            total_emails: config.total_emails,
            days_between_emails: config.days_between_emails,
            topic_depth: config.topic_depth,
            email_structure: &config.email_structure,
            context: &config.context,
            custom_inputs: config.custom_inputs.iter().map(|input| input.name.as_str()).collect(),
            success_url: config.success_url.as_deref(),
            mode,
            submit_url,
            api_key,
            action,
            nonce,
        }
    }

    /// JSON safe to drop inside a `<script>` element
    pub fn to_script_json(&self) -> Result<String, serde_json::Error> {
        Ok(serde_json::to_string(self)?.replace('<', "\\u003c"))
    }
}

/// Escape HTML entities
pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Markup for the signup form alone
pub fn render_form(config: &SequenceConfig) -> String {
    let form_id = escape_html(&config.form_id);
    let mut html = String::new();

    let _ = write!(
        html,
        r#"<form id="{form_id}" class="email-sequence-form">
    <input type="hidden" name="form_id" value="{form_id}">
    <input type="hidden" name="topic" value="{topic}">
    <input type="hidden" name="brevo_list_id" value="{list_id}">

    <div class="form-group">
        <label for="first_name">First Name:</label>
        <input type="text" id="first_name" name="first_name" required>
    </div>

    <div class="form-group">
        <label for="email">Email:</label>
        <input type="email" id="email" name="email" required>
    </div>
"#,
        topic = escape_html(&config.topic),
        list_id = config.list_id,
    );

    for input in &config.custom_inputs {
        let name = escape_html(&input.name);
        let _ = write!(
            html,
            r#"
    <div class="form-group">
        <label for="{name}">{label}</label>
        <input type="text" id="{name}" name="{name}" required>
    </div>
"#,
            label = escape_html(&input.label),
        );
    }

    html.push_str(
        r#"
    <div class="form-group">
        <label for="timezone">Timezone:</label>
        <select id="timezone" name="timezone" required></select>
    </div>

    <div class="form-group">
        <label for="preferred_time">Preferred Time:</label>
        <input type="time" id="preferred_time" name="preferred_time" required>
    </div>

    <button type="submit">Submit</button>
</form>
"#,
    );
    html
}

/// Form plus the settings object and client script
pub fn render_embed(
    config: &SequenceConfig,
    target: &FormTarget,
    script: &ScriptSource,
) -> Result<String, serde_json::Error> {
    let settings = ClientSettings::new(config, target).to_script_json()?;
    let script_tag = match script {
        ScriptSource::Inline => format!("<script>\n{}</script>", FORM_SCRIPT),
        ScriptSource::Url(src) => format!(r#"<script src="{}" defer></script>"#, escape_html(src)),
    };

    Ok(format!(
        "{form}<script>window.seqgateSettings = {settings};</script>\n{script_tag}\n",
        form = render_form(config),
    ))
}

/// A complete HTML document hosting the form
#[instrument(skip_all, fields(form_id = %config.form_id))]
pub fn render_page(
    config: &SequenceConfig,
    target: &FormTarget,
    script: &ScriptSource,
) -> Result<String, serde_json::Error> {
    let embed = render_embed(config, target, script)?;
    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 600px;
            margin: 0 auto;
            padding: 20px;
        }}
        .form-group {{
            margin-bottom: 16px;
        }}
        .form-group label {{
            display: block;
            margin-bottom: 4px;
        }}
        .form-group input, .form-group select {{
            width: 100%;
            padding: 8px;
            box-sizing: border-box;
        }}
    </style>
</head>
<body>
    <h1>{title}</h1>
{embed}</body>
</html>
"#,
        title = escape_html(&config.topic),
    ))
}
