// SPDX-License-Identifier: Apache-2.0
use serde::Deserialize;
use std::fmt::Write;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{EmailSection, SequenceConfig};
use crate::render::escape_html;

/// A rejected settings field; the previous value stays in place
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("The email structure must be valid JSON.")]
    InvalidJson(String),

    #[error("The email structure must be a JSON array of objects with 'name', 'word_count' and 'description' fields.")]
    InvalidStructure(String),

    #[error("{0} must be a whole number.")]
    InvalidNumber(&'static str),
}

/// Admin settings submission. Absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    pub api_key: Option<String>,
    pub form_id: Option<String>,
    pub topic: Option<String>,
    pub brevo_list_id: Option<String>,
    pub total_emails: Option<String>,
    pub days_between_emails: Option<String>,
    pub topic_depth: Option<String>,
    pub email_structure: Option<String>,
    pub context: Option<String>,
}

fn parse_email_structure(input: &str) -> Result<Vec<EmailSection>, SettingsError> {
    let value: serde_json::Value =
        serde_json::from_str(input).map_err(|e| SettingsError::InvalidJson(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| SettingsError::InvalidStructure(e.to_string()))
}

fn apply_number(
    target: &mut i64,
    input: Option<String>,
    label: &'static str,
    errors: &mut Vec<SettingsError>,
) {
    if let Some(raw) = input {
        match raw.trim().parse::<i64>() {
            Ok(value) => *target = value,
            Err(_) => errors.push(SettingsError::InvalidNumber(label)),
        }
    }
}

/// Apply an admin update to `config`.
///
/// Every field that validates is written; fields that don't are reported
/// and keep their previous value. A blank API key leaves the stored key
/// unchanged since the page never echoes it back.
pub fn apply_settings(config: &mut SequenceConfig, form: SettingsForm) -> Vec<SettingsError> {
    let mut errors = Vec::new();

    if let Some(key) = form.api_key.filter(|key| !key.trim().is_empty()) {
        config.set_api_key(key.trim());
        info!("API key updated");
    }
    if let Some(form_id) = form.form_id {
        config.form_id = form_id;
    }
    if let Some(topic) = form.topic {
        config.topic = topic;
    }
    apply_number(&mut config.list_id, form.brevo_list_id, "Brevo List ID", &mut errors);
    apply_number(&mut config.total_emails, form.total_emails, "Total Emails", &mut errors);
    apply_number(
        &mut config.days_between_emails,
        form.days_between_emails,
        "Days Between Emails",
        &mut errors,
    );
    apply_number(&mut config.topic_depth, form.topic_depth, "Topic Depth", &mut errors);
    if let Some(raw) = form.email_structure {
        match parse_email_structure(&raw) {
            Ok(structure) => config.email_structure = structure,
            Err(e) => {
                warn!(error = ?e, "Rejected email structure, keeping previous value");
                errors.push(e);
            }
        }
    }
    if let Some(context) = form.context {
        config.context = context;
    }

    errors
}

fn text_row(html: &mut String, name: &str, label: &str, value: &str, kind: &str) {
    let _ = write!(
        html,
        r#"        <tr>
            <th scope="row"><label for="{name}">{label}</label></th>
            <td><input type="{kind}" id="{name}" name="{name}" value="{value}"></td>
        </tr>
"#,
        value = escape_html(value),
    );
}

fn textarea_row(html: &mut String, name: &str, label: &str, value: &str, help: Option<&str>) {
    let _ = write!(
        html,
        r#"        <tr>
            <th scope="row"><label for="{name}">{label}</label></th>
            <td><textarea id="{name}" name="{name}" rows="10" cols="50">{value}</textarea>{help}</td>
        </tr>
"#,
        value = escape_html(value),
        help = help
            .map(|text| format!(r#"<p class="description">{}</p>"#, escape_html(text)))
            .unwrap_or_default(),
    );
}

/// Admin page listing every option, with any errors from the last save
pub fn render_settings_page(config: &SequenceConfig, errors: &[SettingsError], saved: bool) -> String {
    let mut html = String::from(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Email Sequence API Settings</title>
</head>
<body>
    <h1>Email Sequence API Settings</h1>
"#,
    );

    if saved && errors.is_empty() {
        html.push_str("    <div class=\"notice notice-success\"><p>Settings saved.</p></div>\n");
    }
    for error in errors {
        let _ = writeln!(
            html,
            r#"    <div class="notice notice-error"><p>{}</p></div>"#,
            escape_html(&error.to_string())
        );
    }

    let key_status = if config.api_key().is_some() { "configured" } else { "not set" };
    let _ = write!(
        html,
        r#"    <form method="post" action="/admin/settings">
    <table class="form-table">
        <tr>
            <th scope="row"><label for="api_key">API Key</label></th>
            <td><input type="password" id="api_key" name="api_key" value="" autocomplete="off">
            <p class="description">Currently {key_status}. Leave blank to keep the stored key.</p></td>
        </tr>
"#
    );

    text_row(&mut html, "form_id", "Form ID", &config.form_id, "text");
    text_row(&mut html, "topic", "Topic", &config.topic, "text");
    text_row(&mut html, "brevo_list_id", "Brevo List ID", &config.list_id.to_string(), "number");
    text_row(&mut html, "total_emails", "Total Emails", &config.total_emails.to_string(), "number");
    text_row(
        &mut html,
        "days_between_emails",
        "Days Between Emails",
        &config.days_between_emails.to_string(),
        "number",
    );
    text_row(&mut html, "topic_depth", "Topic Depth", &config.topic_depth.to_string(), "number");

    let structure = serde_json::to_string_pretty(&config.email_structure).unwrap_or_else(|_| "[]".to_string());
    textarea_row(
        &mut html,
        "email_structure",
        "Email Structure",
        &structure,
        Some("Enter the email structure as a JSON array. Each object should have 'name', 'word_count', and 'description' fields."),
    );
    textarea_row(&mut html, "context", "Context", &config.context, None);

    html.push_str(
        r#"    </table>
    <button type="submit">Save Changes</button>
    </form>
</body>
</html>
"#,
    );
    html
}
