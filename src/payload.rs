// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{EmailSection, SequenceConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceSettings {
    pub total_emails: i64,
    pub days_between_emails: i64,
}

/// Per-recipient values the webhook feeds into generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inputs {
    pub first_name: String,
    pub context: String,
    /// One entry per configured custom input
    #[serde(flatten)]
    pub answers: BTreeMap<String, String>,
}

/// Body sent to the sequence webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub form_id: String,
    pub topic: String,
    pub recipient_email: String,
    pub brevo_list_id: i64,
    pub sequence_settings: SequenceSettings,
    pub email_structure: Vec<EmailSection>,
    pub inputs: Inputs,
    pub topic_depth: i64,
    pub preferred_time: String,
    pub timezone: String,
}

/// Raw values read off the signup form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormSubmission {
    pub first_name: String,
    pub email: String,
    pub timezone: String,
    pub preferred_time: String,
    /// Custom input answers keyed by field name
    #[serde(flatten)]
    pub answers: BTreeMap<String, String>,
}

impl SubmissionPayload {
    /// Assemble a payload the same way the browser script does: free text
    /// verbatim from the form, everything structural from `config`.
    /// Custom inputs the form left out are sent as empty strings.
    pub fn build(config: &SequenceConfig, form: &FormSubmission) -> Self {
        let answers = config
            .custom_inputs
            .iter()
            .map(|input| {
                let value = form.answers.get(&input.name).cloned().unwrap_or_default();
                (input.name.clone(), value)
            })
            .collect();

        Self {
            form_id: config.form_id.clone(),
            topic: config.topic.clone(),
            recipient_email: form.email.clone(),
            brevo_list_id: config.list_id,
            sequence_settings: SequenceSettings {
                total_emails: config.total_emails,
                days_between_emails: config.days_between_emails,
            },
            email_structure: config.email_structure.clone(),
            inputs: Inputs {
                first_name: form.first_name.clone(),
                context: config.context.clone(),
                answers,
            },
            topic_depth: config.topic_depth,
            preferred_time: form.preferred_time.clone(),
            timezone: form.timezone.clone(),
        }
    }
}
