use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use kaigi_core::{
    Agenda, Announcement, Debate, DevProject, FreeTopic, Meeting, ProjectSignal, SalesMetric,
    SalesStatus,
};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("no AI collaborator configured")]
    Disabled,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response carried no text")]
    MalformedResponse,
}

/// Single-shot text generation against the hosted language model. One
/// prompt in, one opaque text out; failures are not retried.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Pass-through client for the hosted LLM messages endpoint.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl HttpTextGenerator {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let body = json!({
            "model": self.model,
            "max_tokens": 1024,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let payload: Value = response.json().await?;
        payload["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or(GenerateError::MalformedResponse)
    }
}

/// Stand-in when no API key is configured; every request fails generation.
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
        Err(GenerateError::Disabled)
    }
}

pub fn generator_from_config(config: &Config) -> Arc<dyn TextGenerator> {
    match &config.ai_api_key {
        Some(key) => Arc::new(HttpTextGenerator::new(
            config.ai_api_url.clone(),
            key.clone(),
            config.ai_model.clone(),
        )),
        None => {
            tracing::warn!("AI_API_KEY not set; insight and report generation disabled");
            Arc::new(DisabledGenerator)
        }
    }
}

/// Everything the prompt templates draw from.
pub struct MeetingSnapshot {
    pub meeting: Meeting,
    pub agendas: Vec<Agenda>,
    pub sales_metrics: Vec<SalesMetric>,
    pub sales_status: Vec<SalesStatus>,
    pub dev_projects: Vec<DevProject>,
    pub announcement: Option<Announcement>,
    pub free_topics: Vec<FreeTopic>,
    pub debate: Option<Debate>,
}

/// Prompt for pre-meeting insight bullets.
pub fn insight_prompt(snapshot: &MeetingSnapshot) -> String {
    let mut prompt = String::from(
        "You are a meeting facilitator. Analyze the meeting preparation below \
         and reply with concise insight bullets: risks, gaps, and suggestions.\n\n",
    );
    prompt.push_str(&format!("Meeting date: {}\n\n", snapshot.meeting.meeting_date));

    prompt.push_str(&format!("Agenda items ({}):\n", snapshot.agendas.len()));
    for agenda in &snapshot.agendas {
        prompt.push_str(&format!(
            "- {}. {} (detail: {}, actions: {})\n",
            agenda.agenda_number,
            agenda.title,
            agenda.detail.as_deref().unwrap_or("none"),
            agenda.action_items.as_deref().unwrap_or("none"),
        ));
    }

    let leads: i64 = snapshot.sales_metrics.iter().map(|m| m.leads_count).sum();
    let contracts: i64 = snapshot.sales_metrics.iter().map(|m| m.contracts_count).sum();
    prompt.push_str(&format!(
        "\nSales funnel this month: {} leads, {} contracts across {} channels.\n",
        leads,
        contracts,
        snapshot.sales_metrics.len()
    ));
    for status in &snapshot.sales_status {
        prompt.push_str(&format!(
            "- {}: {} (next action: {})\n",
            status.company_name,
            status.status_text.as_deref().unwrap_or("no status"),
            status.next_action.as_deref().unwrap_or("unset"),
        ));
    }

    let incidents = snapshot
        .dev_projects
        .iter()
        .filter(|p| p.signal == ProjectSignal::Incident)
        .count();
    prompt.push_str(&format!(
        "\nDev projects: {} tracked, {} with an active incident.\n",
        snapshot.dev_projects.len(),
        incidents
    ));

    if let Some(debate) = &snapshot.debate {
        prompt.push_str(&format!(
            "\nDebate theme: {}\n",
            debate.theme.as_deref().unwrap_or("not set")
        ));
    }

    prompt
}

/// Prompt for the end-of-meeting report.
pub fn report_prompt(snapshot: &MeetingSnapshot) -> String {
    let mut prompt = String::from(
        "You are writing the minutes of an internal meeting. Produce a final \
         report covering decisions, numbers, and follow-ups from the data below.\n\n",
    );
    prompt.push_str(&format!("Meeting date: {}\n", snapshot.meeting.meeting_date));

    for agenda in &snapshot.agendas {
        prompt.push_str(&format!(
            "\nAgenda {}: {}\nNotes: {}\nActions: {}\n",
            agenda.agenda_number,
            agenda.title,
            agenda.content.as_deref().unwrap_or("none"),
            agenda.action_items.as_deref().unwrap_or("none"),
        ));
    }

    for metric in &snapshot.sales_metrics {
        prompt.push_str(&format!(
            "\nChannel {}: {} leads / {} appointments / {} contracts",
            metric
                .sales_channel
                .as_ref()
                .map(|c| c.name.as_str())
                .unwrap_or("unknown"),
            metric.leads_count,
            metric.appointments_count,
            metric.contracts_count,
        ));
    }

    for project in &snapshot.dev_projects {
        prompt.push_str(&format!(
            "\nProject {}: {}",
            project.project_name,
            project.status_text.as_deref().unwrap_or("no status"),
        ));
    }

    if let Some(announcement) = &snapshot.announcement {
        if let Some(content) = &announcement.content {
            prompt.push_str(&format!("\n\nAnnouncements: {}", content));
        }
    }
    for topic in &snapshot.free_topics {
        if let Some(content) = &topic.content {
            prompt.push_str(&format!("\nFree topic: {}", content));
        }
    }
    if let Some(debate) = &snapshot.debate {
        prompt.push_str(&format!(
            "\n\nDebate: {} (pro: {}, con: {})\nMemo: {}\n",
            debate.theme.as_deref().unwrap_or("none"),
            debate.pro_side.as_deref().unwrap_or("-"),
            debate.con_side.as_deref().unwrap_or("-"),
            debate.memo.as_deref().unwrap_or("none"),
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn snapshot() -> MeetingSnapshot {
        let meeting = Meeting::new(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        let now = Utc::now();
        MeetingSnapshot {
            agendas: vec![Agenda {
                id: Uuid::new_v4(),
                meeting_id: meeting.id,
                agenda_number: 1,
                title: "Quarterly goals".to_string(),
                detail: None,
                content: Some("Agreed to focus on retention".to_string()),
                action_items: Some("Draft OKRs".to_string()),
                sort_order: Some(0),
                created_at: now,
                updated_at: now,
            }],
            sales_metrics: Vec::new(),
            sales_status: Vec::new(),
            dev_projects: Vec::new(),
            announcement: None,
            free_topics: Vec::new(),
            debate: None,
            meeting,
        }
    }

    #[test]
    fn test_insight_prompt_carries_section_data() {
        let prompt = insight_prompt(&snapshot());
        assert!(prompt.contains("Quarterly goals"));
        assert!(prompt.contains("Agenda items (1)"));
        assert!(prompt.contains("2025-06-02"));
    }

    #[test]
    fn test_report_prompt_carries_notes_and_actions() {
        let prompt = report_prompt(&snapshot());
        assert!(prompt.contains("Agreed to focus on retention"));
        assert!(prompt.contains("Draft OKRs"));
    }

    #[tokio::test]
    async fn test_disabled_generator_fails_generation() {
        let err = DisabledGenerator.generate("anything").await.unwrap_err();
        assert!(matches!(err, GenerateError::Disabled));
    }
}
