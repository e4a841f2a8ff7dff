// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Remote goal-breakdown suggestions with a deterministic template fallback.
//!
//! The client speaks the OpenAI-compatible chat completions API, so it works
//! against a local Ollama server or any hosted endpoint. Callers that must
//! never fail go through [`suggest_or_fallback`], which substitutes a
//! keyword-matched template whenever the remote path is unavailable,
//! over quota, or returns something unusable.

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;

/// Remote-suggestion budget for one session. Guests get a small fixed
/// allowance; signed-in profiles are unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionQuota {
    pub used: u32,
    pub limit: Option<u32>,
}

impl SuggestionQuota {
    pub const fn unlimited() -> Self {
        Self { used: 0, limit: None }
    }

    pub const fn limited(used: u32, limit: u32) -> Self {
        Self {
            used,
            limit: Some(limit),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.used >= limit)
    }

    pub fn remaining(&self) -> Option<u32> {
        self.limit.map(|limit| limit.saturating_sub(self.used))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SuggestedHabit {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// One of `daily`, `weekly`, `monthly` on the wire; kept as text because
    /// model output occasionally strays and the caller decides how strictly
    /// to coerce it.
    pub frequency: String,
    #[serde(default = "default_frequency_value")]
    pub frequency_value: i32,
    #[serde(default)]
    pub estimated_duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SuggestedMilestone {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Days from the goal's start date.
    pub target_date_offset: i64,
    #[serde(default)]
    pub estimated_completion_time: String,
}

fn default_frequency_value() -> i32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakdownSource {
    Remote,
    Template,
}

impl BreakdownSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Template => "template",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalBreakdown {
    pub habits: Vec<SuggestedHabit>,
    pub milestones: Vec<SuggestedMilestone>,
    pub source: BreakdownSource,
    /// Model name when the breakdown came from the remote path.
    pub model: Option<String>,
    pub generated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("ai.base_url must not be empty");
        }
        let parsed =
            url::Url::parse(&base_url).with_context(|| format!("parse ai.base_url {base_url:?}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("ai.base_url must be an http(s) URL, got {base_url:?}");
        }
        if model.trim().is_empty() {
            bail!("ai.model must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            model: model.to_owned(),
            api_key: api_key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_owned),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: &str) {
        self.model = model.to_owned();
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn list_models(&self) -> Result<Vec<String>> {
        let mut request = self.http.get(format!("{}/models", self.base_url));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: ModelsResponse = response.json().context("decode model list")?;
        Ok(parsed.data.into_iter().map(|model| model.id).collect())
    }

    pub fn ping(&self) -> Result<()> {
        let models = self.list_models()?;
        let exists = models
            .iter()
            .any(|name| name == &self.model || name.starts_with(&format!("{}:", self.model)));
        if !exists {
            bail!(
                "model {:?} not found -- pull it with `ollama pull {}` or set ai.model to one the server lists",
                self.model,
                self.model
            );
        }
        Ok(())
    }

    /// Asks the model to break the goal into habits and milestones. The reply
    /// must be a JSON object with `habits` and `milestones` arrays; anything
    /// else is an error for the caller to absorb.
    pub fn suggest(
        &self,
        goal_title: &str,
        goal_description: &str,
        now: OffsetDateTime,
    ) -> Result<GoalBreakdown> {
        let prompt = build_breakdown_prompt(goal_title, goal_description);
        let request = ChatRequest::new(&self.model, SYSTEM_PROMPT, &prompt);

        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: ChatCompletionResponse = response.json().context("decode chat response")?;
        let content = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("no choices in chat response"))?;

        let body: BreakdownBody =
            serde_json::from_str(&extract_json(&content)).context("decode breakdown payload")?;

        Ok(GoalBreakdown {
            habits: body.habits,
            milestones: body.milestones,
            source: BreakdownSource::Remote,
            model: Some(self.model.clone()),
            generated_at: now,
        })
    }
}

/// Produces a breakdown for the goal, preferring the remote model when one is
/// configured and the quota allows it. Every failure falls back to the
/// template catalog; this function never errors and never reports why the
/// remote path was skipped.
pub fn suggest_or_fallback(
    client: Option<&Client>,
    quota: SuggestionQuota,
    goal_title: &str,
    goal_description: &str,
    now: OffsetDateTime,
) -> GoalBreakdown {
    if quota.is_exhausted() {
        return template_breakdown(goal_title, now);
    }
    let Some(client) = client else {
        return template_breakdown(goal_title, now);
    };
    match client.suggest(goal_title, goal_description, now) {
        Ok(breakdown) => breakdown,
        Err(_) => template_breakdown(goal_title, now),
    }
}

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that breaks down goals into actionable habits and milestones. Always respond with valid JSON only, no additional text.";

const RESPONSE_SHAPE: &str = r#"{
  "habits": [
    {
      "title": "Specific habit name",
      "description": "Clear description of what to do",
      "frequency": "daily" | "weekly" | "monthly",
      "frequency_value": number (how many times per frequency period),
      "estimated_duration": "time estimate like '30 minutes'"
    }
  ],
  "milestones": [
    {
      "title": "Milestone name",
      "description": "What this milestone represents",
      "target_date_offset": number (days from goal start date),
      "estimated_completion_time": "time estimate like '4-6 weeks'"
    }
  ]
}
"#;

const PROMPT_GUIDELINES: &str = r#"
Guidelines:
- Create 3-5 habits that are specific, measurable, and actionable
- Create 3-5 milestones that mark significant progress points
- Make habits realistic for daily/weekly practice
- Space milestones appropriately throughout the goal timeline
- Use realistic time estimates
- Focus on building momentum with early wins
"#;

pub fn build_breakdown_prompt(goal_title: &str, goal_description: &str) -> String {
    let mut out = String::new();
    let description = goal_description.trim();
    if description.is_empty() {
        out.push_str(&format!(
            "Break down the goal \"{goal_title}\" into actionable habits and milestones.\n"
        ));
    } else {
        out.push_str(&format!(
            "Break down the goal \"{goal_title}\" ({description}) into actionable habits and milestones.\n"
        ));
    }
    out.push_str("\nReturn a JSON object with this exact structure:\n");
    out.push_str(RESPONSE_SHAPE);
    out.push_str(PROMPT_GUIDELINES);
    out
}

/// Strips a Markdown code fence if the model wrapped its JSON in one.
fn extract_json(raw: &str) -> String {
    let mut payload = raw.trim().to_owned();
    if payload.starts_with("```") {
        let mut lines: Vec<&str> = payload.lines().collect();
        if !lines.is_empty() {
            lines.remove(0);
        }
        if let Some(idx) = lines.iter().rposition(|line| line.trim() == "```") {
            lines.truncate(idx);
        }
        payload = lines.join("\n").trim().to_owned();
    }
    payload
}

// (title, description, frequency, frequency_value, estimated_duration)
type TemplateHabit = (&'static str, &'static str, &'static str, i32, &'static str);
// (title, description, target_date_offset, estimated_completion_time)
type TemplateMilestone = (&'static str, &'static str, i64, &'static str);

struct TemplateEntry {
    /// Literal phrase that selects this entry, compared case-insensitively
    /// as a substring of the goal title.
    key: &'static str,
    habits: &'static [TemplateHabit],
    milestones: &'static [TemplateMilestone],
}

const TEMPLATES: [TemplateEntry; 6] = [
    TemplateEntry {
        key: "run marathon",
        habits: &[
            (
                "Morning Run",
                "Start with 30-minute runs, gradually increasing distance",
                "daily",
                1,
                "30-60 minutes",
            ),
            (
                "Strength Training",
                "Focus on leg strength and core stability",
                "weekly",
                3,
                "45 minutes",
            ),
            (
                "Long Run",
                "Weekly long-distance run to build endurance",
                "weekly",
                1,
                "1-3 hours",
            ),
            (
                "Rest and Recovery",
                "Stretching, foam rolling, and adequate sleep",
                "daily",
                1,
                "20 minutes",
            ),
        ],
        milestones: &[
            (
                "Complete First 5K",
                "Run your first 5K without stopping",
                30,
                "2-4 weeks",
            ),
            (
                "Reach 10K Distance",
                "Successfully complete a 10K run",
                60,
                "6-8 weeks",
            ),
            (
                "Half Marathon Ready",
                "Complete a 21K half marathon",
                120,
                "12-16 weeks",
            ),
            (
                "Marathon Training Peak",
                "Complete longest training run (32K+)",
                150,
                "18-20 weeks",
            ),
        ],
    },
    TemplateEntry {
        key: "write book",
        habits: &[
            (
                "Daily Writing",
                "Write at least 500 words every day",
                "daily",
                1,
                "1-2 hours",
            ),
            (
                "Research and Planning",
                "Research topics and plan upcoming chapters",
                "weekly",
                2,
                "1 hour",
            ),
            (
                "Edit and Review",
                "Review and edit previous chapters",
                "weekly",
                1,
                "2 hours",
            ),
            (
                "Reading in Genre",
                "Read books in your genre for inspiration",
                "daily",
                1,
                "30 minutes",
            ),
        ],
        milestones: &[
            (
                "Complete Book Outline",
                "Finish detailed chapter-by-chapter outline",
                14,
                "1-2 weeks",
            ),
            (
                "First Draft - 25% Complete",
                "Complete first quarter of your book",
                45,
                "6-8 weeks",
            ),
            (
                "First Draft - 50% Complete",
                "Reach the halfway point of your first draft",
                90,
                "12-14 weeks",
            ),
            (
                "Complete First Draft",
                "Finish the entire first draft of your book",
                150,
                "20-24 weeks",
            ),
            (
                "Complete First Edit",
                "Finish comprehensive editing of your manuscript",
                180,
                "24-28 weeks",
            ),
        ],
    },
    TemplateEntry {
        key: "learn language",
        habits: &[
            (
                "Daily Vocabulary Practice",
                "Learn 10 new words and review previous ones",
                "daily",
                1,
                "20-30 minutes",
            ),
            (
                "Grammar Exercises",
                "Practice grammar rules and sentence structure",
                "daily",
                1,
                "15-25 minutes",
            ),
            (
                "Speaking Practice",
                "Practice speaking with native speakers or apps",
                "weekly",
                3,
                "30-45 minutes",
            ),
            (
                "Listening Comprehension",
                "Watch shows, podcasts, or music in target language",
                "daily",
                1,
                "30 minutes",
            ),
        ],
        milestones: &[
            (
                "Basic Vocabulary (500 words)",
                "Learn and retain 500 essential words",
                30,
                "4-6 weeks",
            ),
            (
                "Hold Basic Conversation",
                "Have a 5-minute conversation with a native speaker",
                60,
                "8-10 weeks",
            ),
            (
                "Intermediate Level (A2)",
                "Pass an A2 level proficiency test",
                120,
                "16-20 weeks",
            ),
            (
                "Advanced Conversation",
                "Discuss complex topics fluently for 30+ minutes",
                180,
                "24-28 weeks",
            ),
        ],
    },
    TemplateEntry {
        key: "lose weight",
        habits: &[
            (
                "Daily Exercise",
                "Engage in 30-45 minutes of physical activity",
                "daily",
                1,
                "30-45 minutes",
            ),
            (
                "Meal Planning",
                "Plan healthy meals and track calories",
                "weekly",
                1,
                "1 hour",
            ),
            (
                "Water Intake",
                "Drink at least 8 glasses of water daily",
                "daily",
                1,
                "5 minutes",
            ),
            (
                "Sleep Schedule",
                "Maintain consistent 7-8 hours of sleep",
                "daily",
                1,
                "7-8 hours",
            ),
        ],
        milestones: &[
            (
                "First 5 Pounds Lost",
                "Achieve initial weight loss milestone",
                21,
                "2-3 weeks",
            ),
            (
                "Establish Exercise Routine",
                "Complete 30 consecutive days of exercise",
                30,
                "4-5 weeks",
            ),
            (
                "Halfway to Goal",
                "Reach 50% of your weight loss target",
                90,
                "12-14 weeks",
            ),
            (
                "Target Weight Achieved",
                "Reach your goal weight",
                180,
                "24-26 weeks",
            ),
        ],
    },
    TemplateEntry {
        key: "start business",
        habits: &[
            (
                "Market Research",
                "Research target market and competitors daily",
                "daily",
                1,
                "1-2 hours",
            ),
            (
                "Business Plan Development",
                "Work on business plan sections",
                "weekly",
                3,
                "2 hours",
            ),
            (
                "Networking",
                "Connect with potential customers and partners",
                "weekly",
                2,
                "1 hour",
            ),
            (
                "Skill Development",
                "Learn business and industry-specific skills",
                "daily",
                1,
                "30-60 minutes",
            ),
        ],
        milestones: &[
            (
                "Business Idea Validation",
                "Validate your business concept with potential customers",
                30,
                "3-4 weeks",
            ),
            (
                "Complete Business Plan",
                "Finish comprehensive business plan",
                60,
                "8-10 weeks",
            ),
            (
                "Secure Initial Funding",
                "Obtain startup capital or investment",
                120,
                "16-18 weeks",
            ),
            ("Launch MVP", "Launch minimum viable product", 180, "24-26 weeks"),
        ],
    },
    TemplateEntry {
        key: "default",
        habits: &[
            (
                "Daily Practice",
                "Dedicate time daily to work towards your goal",
                "daily",
                1,
                "30-60 minutes",
            ),
            (
                "Weekly Review",
                "Review progress and adjust strategy",
                "weekly",
                1,
                "30 minutes",
            ),
            (
                "Skill Development",
                "Learn new skills related to your goal",
                "weekly",
                3,
                "45 minutes",
            ),
        ],
        milestones: &[
            (
                "Foundation Complete",
                "Complete basic setup and initial learning",
                30,
                "3-4 weeks",
            ),
            (
                "Intermediate Progress",
                "Reach 50% completion of your goal",
                90,
                "12-14 weeks",
            ),
            (
                "Advanced Stage",
                "Reach 80% completion with refined skills",
                150,
                "20-22 weeks",
            ),
        ],
    },
];

const DEFAULT_TEMPLATE: &TemplateEntry = &TEMPLATES[5];

fn match_template_entry(goal_title: &str) -> &'static TemplateEntry {
    let needle = goal_title.to_lowercase();
    TEMPLATES
        .iter()
        .find(|entry| entry.key != "default" && needle.contains(entry.key))
        .unwrap_or(DEFAULT_TEMPLATE)
}

/// Catalog key the title resolves to, `"default"` when nothing matches.
pub fn match_template_key(goal_title: &str) -> &'static str {
    match_template_entry(goal_title).key
}

/// Deterministic breakdown from the built-in catalog.
pub fn template_breakdown(goal_title: &str, now: OffsetDateTime) -> GoalBreakdown {
    let entry = match_template_entry(goal_title);
    GoalBreakdown {
        habits: entry
            .habits
            .iter()
            .map(
                |&(title, description, frequency, frequency_value, estimated_duration)| {
                    SuggestedHabit {
                        title: title.to_owned(),
                        description: description.to_owned(),
                        frequency: frequency.to_owned(),
                        frequency_value,
                        estimated_duration: estimated_duration.to_owned(),
                    }
                },
            )
            .collect(),
        milestones: entry
            .milestones
            .iter()
            .map(
                |&(title, description, target_date_offset, estimated_completion_time)| {
                    SuggestedMilestone {
                        title: title.to_owned(),
                        description: description.to_owned(),
                        target_date_offset,
                        estimated_completion_time: estimated_completion_time.to_owned(),
                    }
                },
            )
            .collect(),
        source: BreakdownSource::Template,
        model: None,
        generated_at: now,
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- start it with `ollama serve` or fix ai.base_url ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<OpenAIErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.message.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), error.message);
    }

    if let Ok(parsed) = serde_json::from_str::<OllamaErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), error);
    }

    if body.len() < 100 && !body.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), body);
    }

    anyhow!("server returned {}", status.as_u16())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, system: &'a str, user: &'a str) -> Self {
        Self {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: 1500,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct BreakdownBody {
    habits: Vec<SuggestedHabit>,
    milestones: Vec<SuggestedMilestone>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelRow>,
}

#[derive(Debug, Deserialize)]
struct ModelRow {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorEnvelope {
    error: Option<OpenAIErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorEnvelope {
    error: Option<String>,
}
