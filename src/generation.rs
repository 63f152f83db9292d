//! Client for an OpenAI-compatible chat-completions endpoint.
//!
//! Each operation is one stateless request/response exchange. There is no
//! retry and no caching. Responses that parse but lack the expected fields
//! yield empty defaults instead of errors.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DefaultOnError};
use thiserror::Error;

use crate::config::Settings;
use crate::models::{Activity, ActivityType, Difficulty};

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion service returned {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },
    #[error("completion service returned no choices")]
    EmptyChoices,
    #[error("could not parse completion: {0}")]
    Parse(#[from] serde_json::Error),
}

// --- parameters ---

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CourseIdeaParams {
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ModuleContentParams {
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub level: Option<Difficulty>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LessonContentParams {
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,
    pub module_title: String,
    #[serde(default)]
    pub level: Option<Difficulty>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OutcomesParams {
    pub lesson_title: String,
    pub lesson_description: String,
    #[serde(default)]
    pub count: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ActivitiesParams {
    pub lesson_title: String,
    pub lesson_description: String,
    #[serde(default)]
    pub activity_type: Option<ActivityType>,
}

pub const DEFAULT_OUTCOME_COUNT: u32 = 3;
/// Outcome count used when generating straight into a lesson.
pub const LESSON_OUTCOME_COUNT: u32 = 4;

// --- results ---

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CourseIdea {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDraft {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub estimated_time: u32,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub suggested_lessons: Vec<LessonSuggestion>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LessonSuggestion {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ActivityDraft {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, rename = "type")]
    pub kind: Option<ActivityType>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub content: String,
}

impl ActivityDraft {
    pub fn into_activity(self, id: String, fallback: ActivityType) -> Activity {
        Activity {
            id,
            title: self.title,
            description: self.description,
            kind: self.kind.unwrap_or(fallback),
            content: self.content,
        }
    }
}

/// Strings pass through, null becomes empty, anything else keeps its JSON text.
fn lenient_text<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

// --- wire format ---

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// --- client ---

#[derive(Clone, Debug)]
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url, api_key, model)
    }

    pub fn with_http(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.openai_base_url.clone(),
            settings.openai_api_key.clone(),
            settings.openai_model.clone(),
        )
    }

    pub async fn generate_course_idea(&self, category: Option<&str>) -> Result<CourseIdea, GenerationError> {
        let scope = category
            .map(|c| format!(" for the {c} category"))
            .unwrap_or_default();
        let user = format!(
            "Generate a course title and description{scope}. Make it specific, marketable, and concise. \
             Respond with a JSON object with fields 'title' and 'description'."
        );
        let content = self
            .complete(
                "You are an expert course creator. You write compelling course titles and descriptions for an educational platform.",
                &user,
                true,
            )
            .await
            .inspect_err(|e| tracing::error!(error=%e, "course idea generation failed"))?;
        parse_document(content)
    }

    pub async fn generate_module_content(&self, params: &ModuleContentParams) -> Result<ModuleDraft, GenerationError> {
        let level = params.level.unwrap_or_default().as_str();
        let about = params
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(|d| format!(" The course is about: {d}"))
            .unwrap_or_default();
        let user = format!(
            r#"Generate a module for a course about "{topic}".{about}
The module should suit {level} level students.
Respond with a JSON object shaped like:
{{
  "title": "Module title",
  "description": "Detailed module description",
  "estimatedTime": <minutes to complete, integer>,
  "prerequisites": ["prerequisite", "..."],
  "difficulty": "{level}",
  "suggestedLessons": [{{"title": "Lesson title", "description": "Brief lesson description"}}]
}}"#,
            topic = params.topic,
        );
        let content = self
            .complete(
                "You are an expert curriculum designer who builds well-structured educational modules.",
                &user,
                true,
            )
            .await
            .inspect_err(|e| tracing::error!(error=%e, "module generation failed"))?;
        parse_document(content)
    }

    pub async fn generate_lesson_content(&self, params: &LessonContentParams) -> Result<String, GenerationError> {
        let level = params.level.unwrap_or_default().as_str();
        let about = params
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(|d| format!("\nLesson description: {d}"))
            .unwrap_or_default();
        let user = format!(
            r#"Write detailed lesson content for a lesson on "{topic}" in the module "{module}".{about}
The content should suit {level} level students.
Use markdown with headings, bullet points, and code examples where relevant.
Cover these sections:
- Introduction and overview
- Key concepts
- Detailed explanations
- Practical examples
- Summary and key takeaways"#,
            topic = params.topic,
            module = params.module_title,
        );
        let content = self
            .complete(
                "You are an expert educational content creator who writes engaging, informative lessons.",
                &user,
                false,
            )
            .await
            .inspect_err(|e| tracing::error!(error=%e, "lesson content generation failed"))?;
        Ok(content.unwrap_or_default())
    }

    pub async fn generate_learning_outcomes(&self, params: &OutcomesParams) -> Result<Vec<String>, GenerationError> {
        let count = params.count.unwrap_or(DEFAULT_OUTCOME_COUNT);
        let user = format!(
            r#"Generate {count} learning outcomes for a lesson titled "{title}".
Lesson description: {description}
Each outcome should start with an action verb, be specific and measurable,
and describe what learners can do after the lesson.
Respond with a JSON object: {{"outcomes": ["First outcome", "Second outcome"]}}"#,
            title = params.lesson_title,
            description = params.lesson_description,
        );
        let content = self
            .complete(
                "You are an expert in educational design who writes measurable learning outcomes.",
                &user,
                true,
            )
            .await
            .inspect_err(|e| tracing::error!(error=%e, "learning outcome generation failed"))?;
        let outcomes = list_field(parse_value(content)?, "outcomes")
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect();
        Ok(outcomes)
    }

    pub async fn generate_activities(&self, params: &ActivitiesParams) -> Result<Vec<ActivityDraft>, GenerationError> {
        let focus = match params.activity_type {
            Some(kind) => format!("Focus on {} activities.", kind.as_str()),
            None => "Include a mix of quiz questions, assignments, and discussion prompts.".to_string(),
        };
        let user = format!(
            r#"Generate engaging learning activities for a lesson titled "{title}".
Lesson description: {description}
{focus}
Respond with a JSON object shaped like:
{{
  "activities": [
    {{
      "title": "Activity title",
      "description": "Brief description",
      "type": "quiz|assignment|discussion",
      "content": "Questions for a quiz, instructions for an assignment, or prompts for a discussion"
    }}
  ]
}}"#,
            title = params.lesson_title,
            description = params.lesson_description,
        );
        let content = self
            .complete(
                "You are an expert in creating engaging educational activities that reinforce learning.",
                &user,
                true,
            )
            .await
            .inspect_err(|e| tracing::error!(error=%e, "activity generation failed"))?;
        let drafts = list_field(parse_value(content)?, "activities")
            .into_iter()
            .filter_map(|v| serde_json::from_value::<ActivityDraft>(v).ok())
            .collect();
        Ok(drafts)
    }

    async fn complete(&self, system: &str, user: &str, json: bool) -> Result<Option<String>, GenerationError> {
        let req = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            response_format: json.then_some(ResponseFormat { kind: "json_object" }),
        };
        let res = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let body: ChatResponse = serde_json::from_slice(&res.bytes().await?)?;
        let choice = body.choices.into_iter().next().ok_or(GenerationError::EmptyChoices)?;
        Ok(choice.message.content.filter(|c| !c.trim().is_empty()))
    }
}

/// Missing content, or JSON that is not an object, is the empty document.
fn parse_document<T: DeserializeOwned + Default>(content: Option<String>) -> Result<T, GenerationError> {
    match parse_value(content)? {
        value @ Value::Object(_) => Ok(serde_json::from_value(value)?),
        _ => Ok(T::default()),
    }
}

fn parse_value(content: Option<String>) -> Result<Value, GenerationError> {
    match content {
        Some(c) => Ok(serde_json::from_str(&c)?),
        None => Ok(Value::Null),
    }
}

/// A bare array, or the array under `field` of an object; otherwise empty.
fn list_field(value: Value, field: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
