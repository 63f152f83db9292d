use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Quiz,
    Assignment,
    Discussion,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Quiz => "quiz",
            ActivityType::Assignment => "assignment",
            ActivityType::Discussion => "discussion",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub modules: Vec<Module>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    pub title: String,
    pub description: String,
    pub lessons: Vec<Lesson>,
    pub prerequisites: Vec<String>,
    pub difficulty: Difficulty,
    pub estimated_time: u32, // minutes
    pub order: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub learning_outcomes: Vec<LearningOutcome>,
    pub activities: Vec<Activity>,
    pub order: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LearningOutcome {
    pub id: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub content: String,
}

impl Course {
    /// Modules in display order. Ties keep their array position.
    pub fn sorted_modules(&self) -> Vec<&Module> {
        let mut modules: Vec<&Module> = self.modules.iter().collect();
        modules.sort_by_key(|m| m.order);
        modules
    }

    pub fn module(&self, module_id: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == module_id)
    }
}

impl Module {
    /// Lessons in display order. Ties keep their array position.
    pub fn sorted_lessons(&self) -> Vec<&Lesson> {
        let mut lessons: Vec<&Lesson> = self.lessons.iter().collect();
        lessons.sort_by_key(|l| l.order);
        lessons
    }

    pub fn lesson(&self, lesson_id: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == lesson_id)
    }
}

// --- patches ---
//
// Every field is optional; `apply` overrides present fields one by one and
// never merges nested sequences.

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub modules: Option<Vec<Module>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub published: Option<bool>,
}

impl CoursePatch {
    pub fn apply(self, course: &Course) -> Course {
        Course {
            id: course.id.clone(),
            title: self.title.unwrap_or_else(|| course.title.clone()),
            description: self.description.unwrap_or_else(|| course.description.clone()),
            modules: self.modules.unwrap_or_else(|| course.modules.clone()),
            created_at: self.created_at.unwrap_or(course.created_at),
            updated_at: self.updated_at.unwrap_or(course.updated_at),
            published: self.published.unwrap_or(course.published),
        }
    }
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModulePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub lessons: Option<Vec<Lesson>>,
    pub prerequisites: Option<Vec<String>>,
    pub difficulty: Option<Difficulty>,
    pub estimated_time: Option<u32>,
    pub order: Option<i32>,
}

impl ModulePatch {
    pub fn order(order: i32) -> Self {
        Self { order: Some(order), ..Default::default() }
    }

    pub fn apply(self, module: &Module) -> Module {
        Module {
            id: module.id.clone(),
            title: self.title.unwrap_or_else(|| module.title.clone()),
            description: self.description.unwrap_or_else(|| module.description.clone()),
            lessons: self.lessons.unwrap_or_else(|| module.lessons.clone()),
            prerequisites: self.prerequisites.unwrap_or_else(|| module.prerequisites.clone()),
            difficulty: self.difficulty.unwrap_or(module.difficulty),
            estimated_time: self.estimated_time.unwrap_or(module.estimated_time),
            order: self.order.unwrap_or(module.order),
        }
    }
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LessonPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub learning_outcomes: Option<Vec<LearningOutcome>>,
    pub activities: Option<Vec<Activity>>,
    pub order: Option<i32>,
}

impl LessonPatch {
    pub fn order(order: i32) -> Self {
        Self { order: Some(order), ..Default::default() }
    }

    pub fn apply(self, lesson: &Lesson) -> Lesson {
        Lesson {
            id: lesson.id.clone(),
            title: self.title.unwrap_or_else(|| lesson.title.clone()),
            description: self.description.unwrap_or_else(|| lesson.description.clone()),
            content: self.content.unwrap_or_else(|| lesson.content.clone()),
            learning_outcomes: self
                .learning_outcomes
                .unwrap_or_else(|| lesson.learning_outcomes.clone()),
            activities: self.activities.unwrap_or_else(|| lesson.activities.clone()),
            order: self.order.unwrap_or(lesson.order),
        }
    }
}

// --- request bodies ---

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseReq {
    pub title: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateModuleReq {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub estimated_time: Option<u32>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonReq {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub content: String,
}

/// Both fields fall back to the module's own title and description.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct GenerateLessonReq {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateOutcomeReq {
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateActivityReq {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    #[serde(default)]
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MoveReq {
    pub direction: Direction,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SetCurrentReq {
    pub course_id: Option<String>,
}
