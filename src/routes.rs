use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::Utc;
use http::{header, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    export,
    generation::*,
    models::*,
    state::AppState,
    store::{CourseStore, StoreError},
    validation,
};

type ApiResult<T> = Result<T, (StatusCode, String)>;

const COURSE: &str = "/api/courses/:course_id";
const MODULE: &str = "/api/courses/:course_id/modules/:module_id";
const LESSON: &str = "/api/courses/:course_id/modules/:module_id/lessons/:lesson_id";

pub fn router(state: AppState) -> Router {
    Router::new()
        // courses
        .route("/api/courses", get(list_courses).post(create_course))
        .route(COURSE, get(get_course).patch(patch_course).delete(delete_course))
        .route(&format!("{COURSE}/publish"), post(toggle_publish))
        .route(&format!("{COURSE}/export"), get(export_course))
        .route("/api/current", get(get_current).put(set_current))
        // modules
        .route(&format!("{COURSE}/modules"), post(create_module))
        .route(MODULE, patch(patch_module).delete(delete_module))
        .route(&format!("{MODULE}/move"), post(move_module))
        // lessons
        .route(&format!("{MODULE}/lessons"), post(create_lesson))
        .route(&format!("{MODULE}/lessons/generate"), post(generate_lesson))
        .route(LESSON, patch(patch_lesson).delete(delete_lesson))
        .route(&format!("{LESSON}/move"), post(move_lesson))
        .route(&format!("{LESSON}/outcomes"), post(create_outcome))
        .route(&format!("{LESSON}/outcomes/:outcome_id"), delete(delete_outcome))
        .route(&format!("{LESSON}/activities"), post(create_activity))
        .route(&format!("{LESSON}/activities/:activity_id"), delete(delete_activity))
        // generation written back into the store
        .route(&format!("{LESSON}/generate/content"), post(generate_into_content))
        .route(&format!("{LESSON}/generate/outcomes"), post(generate_into_outcomes))
        .route(&format!("{LESSON}/generate/activities"), post(generate_into_activities))
        // generation drafts
        .route("/api/generate/course-idea", post(gen_course_idea))
        .route("/api/generate/module", post(gen_module))
        .route("/api/generate/lesson-content", post(gen_lesson_content))
        .route("/api/generate/outcomes", post(gen_outcomes))
        .route("/api/generate/activities", post(gen_activities))
        .with_state(state)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn next_order<T>(items: &[T], order: impl Fn(&T) -> i32) -> i32 {
    items.iter().map(order).max().map_or(0, |max| max + 1)
}

/// Applies `f` to the store and answers with the course afterwards. A missing
/// course is a 404 because there is nothing to answer with; everything below
/// it follows the store's silent no-op rules.
async fn mutate<F>(state: &AppState, course_id: &str, f: F) -> ApiResult<Json<Course>>
where
    F: FnOnce(&CourseStore) -> Result<CourseStore, StoreError>,
{
    let mut store = state.store.write().await;
    if store.course(course_id).is_none() {
        return Err(e404("course not found"));
    }
    *store = f(&*store).map_err(e409)?;
    store
        .course(course_id)
        .map(|c| Json(Course::clone(c)))
        .ok_or_else(|| e404("course not found"))
}

// --- courses ---

async fn list_courses(State(state): State<AppState>) -> Json<Vec<Course>> {
    let store = state.store.read().await;
    Json(store.courses().iter().map(|c| Course::clone(c)).collect())
}

async fn create_course(
    State(state): State<AppState>,
    Json(req): Json<CreateCourseReq>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    validation::course_req(&req).map_err(e400)?;
    let now = Utc::now();
    let course = Course {
        id: new_id(),
        title: req.title,
        description: req.description,
        modules: vec![],
        created_at: now,
        updated_at: now,
        published: false,
    };

    let mut store = state.store.write().await;
    *store = store.add_course(course.clone()).map_err(e409)?;
    tracing::info!(course_id=%course.id, "course created");
    Ok((StatusCode::CREATED, Json(course)))
}

async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> ApiResult<Json<Course>> {
    let store = state.store.read().await;
    store
        .course(&course_id)
        .map(|c| Json(Course::clone(c)))
        .ok_or_else(|| e404("course not found"))
}

async fn patch_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Json(mut patch): Json<CoursePatch>,
) -> ApiResult<Json<Course>> {
    validation::course_patch(&patch).map_err(e400)?;
    patch.updated_at.get_or_insert_with(Utc::now);
    let course = mutate(&state, &course_id, |s| s.update_course(&course_id, patch)).await?;
    tracing::info!(%course_id, "course updated");
    Ok(course)
}

async fn delete_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> StatusCode {
    let mut store = state.store.write().await;
    *store = store.delete_course(&course_id);
    tracing::info!(%course_id, "course deleted");
    StatusCode::NO_CONTENT
}

async fn toggle_publish(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> ApiResult<Json<Course>> {
    mutate(&state, &course_id, |s| {
        let published = s.course(&course_id).map_or(false, |c| c.published);
        let patch = CoursePatch {
            published: Some(!published),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };
        s.update_course(&course_id, patch)
    })
    .await
}

async fn export_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let store = state.store.read().await;
    let course = store.course(&course_id).ok_or_else(|| e404("course not found"))?;
    let body = export::export_course(course).map_err(e500)?;
    let disposition = format!("attachment; filename=\"{}\"", export::export_filename(course));
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

async fn get_current(State(state): State<AppState>) -> Json<Option<Course>> {
    let store = state.store.read().await;
    Json(store.current_course().map(|c| Course::clone(c)))
}

async fn set_current(
    State(state): State<AppState>,
    Json(req): Json<SetCurrentReq>,
) -> ApiResult<Json<Option<Course>>> {
    let mut store = state.store.write().await;
    let focused: Option<Arc<Course>> = match &req.course_id {
        Some(id) => Some(store.course(id).cloned().ok_or_else(|| e404("course not found"))?),
        None => None,
    };
    *store = store.set_current_course(focused);
    Ok(Json(store.current_course().map(|c| Course::clone(c))))
}

// --- modules ---

async fn create_module(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Json(req): Json<CreateModuleReq>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    validation::module_req(&req).map_err(e400)?;
    let module_id = new_id();
    let course = mutate(&state, &course_id, |s| {
        let order = s
            .course(&course_id)
            .map_or(0, |c| next_order(&c.modules, |m| m.order));
        let module = Module {
            id: module_id.clone(),
            title: req.title,
            description: req.description,
            lessons: vec![],
            prerequisites: req.prerequisites,
            difficulty: req.difficulty.unwrap_or(Difficulty::Beginner),
            estimated_time: req.estimated_time.unwrap_or(30),
            order,
        };
        s.add_module(&course_id, module)
    })
    .await?;
    tracing::info!(%course_id, %module_id, "module added");
    Ok((StatusCode::CREATED, course))
}

async fn patch_module(
    State(state): State<AppState>,
    Path((course_id, module_id)): Path<(String, String)>,
    Json(patch): Json<ModulePatch>,
) -> ApiResult<Json<Course>> {
    validation::module_patch(&patch).map_err(e400)?;
    mutate(&state, &course_id, |s| s.update_module(&course_id, &module_id, patch)).await
}

async fn delete_module(
    State(state): State<AppState>,
    Path((course_id, module_id)): Path<(String, String)>,
) -> ApiResult<Json<Course>> {
    let course = mutate(&state, &course_id, |s| Ok(s.delete_module(&course_id, &module_id))).await?;
    tracing::info!(%course_id, %module_id, "module deleted");
    Ok(course)
}

async fn move_module(
    State(state): State<AppState>,
    Path((course_id, module_id)): Path<(String, String)>,
    Json(req): Json<MoveReq>,
) -> ApiResult<Json<Course>> {
    mutate(&state, &course_id, |s| {
        Ok(s.move_module(&course_id, &module_id, req.direction))
    })
    .await
}

// --- lessons ---

async fn create_lesson(
    State(state): State<AppState>,
    Path((course_id, module_id)): Path<(String, String)>,
    Json(req): Json<CreateLessonReq>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    validation::lesson_req(&req).map_err(e400)?;
    let lesson_id = new_id();
    let course = mutate(&state, &course_id, |s| {
        let order = s
            .course(&course_id)
            .and_then(|c| c.module(&module_id))
            .map_or(0, |m| next_order(&m.lessons, |l| l.order));
        let lesson = Lesson {
            id: lesson_id.clone(),
            title: req.title,
            description: req.description,
            content: req.content,
            learning_outcomes: vec![],
            activities: vec![],
            order,
        };
        s.add_lesson(&course_id, &module_id, lesson)
    })
    .await?;
    tracing::info!(%course_id, %module_id, %lesson_id, "lesson added");
    Ok((StatusCode::CREATED, course))
}

async fn patch_lesson(
    State(state): State<AppState>,
    Path((course_id, module_id, lesson_id)): Path<(String, String, String)>,
    Json(patch): Json<LessonPatch>,
) -> ApiResult<Json<Course>> {
    validation::lesson_patch(&patch).map_err(e400)?;
    mutate(&state, &course_id, |s| s.update_lesson(&course_id, &module_id, &lesson_id, patch)).await
}

async fn delete_lesson(
    State(state): State<AppState>,
    Path((course_id, module_id, lesson_id)): Path<(String, String, String)>,
) -> ApiResult<Json<Course>> {
    let course = mutate(&state, &course_id, |s| {
        Ok(s.delete_lesson(&course_id, &module_id, &lesson_id))
    })
    .await?;
    tracing::info!(%course_id, %module_id, %lesson_id, "lesson deleted");
    Ok(course)
}

async fn move_lesson(
    State(state): State<AppState>,
    Path((course_id, module_id, lesson_id)): Path<(String, String, String)>,
    Json(req): Json<MoveReq>,
) -> ApiResult<Json<Course>> {
    mutate(&state, &course_id, |s| {
        Ok(s.move_lesson(&course_id, &module_id, &lesson_id, req.direction))
    })
    .await
}

async fn create_outcome(
    State(state): State<AppState>,
    Path((course_id, module_id, lesson_id)): Path<(String, String, String)>,
    Json(req): Json<CreateOutcomeReq>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    validation::outcome_req(&req).map_err(e400)?;
    let outcome = LearningOutcome {
        id: new_id(),
        description: req.description.trim().to_string(),
    };
    let course = mutate(&state, &course_id, |s| {
        s.add_learning_outcome(&course_id, &module_id, &lesson_id, outcome)
    })
    .await?;
    Ok((StatusCode::CREATED, course))
}

async fn delete_outcome(
    State(state): State<AppState>,
    Path((course_id, module_id, lesson_id, outcome_id)): Path<(String, String, String, String)>,
) -> ApiResult<Json<Course>> {
    mutate(&state, &course_id, |s| {
        Ok(s.delete_learning_outcome(&course_id, &module_id, &lesson_id, &outcome_id))
    })
    .await
}

async fn create_activity(
    State(state): State<AppState>,
    Path((course_id, module_id, lesson_id)): Path<(String, String, String)>,
    Json(req): Json<CreateActivityReq>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    validation::activity_req(&req).map_err(e400)?;
    let activity = Activity {
        id: new_id(),
        title: req.title,
        description: req.description,
        kind: req.kind,
        content: req.content,
    };
    let course = mutate(&state, &course_id, |s| {
        s.add_activity(&course_id, &module_id, &lesson_id, activity)
    })
    .await?;
    Ok((StatusCode::CREATED, course))
}

async fn delete_activity(
    State(state): State<AppState>,
    Path((course_id, module_id, lesson_id, activity_id)): Path<(String, String, String, String)>,
) -> ApiResult<Json<Course>> {
    mutate(&state, &course_id, |s| {
        Ok(s.delete_activity(&course_id, &module_id, &lesson_id, &activity_id))
    })
    .await
}

// --- generation written back into the store ---

#[derive(Deserialize, Debug, Default)]
struct GenerateOpts {
    count: Option<u32>,
    #[serde(rename = "type")]
    kind: Option<ActivityType>,
}

// What a lesson generation prompt needs, copied out so no lock is held
// across the completion call.
struct LessonContext {
    lesson_title: String,
    lesson_description: String,
    module_title: String,
    level: Difficulty,
}

async fn lesson_context(
    state: &AppState,
    course_id: &str,
    module_id: &str,
    lesson_id: &str,
) -> ApiResult<LessonContext> {
    let store = state.store.read().await;
    let course = store.course(course_id).ok_or_else(|| e404("course not found"))?;
    let module = course.module(module_id).ok_or_else(|| e404("module not found"))?;
    let lesson = module.lesson(lesson_id).ok_or_else(|| e404("lesson not found"))?;
    Ok(LessonContext {
        lesson_title: lesson.title.clone(),
        lesson_description: lesson.description.clone(),
        module_title: module.title.clone(),
        level: module.difficulty,
    })
}

/// Generates a lesson's content from the module and appends it as a new
/// lesson. The module is read first and the lock released before the
/// completion call.
async fn generate_lesson(
    State(state): State<AppState>,
    Path((course_id, module_id)): Path<(String, String)>,
    Json(req): Json<GenerateLessonReq>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    validation::generate_lesson_req(&req).map_err(e400)?;
    let (module_title, module_description, level) = {
        let store = state.store.read().await;
        let course = store.course(&course_id).ok_or_else(|| e404("course not found"))?;
        let module = course.module(&module_id).ok_or_else(|| e404("module not found"))?;
        (module.title.clone(), module.description.clone(), module.difficulty)
    };
    let title = req.title.unwrap_or_else(|| module_title.clone());
    let description = req.description.unwrap_or(module_description);

    let content = state
        .generator
        .generate_lesson_content(&LessonContentParams {
            topic: title.clone(),
            description: Some(description.clone()),
            module_title,
            level: Some(level),
        })
        .await
        .map_err(e502)?;
    if content.trim().is_empty() {
        return Err(e502("generation returned no content"));
    }

    let lesson_id = new_id();
    let course = mutate(&state, &course_id, |s| {
        let order = s
            .course(&course_id)
            .and_then(|c| c.module(&module_id))
            .map_or(0, |m| next_order(&m.lessons, |l| l.order));
        let lesson = Lesson {
            id: lesson_id.clone(),
            title,
            description,
            content,
            learning_outcomes: vec![],
            activities: vec![],
            order,
        };
        s.add_lesson(&course_id, &module_id, lesson)
    })
    .await?;
    tracing::info!(%course_id, %module_id, %lesson_id, "lesson generated");
    Ok((StatusCode::CREATED, course))
}

async fn generate_into_content(
    State(state): State<AppState>,
    Path((course_id, module_id, lesson_id)): Path<(String, String, String)>,
) -> ApiResult<Json<Course>> {
    let ctx = lesson_context(&state, &course_id, &module_id, &lesson_id).await?;
    let content = state
        .generator
        .generate_lesson_content(&LessonContentParams {
            topic: ctx.lesson_title,
            description: Some(ctx.lesson_description),
            module_title: ctx.module_title,
            level: Some(ctx.level),
        })
        .await
        .map_err(e502)?;
    if content.trim().is_empty() {
        return Err(e502("generation returned no content"));
    }
    let patch = LessonPatch { content: Some(content), ..Default::default() };
    mutate(&state, &course_id, |s| s.update_lesson(&course_id, &module_id, &lesson_id, patch)).await
}

async fn generate_into_outcomes(
    State(state): State<AppState>,
    Path((course_id, module_id, lesson_id)): Path<(String, String, String)>,
    Query(opts): Query<GenerateOpts>,
) -> ApiResult<Json<Course>> {
    let ctx = lesson_context(&state, &course_id, &module_id, &lesson_id).await?;
    let outcomes = state
        .generator
        .generate_learning_outcomes(&OutcomesParams {
            lesson_title: ctx.lesson_title,
            lesson_description: ctx.lesson_description,
            count: opts.count.or(Some(LESSON_OUTCOME_COUNT)),
        })
        .await
        .map_err(e502)?;
    if outcomes.is_empty() {
        return Err(e502("generation returned no learning outcomes"));
    }
    let outcomes = outcomes
        .into_iter()
        .map(|description| LearningOutcome { id: new_id(), description })
        .collect();
    let patch = LessonPatch { learning_outcomes: Some(outcomes), ..Default::default() };
    mutate(&state, &course_id, |s| s.update_lesson(&course_id, &module_id, &lesson_id, patch)).await
}

async fn generate_into_activities(
    State(state): State<AppState>,
    Path((course_id, module_id, lesson_id)): Path<(String, String, String)>,
    Query(opts): Query<GenerateOpts>,
) -> ApiResult<Json<Course>> {
    let ctx = lesson_context(&state, &course_id, &module_id, &lesson_id).await?;
    let drafts = state
        .generator
        .generate_activities(&ActivitiesParams {
            lesson_title: ctx.lesson_title,
            lesson_description: ctx.lesson_description,
            activity_type: opts.kind,
        })
        .await
        .map_err(e502)?;
    if drafts.is_empty() {
        return Err(e502("generation returned no activities"));
    }
    let fallback = opts.kind.unwrap_or(ActivityType::Assignment);
    let activities = drafts
        .into_iter()
        .map(|d| d.into_activity(new_id(), fallback))
        .collect();
    let patch = LessonPatch { activities: Some(activities), ..Default::default() };
    mutate(&state, &course_id, |s| s.update_lesson(&course_id, &module_id, &lesson_id, patch)).await
}

// --- generation drafts ---

async fn gen_course_idea(
    State(state): State<AppState>,
    Json(params): Json<CourseIdeaParams>,
) -> ApiResult<Json<CourseIdea>> {
    let idea = state
        .generator
        .generate_course_idea(params.category.as_deref())
        .await
        .map_err(e502)?;
    Ok(Json(idea))
}

async fn gen_module(
    State(state): State<AppState>,
    Json(params): Json<ModuleContentParams>,
) -> ApiResult<Json<ModuleDraft>> {
    let draft = state.generator.generate_module_content(&params).await.map_err(e502)?;
    Ok(Json(draft))
}

async fn gen_lesson_content(
    State(state): State<AppState>,
    Json(params): Json<LessonContentParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let content = state.generator.generate_lesson_content(&params).await.map_err(e502)?;
    Ok(Json(serde_json::json!({ "content": content })))
}

async fn gen_outcomes(
    State(state): State<AppState>,
    Json(params): Json<OutcomesParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let outcomes = state.generator.generate_learning_outcomes(&params).await.map_err(e502)?;
    Ok(Json(serde_json::json!({ "outcomes": outcomes })))
}

async fn gen_activities(
    State(state): State<AppState>,
    Json(params): Json<ActivitiesParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let activities = state.generator.generate_activities(&params).await.map_err(e502)?;
    Ok(Json(serde_json::json!({ "activities": activities })))
}

// --- helpers ---
fn e400<T: Into<String>>(msg: T) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg.into())
}

fn e404<T: Into<String>>(msg: T) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, msg.into())
}

fn e409(e: StoreError) -> (StatusCode, String) {
    (StatusCode::CONFLICT, e.to_string())
}

fn e502<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!(error=%e, "generation failed");
    (StatusCode::BAD_GATEWAY, format!("{e}; please try again"))
}

fn e500<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!(error=%e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::test_support::{completion, spawn_fake};
    use axum::{body, body::Body, http::Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn offline_state() -> AppState {
        AppState::new(GenerationClient::new("http://127.0.0.1:1", "", "test-model"))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn seeded(app: &Router) -> (String, String, String, String) {
        let (status, course) = send(
            app,
            "POST",
            "/api/courses",
            Some(json!({ "title": "Intro to X", "description": "Everything about X" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let cid = course["id"].as_str().unwrap().to_string();

        let (status, course) = send(
            app,
            "POST",
            &format!("/api/courses/{cid}/modules"),
            Some(json!({ "title": "Basics", "description": "First steps with X" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let mid = course["modules"][0]["id"].as_str().unwrap().to_string();

        for title in ["One", "Two"] {
            let (status, _) = send(
                app,
                "POST",
                &format!("/api/courses/{cid}/modules/{mid}/lessons"),
                Some(json!({ "title": format!("Lesson {title}"), "description": "A lesson about X" })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }
        let (_, course) = send(app, "GET", &format!("/api/courses/{cid}"), None).await;
        let lessons = &course["modules"][0]["lessons"];
        (
            cid,
            mid,
            lessons[0]["id"].as_str().unwrap().to_string(),
            lessons[1]["id"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn create_course_sets_defaults() {
        let app = router(offline_state());
        let (status, course) = send(
            &app,
            "POST",
            "/api/courses",
            Some(json!({ "title": "Rust 101", "description": "Learn the basics of Rust" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(course["published"], false);
        assert_eq!(course["modules"], json!([]));
        assert_eq!(course["createdAt"], course["updatedAt"]);

        let (_, list) = send(&app, "GET", "/api/courses", None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let app = router(offline_state());
        let (status, _) = send(
            &app,
            "POST",
            "/api/courses",
            Some(json!({ "title": "X", "description": "Everything about X" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lessons_get_increasing_order_and_move() {
        let app = router(offline_state());
        let (cid, mid, l1, l2) = seeded(&app).await;
        let (status, course) = send(
            &app,
            "POST",
            &format!("/api/courses/{cid}/modules/{mid}/lessons/{l2}/move"),
            Some(json!({ "direction": "up" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let lessons = course["modules"][0]["lessons"].as_array().unwrap();
        let order_of = |id: &str| lessons.iter().find(|l| l["id"] == id).unwrap()["order"].clone();
        assert_eq!(order_of(l1.as_str()), 1);
        assert_eq!(order_of(l2.as_str()), 0);
    }

    #[tokio::test]
    async fn unknown_nested_ids_are_silent_but_unknown_course_is_404() {
        let app = router(offline_state());
        let (cid, mid, _, _) = seeded(&app).await;
        let (_, before) = send(&app, "GET", &format!("/api/courses/{cid}"), None).await;

        let (status, after) = send(
            &app,
            "PATCH",
            &format!("/api/courses/{cid}/modules/{mid}/lessons/nope"),
            Some(json!({ "title": "Renamed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(after, before);

        let (status, _) = send(
            &app,
            "PATCH",
            "/api/courses/nope",
            Some(json!({ "title": "Renamed" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patch_course_refreshes_updated_at_and_toggle_publish() {
        let app = router(offline_state());
        let (cid, _, _, _) = seeded(&app).await;
        let (status, course) = send(
            &app,
            "PATCH",
            &format!("/api/courses/{cid}"),
            Some(json!({ "updatedAt": "2030-01-01T00:00:00Z", "title": "Intro to Y" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(course["title"], "Intro to Y");
        assert_eq!(course["updatedAt"], "2030-01-01T00:00:00Z");

        let (_, course) = send(&app, "POST", &format!("/api/courses/{cid}/publish"), None).await;
        assert_eq!(course["published"], true);
        assert_ne!(course["updatedAt"], "2030-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn outcomes_and_activities_routes() {
        let app = router(offline_state());
        let (cid, mid, l1, _) = seeded(&app).await;
        let base = format!("/api/courses/{cid}/modules/{mid}/lessons/{l1}");

        let (status, course) =
            send(&app, "POST", &format!("{base}/outcomes"), Some(json!({ "description": "Explain X" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let oid = course["modules"][0]["lessons"][0]["learningOutcomes"][0]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let (status, course) = send(
            &app,
            "POST",
            &format!("{base}/activities"),
            Some(json!({ "title": "Quiz", "description": "Check X", "type": "quiz", "content": "Q1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(course["modules"][0]["lessons"][0]["activities"][0]["type"], "quiz");

        let (_, course) = send(&app, "DELETE", &format!("{base}/outcomes/{oid}"), None).await;
        assert_eq!(course["modules"][0]["lessons"][0]["learningOutcomes"], json!([]));
    }

    #[tokio::test]
    async fn export_sets_attachment_headers() {
        let app = router(offline_state());
        let (cid, _, _, _) = seeded(&app).await;
        let request = Request::get(format!("/api/courses/{cid}/export"))
            .body(Body::empty())
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert_eq!(disposition, format!("attachment; filename=\"course-{cid}.json\""));
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let parsed = export::parse_export(std::str::from_utf8(&bytes).unwrap()).expect("parse");
        assert_eq!(parsed.id, cid);
        assert_eq!(parsed.modules[0].lessons.len(), 2);
    }

    #[tokio::test]
    async fn current_course_set_and_clear() {
        let app = router(offline_state());
        let (cid, _, _, _) = seeded(&app).await;
        let (status, current) = send(&app, "PUT", "/api/current", Some(json!({ "courseId": cid }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(current["id"], cid.as_str());

        let (status, _) = send(&app, "PUT", "/api/current", Some(json!({ "courseId": "nope" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, current) = send(&app, "PUT", "/api/current", Some(json!({ "courseId": null }))).await;
        assert_eq!(current, Value::Null);
    }

    #[tokio::test]
    async fn delete_course_is_total() {
        let app = router(offline_state());
        let (cid, _, _, _) = seeded(&app).await;
        let (status, _) = send(&app, "DELETE", &format!("/api/courses/{cid}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &format!("/api/courses/{cid}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", &format!("/api/courses/{cid}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn generated_outcomes_are_written_into_lesson() {
        let (generator, _) = spawn_fake(
            StatusCode::OK,
            completion(Some(r#"{"outcomes":["Explain X","Apply X"]}"#)),
        )
        .await;
        let app = router(AppState::new(generator));
        let (cid, mid, l1, _) = seeded(&app).await;
        let (status, course) = send(
            &app,
            "POST",
            &format!("/api/courses/{cid}/modules/{mid}/lessons/{l1}/generate/outcomes?count=2"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let outcomes = course["modules"][0]["lessons"][0]["learningOutcomes"].as_array().unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1]["description"], "Apply X");
    }

    #[tokio::test]
    async fn empty_generation_leaves_lesson_alone() {
        let (generator, _) = spawn_fake(StatusCode::OK, completion(Some("{}"))).await;
        let app = router(AppState::new(generator));
        let (cid, mid, l1, _) = seeded(&app).await;
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/courses/{cid}/modules/{mid}/lessons/{l1}/generate/activities"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let (_, course) = send(&app, "GET", &format!("/api/courses/{cid}"), None).await;
        assert_eq!(course["modules"][0]["lessons"][0]["activities"], json!([]));
    }

    #[tokio::test]
    async fn patch_with_repeated_child_ids_conflicts_and_keeps_course() {
        let app = router(offline_state());
        let (cid, mid, l1, _) = seeded(&app).await;
        let (_, before) = send(&app, "GET", &format!("/api/courses/{cid}"), None).await;

        let module = before["modules"][0].clone();
        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/api/courses/{cid}"),
            Some(json!({ "modules": [module.clone(), module] })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let outcome = json!({ "id": "o1", "description": "Explain X" });
        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/api/courses/{cid}/modules/{mid}/lessons/{l1}"),
            Some(json!({ "learningOutcomes": [outcome.clone(), outcome] })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, after) = send(&app, "GET", &format!("/api/courses/{cid}"), None).await;
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn generated_content_uses_lesson_description() {
        let (generator, seen) = spawn_fake(StatusCode::OK, completion(Some("# One\n\nAll about X."))).await;
        let app = router(AppState::new(generator));
        let (cid, mid, l1, _) = seeded(&app).await;
        let (status, course) = send(
            &app,
            "POST",
            &format!("/api/courses/{cid}/modules/{mid}/lessons/{l1}/generate/content"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(course["modules"][0]["lessons"][0]["content"], "# One\n\nAll about X.");

        let calls = seen.0.lock().await;
        let prompt = calls[0].1["messages"][1]["content"].as_str().unwrap();
        assert!(prompt.contains("Lesson description: A lesson about X"));
        assert!(!prompt.contains("Everything about X"));
    }

    #[tokio::test]
    async fn generated_outcomes_default_to_four() {
        let (generator, seen) =
            spawn_fake(StatusCode::OK, completion(Some(r#"{"outcomes":["Explain X"]}"#))).await;
        let app = router(AppState::new(generator));
        let (cid, mid, l1, _) = seeded(&app).await;
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/courses/{cid}/modules/{mid}/lessons/{l1}/generate/outcomes"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let calls = seen.0.lock().await;
        let prompt = calls[0].1["messages"][1]["content"].as_str().unwrap();
        assert!(prompt.contains("Generate 4 learning outcomes"));
    }

    #[tokio::test]
    async fn generated_lesson_is_appended_to_module() {
        let (generator, seen) = spawn_fake(StatusCode::OK, completion(Some("# Basics\n\nStart here."))).await;
        let app = router(AppState::new(generator));
        let (cid, mid, _, _) = seeded(&app).await;
        let (status, course) = send(
            &app,
            "POST",
            &format!("/api/courses/{cid}/modules/{mid}/lessons/generate"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let lessons = course["modules"][0]["lessons"].as_array().unwrap();
        assert_eq!(lessons.len(), 3);
        let generated = &lessons[2];
        assert_eq!(generated["title"], "Basics");
        assert_eq!(generated["description"], "First steps with X");
        assert_eq!(generated["content"], "# Basics\n\nStart here.");
        assert_eq!(generated["order"], 2);
        assert_eq!(generated["learningOutcomes"], json!([]));
        assert_ne!(generated["id"], lessons[0]["id"]);
        assert_ne!(generated["id"], lessons[1]["id"]);

        let calls = seen.0.lock().await;
        let prompt = calls[0].1["messages"][1]["content"].as_str().unwrap();
        assert!(prompt.contains(r#"in the module "Basics""#));
        drop(calls);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/courses/{cid}/modules/nope/lessons/generate"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn generation_failure_maps_to_bad_gateway() {
        let app = router(offline_state());
        let (status, _) = send(
            &app,
            "POST",
            "/api/generate/course-idea",
            Some(json!({ "category": "design" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn draft_outcomes_endpoint_returns_empty_list_for_missing_field() {
        let (generator, _) = spawn_fake(StatusCode::OK, completion(Some(r#"{"other":1}"#))).await;
        let app = router(AppState::new(generator));
        let (status, body) = send(
            &app,
            "POST",
            "/api/generate/outcomes",
            Some(json!({ "lessonTitle": "Moves", "lessonDescription": "Moving values" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "outcomes": [] }));
    }
}
