//! In-memory course document store.
//!
//! Every operation takes `&self` and returns the next store value; the
//! previous value is never touched. Courses are held behind `Arc`, so a
//! course that an operation did not change keeps its pointer identity and
//! consumers can detect change with `Arc::ptr_eq`. Unknown ids are never an
//! error: the operation hands back an identical store. Ids must be unique
//! among siblings, and that holds for whole lists arriving in a patch too.

use std::{collections::HashSet, sync::Arc};

use thiserror::Error;

use crate::models::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} with id {id} already exists")]
    DuplicateId { kind: &'static str, id: String },
}

fn duplicate(kind: &'static str, id: &str) -> StoreError {
    StoreError::DuplicateId { kind, id: id.to_string() }
}

fn unique<'a>(kind: &'static str, ids: impl IntoIterator<Item = &'a str>) -> Result<(), StoreError> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .try_for_each(|id| if seen.insert(id) { Ok(()) } else { Err(duplicate(kind, id)) })
}

fn check_modules(modules: &[Module]) -> Result<(), StoreError> {
    unique("module", modules.iter().map(|m| m.id.as_str()))?;
    modules.iter().try_for_each(|m| check_lessons(&m.lessons))
}

fn check_lessons(lessons: &[Lesson]) -> Result<(), StoreError> {
    unique("lesson", lessons.iter().map(|l| l.id.as_str()))?;
    lessons.iter().try_for_each(check_lesson)
}

fn check_lesson(lesson: &Lesson) -> Result<(), StoreError> {
    check_outcomes(&lesson.learning_outcomes)?;
    check_activities(&lesson.activities)
}

fn check_outcomes(outcomes: &[LearningOutcome]) -> Result<(), StoreError> {
    unique("learning outcome", outcomes.iter().map(|o| o.id.as_str()))
}

fn check_activities(activities: &[Activity]) -> Result<(), StoreError> {
    unique("activity", activities.iter().map(|a| a.id.as_str()))
}

#[derive(Debug, Clone, Default)]
pub struct CourseStore {
    courses: Vec<Arc<Course>>,
    current: Option<Arc<Course>>,
}

impl CourseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn courses(&self) -> &[Arc<Course>] {
        &self.courses
    }

    pub fn course(&self, course_id: &str) -> Option<&Arc<Course>> {
        self.courses.iter().find(|c| c.id == course_id)
    }

    /// The focused course. If it is still in the collection the latest
    /// version is returned, otherwise the value it was set with.
    pub fn current_course(&self) -> Option<&Arc<Course>> {
        let current = self.current.as_ref()?;
        self.course(&current.id).or(Some(current))
    }

    pub fn set_current_course(&self, course: Option<Arc<Course>>) -> Self {
        Self { courses: self.courses.clone(), current: course }
    }

    // --- courses ---

    pub fn add_course(&self, course: Course) -> Result<Self, StoreError> {
        if self.course(&course.id).is_some() {
            return Err(duplicate("course", &course.id));
        }
        check_modules(&course.modules)?;
        let mut courses = self.courses.clone();
        courses.push(Arc::new(course));
        Ok(Self { courses, current: self.current.clone() })
    }

    /// Shallow merge. A replacement `modules` list is checked for repeated
    /// ids at every level before anything is applied.
    pub fn update_course(&self, course_id: &str, patch: CoursePatch) -> Result<Self, StoreError> {
        if let Some(modules) = &patch.modules {
            check_modules(modules)?;
        }
        Ok(self.edit_course(course_id, |course| Some(patch.apply(course))))
    }

    pub fn delete_course(&self, course_id: &str) -> Self {
        if self.course(course_id).is_none() {
            return self.clone();
        }
        let courses = self
            .courses
            .iter()
            .filter(|c| c.id != course_id)
            .cloned()
            .collect();
        let current = self.current.clone().filter(|c| c.id != course_id);
        Self { courses, current }
    }

    // --- modules ---

    pub fn add_module(&self, course_id: &str, module: Module) -> Result<Self, StoreError> {
        if let Some(course) = self.course(course_id) {
            if course.module(&module.id).is_some() {
                return Err(duplicate("module", &module.id));
            }
        }
        check_lessons(&module.lessons)?;
        Ok(self.edit_course(course_id, |course| {
            let mut next = course.clone();
            next.modules.push(module);
            Some(next)
        }))
    }

    pub fn update_module(
        &self,
        course_id: &str,
        module_id: &str,
        patch: ModulePatch,
    ) -> Result<Self, StoreError> {
        if let Some(lessons) = &patch.lessons {
            check_lessons(lessons)?;
        }
        Ok(self.patch_module(course_id, module_id, patch))
    }

    pub fn delete_module(&self, course_id: &str, module_id: &str) -> Self {
        self.edit_course(course_id, |course| {
            let idx = course.modules.iter().position(|m| m.id == module_id)?;
            let mut next = course.clone();
            next.modules.remove(idx);
            Some(next)
        })
    }

    /// Swaps the module's `order` with its neighbour in display order.
    pub fn move_module(&self, course_id: &str, module_id: &str, direction: Direction) -> Self {
        let Some(course) = self.course(course_id) else {
            return self.clone();
        };
        let ranked: Vec<(String, i32)> = course
            .sorted_modules()
            .into_iter()
            .map(|m| (m.id.clone(), m.order))
            .collect();
        let Some((a, b)) = swap_pair(&ranked, module_id, direction) else {
            return self.clone();
        };
        self.patch_module(course_id, &a.0, ModulePatch::order(b.1))
            .patch_module(course_id, &b.0, ModulePatch::order(a.1))
    }

    // --- lessons ---

    pub fn add_lesson(
        &self,
        course_id: &str,
        module_id: &str,
        lesson: Lesson,
    ) -> Result<Self, StoreError> {
        if let Some(module) = self.course(course_id).and_then(|c| c.module(module_id)) {
            if module.lesson(&lesson.id).is_some() {
                return Err(duplicate("lesson", &lesson.id));
            }
        }
        check_lesson(&lesson)?;
        Ok(self.edit_course(course_id, |course| {
            edit_module(course, module_id, |module| {
                let mut next = module.clone();
                next.lessons.push(lesson);
                Some(next)
            })
        }))
    }

    pub fn update_lesson(
        &self,
        course_id: &str,
        module_id: &str,
        lesson_id: &str,
        patch: LessonPatch,
    ) -> Result<Self, StoreError> {
        if let Some(outcomes) = &patch.learning_outcomes {
            check_outcomes(outcomes)?;
        }
        if let Some(activities) = &patch.activities {
            check_activities(activities)?;
        }
        Ok(self.patch_lesson(course_id, module_id, lesson_id, patch))
    }

    pub fn delete_lesson(&self, course_id: &str, module_id: &str, lesson_id: &str) -> Self {
        self.edit_course(course_id, |course| {
            edit_module(course, module_id, |module| {
                let idx = module.lessons.iter().position(|l| l.id == lesson_id)?;
                let mut next = module.clone();
                next.lessons.remove(idx);
                Some(next)
            })
        })
    }

    /// Swaps the lesson's `order` with its neighbour in display order.
    pub fn move_lesson(
        &self,
        course_id: &str,
        module_id: &str,
        lesson_id: &str,
        direction: Direction,
    ) -> Self {
        let Some(module) = self.course(course_id).and_then(|c| c.module(module_id)) else {
            return self.clone();
        };
        let ranked: Vec<(String, i32)> = module
            .sorted_lessons()
            .into_iter()
            .map(|l| (l.id.clone(), l.order))
            .collect();
        let Some((a, b)) = swap_pair(&ranked, lesson_id, direction) else {
            return self.clone();
        };
        self.patch_lesson(course_id, module_id, &a.0, LessonPatch::order(b.1))
            .patch_lesson(course_id, module_id, &b.0, LessonPatch::order(a.1))
    }

    // --- outcomes & activities ---

    pub fn add_learning_outcome(
        &self,
        course_id: &str,
        module_id: &str,
        lesson_id: &str,
        outcome: LearningOutcome,
    ) -> Result<Self, StoreError> {
        let Some(lesson) = self.lesson(course_id, module_id, lesson_id) else {
            return Ok(self.clone());
        };
        if lesson.learning_outcomes.iter().any(|o| o.id == outcome.id) {
            return Err(duplicate("learning outcome", &outcome.id));
        }
        let mut outcomes = lesson.learning_outcomes.clone();
        outcomes.push(outcome);
        let patch = LessonPatch { learning_outcomes: Some(outcomes), ..Default::default() };
        Ok(self.patch_lesson(course_id, module_id, lesson_id, patch))
    }

    pub fn delete_learning_outcome(
        &self,
        course_id: &str,
        module_id: &str,
        lesson_id: &str,
        outcome_id: &str,
    ) -> Self {
        let Some(lesson) = self.lesson(course_id, module_id, lesson_id) else {
            return self.clone();
        };
        if !lesson.learning_outcomes.iter().any(|o| o.id == outcome_id) {
            return self.clone();
        }
        let outcomes = lesson
            .learning_outcomes
            .iter()
            .filter(|o| o.id != outcome_id)
            .cloned()
            .collect();
        let patch = LessonPatch { learning_outcomes: Some(outcomes), ..Default::default() };
        self.patch_lesson(course_id, module_id, lesson_id, patch)
    }

    pub fn add_activity(
        &self,
        course_id: &str,
        module_id: &str,
        lesson_id: &str,
        activity: Activity,
    ) -> Result<Self, StoreError> {
        let Some(lesson) = self.lesson(course_id, module_id, lesson_id) else {
            return Ok(self.clone());
        };
        if lesson.activities.iter().any(|a| a.id == activity.id) {
            return Err(duplicate("activity", &activity.id));
        }
        let mut activities = lesson.activities.clone();
        activities.push(activity);
        let patch = LessonPatch { activities: Some(activities), ..Default::default() };
        Ok(self.patch_lesson(course_id, module_id, lesson_id, patch))
    }

    pub fn delete_activity(
        &self,
        course_id: &str,
        module_id: &str,
        lesson_id: &str,
        activity_id: &str,
    ) -> Self {
        let Some(lesson) = self.lesson(course_id, module_id, lesson_id) else {
            return self.clone();
        };
        if !lesson.activities.iter().any(|a| a.id == activity_id) {
            return self.clone();
        }
        let activities = lesson
            .activities
            .iter()
            .filter(|a| a.id != activity_id)
            .cloned()
            .collect();
        let patch = LessonPatch { activities: Some(activities), ..Default::default() };
        self.patch_lesson(course_id, module_id, lesson_id, patch)
    }

    // --- helpers ---

    fn lesson(&self, course_id: &str, module_id: &str, lesson_id: &str) -> Option<&Lesson> {
        self.course(course_id)?.module(module_id)?.lesson(lesson_id)
    }

    // Unchecked merges; callers have already ruled out repeated ids.
    fn patch_module(&self, course_id: &str, module_id: &str, patch: ModulePatch) -> Self {
        self.edit_course(course_id, |course| {
            edit_module(course, module_id, |module| Some(patch.apply(module)))
        })
    }

    fn patch_lesson(
        &self,
        course_id: &str,
        module_id: &str,
        lesson_id: &str,
        patch: LessonPatch,
    ) -> Self {
        self.edit_course(course_id, |course| {
            edit_module(course, module_id, |module| {
                edit_lesson(module, lesson_id, |lesson| Some(patch.apply(lesson)))
            })
        })
    }

    /// Replaces one course with `f`'s result. `None` from `f`, or a missing
    /// course, yields a clone that shares every `Arc`.
    fn edit_course<F>(&self, course_id: &str, f: F) -> Self
    where
        F: FnOnce(&Course) -> Option<Course>,
    {
        let Some(idx) = self.courses.iter().position(|c| c.id == course_id) else {
            return self.clone();
        };
        let Some(next) = f(&self.courses[idx]) else {
            return self.clone();
        };
        let mut courses = self.courses.clone();
        courses[idx] = Arc::new(next);
        Self { courses, current: self.current.clone() }
    }
}

fn edit_module<F>(course: &Course, module_id: &str, f: F) -> Option<Course>
where
    F: FnOnce(&Module) -> Option<Module>,
{
    let idx = course.modules.iter().position(|m| m.id == module_id)?;
    let module = f(&course.modules[idx])?;
    let mut next = course.clone();
    next.modules[idx] = module;
    Some(next)
}

fn edit_lesson<F>(module: &Module, lesson_id: &str, f: F) -> Option<Module>
where
    F: FnOnce(&Lesson) -> Option<Lesson>,
{
    let idx = module.lessons.iter().position(|l| l.id == lesson_id)?;
    let lesson = f(&module.lessons[idx])?;
    let mut next = module.clone();
    next.lessons[idx] = lesson;
    Some(next)
}

/// `ranked` is (id, order) in display order. Returns the entry and the
/// neighbour it swaps with, or `None` at either edge.
fn swap_pair<'a>(
    ranked: &'a [(String, i32)],
    id: &str,
    direction: Direction,
) -> Option<(&'a (String, i32), &'a (String, i32))> {
    let pos = ranked.iter().position(|(rid, _)| rid == id)?;
    let target = match direction {
        Direction::Up => pos.checked_sub(1)?,
        Direction::Down => pos + 1,
    };
    Some((&ranked[pos], ranked.get(target)?))
}
