// Form rules enforced before anything reaches the store

use crate::models::*;

pub const MIN_TITLE_LEN: usize = 3;
pub const MIN_DESCRIPTION_LEN: usize = 10;
pub const MIN_CONTENT_LEN: usize = 10;
pub const MIN_ESTIMATED_TIME: u32 = 1;

pub type Invalid = String;

fn min_chars(field: &str, v: &str, min: usize) -> Result<(), Invalid> {
    if v.trim().chars().count() < min {
        return Err(format!("{field} must be at least {min} characters"));
    }
    Ok(())
}

fn title(entity: &str, v: &str) -> Result<(), Invalid> {
    min_chars(&format!("{entity} title"), v, MIN_TITLE_LEN)
}

fn description(entity: &str, v: &str) -> Result<(), Invalid> {
    min_chars(&format!("{entity} description"), v, MIN_DESCRIPTION_LEN)
}

fn estimated_time(v: u32) -> Result<(), Invalid> {
    if v < MIN_ESTIMATED_TIME {
        return Err(format!("estimated time must be at least {MIN_ESTIMATED_TIME} minute"));
    }
    Ok(())
}

pub fn course_req(req: &CreateCourseReq) -> Result<(), Invalid> {
    title("course", &req.title)?;
    description("course", &req.description)
}

pub fn course_patch(p: &CoursePatch) -> Result<(), Invalid> {
    if let Some(v) = &p.title {
        title("course", v)?;
    }
    if let Some(v) = &p.description {
        description("course", v)?;
    }
    Ok(())
}

pub fn module_req(req: &CreateModuleReq) -> Result<(), Invalid> {
    title("module", &req.title)?;
    description("module", &req.description)?;
    if let Some(v) = req.estimated_time {
        estimated_time(v)?;
    }
    Ok(())
}

pub fn module_patch(p: &ModulePatch) -> Result<(), Invalid> {
    if let Some(v) = &p.title {
        title("module", v)?;
    }
    if let Some(v) = &p.description {
        description("module", v)?;
    }
    if let Some(v) = p.estimated_time {
        estimated_time(v)?;
    }
    Ok(())
}

pub fn lesson_req(req: &CreateLessonReq) -> Result<(), Invalid> {
    title("lesson", &req.title)?;
    description("lesson", &req.description)
}

pub fn lesson_patch(p: &LessonPatch) -> Result<(), Invalid> {
    if let Some(v) = &p.title {
        title("lesson", v)?;
    }
    if let Some(v) = &p.description {
        description("lesson", v)?;
    }
    if let Some(v) = &p.content {
        min_chars("lesson content", v, MIN_CONTENT_LEN)?;
    }
    Ok(())
}

pub fn generate_lesson_req(req: &GenerateLessonReq) -> Result<(), Invalid> {
    if let Some(v) = &req.title {
        title("lesson", v)?;
    }
    if let Some(v) = &req.description {
        description("lesson", v)?;
    }
    Ok(())
}

pub fn outcome_req(req: &CreateOutcomeReq) -> Result<(), Invalid> {
    min_chars("outcome description", &req.description, 1)
}

pub fn activity_req(req: &CreateActivityReq) -> Result<(), Invalid> {
    min_chars("activity title", &req.title, 1)
}
