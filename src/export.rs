use crate::models::Course;

pub fn export_course(course: &Course) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(course)
}

pub fn parse_export(json: &str) -> Result<Course, serde_json::Error> {
    serde_json::from_str(json)
}

pub fn export_filename(course: &Course) -> String {
    format!("course-{}.json", course.id)
}
