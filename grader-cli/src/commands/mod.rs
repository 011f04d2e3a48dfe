pub mod build;
pub mod validate;
pub mod worker;

use exercise_service::ScriptGrader;

/// The grader shared by the parent process and its workers
pub fn grader() -> ScriptGrader {
    ScriptGrader::new()
}
