// Runners Module
// Process runners used by graders to execute exercise checks

pub mod shell;

// Re-export key types
pub use shell::{ShellConfig, ShellOutput, ShellRunner};
