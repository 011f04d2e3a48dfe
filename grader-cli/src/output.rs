// Output formatting helpers for CLI commands
// Status lines go to stderr so stdout stays free for listings

use std::time::Duration;

/// Print a status message: "  Status message"
pub fn status(action: &str, message: &str) {
    eprintln!("\x1b[1;36m{:>12}\x1b[0m {}", action, message);
}

/// Print a header line
pub fn header(message: &str) {
    eprintln!("\x1b[1m==> {}\x1b[0m", message);
}

/// Print a success message with checkmark
pub fn success(message: &str) {
    eprintln!("\x1b[1;32m  \u{2713}\x1b[0m {}", message);
}

/// Print a failure message with X
pub fn failure(message: &str) {
    eprintln!("\x1b[1;31m  \u{2717}\x1b[0m {}", message);
}

/// Print a check/pass item
pub fn check(message: &str) {
    eprintln!("\x1b[32m  \u{2713}\x1b[0m {}", message);
}

pub fn warning(message: &str) {
    eprintln!("\x1b[33m  !\x1b[0m {}", message);
}

pub fn error(message: &str) {
    eprintln!("\x1b[1;31merror:\x1b[0m {}", message);
}

pub fn info(message: &str) {
    eprintln!("\x1b[36m  i\x1b[0m {}", message);
}

// ============================================================================
// Job lines, exactly one per exercise
// ============================================================================

pub fn job_unchanged(id: &str) {
    eprintln!("\x1b[2m  {}: no changes\x1b[0m", id);
}

pub fn job_passed(id: &str, duration: Duration) {
    eprintln!(
        "\x1b[32m  {}: [OK]\x1b[0m ({:.2}s)",
        id,
        duration.as_secs_f64()
    );
}

pub fn job_failed(id: &str, duration: Duration, exit_code: Option<i32>) {
    let exit_info = match exit_code {
        Some(code) if code != 0 => format!(", exit code {}", code),
        _ => String::new(),
    };
    eprintln!(
        "\x1b[31m  {}: [FAILED]\x1b[0m ({:.2}s{})",
        id,
        duration.as_secs_f64(),
        exit_info
    );
}
