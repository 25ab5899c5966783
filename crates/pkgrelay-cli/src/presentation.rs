//! Shared CLI presentation utilities.
//!
//! Format-only helpers; nothing here touches the dispatcher.

use pkgrelay_core::{Job, RelayEvent};

/// Truncates a string to a maximum length, adding "..." if needed.
///
/// # Examples
///
/// ```rust
/// use pkgrelay_cli::presentation::truncate_string;
///
/// assert_eq!(truncate_string("Hello", 10), "Hello");
/// assert_eq!(truncate_string("Hello World", 8), "Hello...");
/// ```
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Print a horizontal separator line.
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Header row matching [`job_row`].
pub fn job_header() -> String {
    format!(
        "{:<36} {:<10} {:<4} {:<19} {}",
        "ID", "State", "Try", "Updated", "Destination"
    )
}

/// One table row for a job.
pub fn job_row(job: &Job) -> String {
    format!(
        "{:<36} {:<10} {:<4} {:<19} {}",
        job.id.to_string(),
        job.state.as_str(),
        job.attempts,
        job.updated_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        truncate_string(&job.request.destination_path(), 60)
    )
}

/// Multi-line detail view for a job.
pub fn job_detail(job: &Job) -> String {
    let mut lines = vec![
        format!("id          = {}", job.id),
        format!("asset       = {}", job.request.asset_id),
        format!("version     = {}", job.request.version),
        format!("variant     = {}", job.request.variant),
        format!("channel     = {}", job.request.channel),
        format!("destination = {}", job.request.destination_path()),
        format!("state       = {}", job.state),
        format!("attempts    = {}", job.attempts),
        format!("created     = {}", job.created_at.to_rfc3339()),
        format!("updated     = {}", job.updated_at.to_rfc3339()),
    ];
    if let Some(error) = &job.last_error {
        lines.push(format!("last_error  = {error}"));
    }
    lines.join("\n")
}

/// One progress line for a dispatcher event.
pub fn event_line(event: &RelayEvent) -> String {
    match event {
        RelayEvent::JobQueued { id, destination } => format!("[{id}] queued -> {destination}"),
        RelayEvent::JobStateChanged {
            id,
            state,
            error: Some(error),
        } => format!("[{id}] {state}: {error}"),
        RelayEvent::JobStateChanged { id, state, .. } => format!("[{id}] {state}"),
        RelayEvent::RelayProgress { id, progress } => match progress.percent() {
            Some(percent) => format!("[{id}] {} bytes ({percent:.0}%)", progress.sent),
            None => format!("[{id}] {} bytes", progress.sent),
        },
        RelayEvent::VersionMismatch {
            id,
            requested,
            installed,
        } => format!("[{id}] warning: requested version {requested}, relaying installed {installed}"),
        RelayEvent::JobRemoved { id } => format!("[{id}] removed"),
    }
}
