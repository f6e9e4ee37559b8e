use bashai_core::{ControllerState, MetricsSnapshot, RunReport};
use bashai_memory::HistoryEntry;
use bashai_protocol::{Attempt, SafetyVerdict};

const UI_RESET: &str = "\x1b[0m";
const UI_BOLD: &str = "\x1b[1m";
const UI_DIM: &str = "\x1b[2m";
const UI_ACCENT: &str = "\x1b[38;5;39m";
const UI_INFO: &str = "\x1b[38;5;81m";
const UI_SUCCESS: &str = "\x1b[38;5;42m";
const UI_WARN: &str = "\x1b[38;5;214m";
const UI_DANGER: &str = "\x1b[38;5;203m";

/// Output lines kept per stream when rendering an attempt.
const MAX_OUTPUT_LINES: usize = 40;

fn use_color() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

fn paint(text: &str, style: &str) -> String {
    if use_color() {
        format!("{style}{text}{UI_RESET}")
    } else {
        text.to_string()
    }
}

pub fn ui_title(text: &str) -> String {
    paint(text, UI_BOLD)
}

pub fn ui_accent(text: &str) -> String {
    paint(text, UI_ACCENT)
}

pub fn ui_dim(text: &str) -> String {
    paint(text, UI_DIM)
}

pub fn ui_info(text: &str) -> String {
    paint(text, UI_INFO)
}

pub fn ui_success(text: &str) -> String {
    paint(text, UI_SUCCESS)
}

pub fn ui_warn(text: &str) -> String {
    paint(text, UI_WARN)
}

pub fn ui_danger(text: &str) -> String {
    paint(text, UI_DANGER)
}

fn state_badge(state: ControllerState) -> String {
    let label = state.as_str().to_uppercase();
    match state {
        ControllerState::Succeeded => ui_success(&label),
        ControllerState::Blocked => ui_danger(&label),
        ControllerState::Exhausted | ControllerState::Aborted => ui_warn(&label),
        _ => ui_info(&label),
    }
}

fn verdict_label(verdict: &SafetyVerdict) -> String {
    match verdict {
        SafetyVerdict::Allow => ui_dim("allowed"),
        SafetyVerdict::RequireConfirmation { reason } => ui_warn(&format!("confirm: {}", reason)),
        SafetyVerdict::Block { reason } => ui_danger(&format!("blocked: {}", reason)),
    }
}

/// Full transcript of a finished request.
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    for attempt in report.transcript.attempts() {
        out.push_str(&render_attempt(attempt));
    }

    out.push_str(&format!("{} {}", ui_title("Result:"), state_badge(report.state)));
    if let Some(reason) = &report.reason {
        out.push_str(&format!(" ({})", reason));
    }
    out.push('\n');

    if let Some(url) = &report.search_url {
        out.push_str(&format!("{} {}\n", ui_info("Search for help:"), ui_accent(url)));
    }
    out
}

fn render_attempt(attempt: &Attempt) -> String {
    let candidate = &attempt.candidate;
    let mut out = format!(
        "{} {}\n",
        ui_title(&format!("[{}]", attempt.attempt_number)),
        ui_accent(&candidate.summary())
    );
    if let Some(explanation) = &candidate.explanation {
        out.push_str(&format!("    {}\n", ui_dim(explanation)));
    }
    out.push_str(&format!("    safety: {}\n", verdict_label(&attempt.verdict)));

    let Some(result) = &attempt.result else {
        out.push_str(&format!("    {}\n", ui_dim("not executed")));
        return out;
    };

    let status = if result.success() {
        ui_success(&format!("exit {}", result.exit_code))
    } else {
        ui_danger(&format!("exit {}", result.exit_code))
    };
    out.push_str(&format!("    {} in {:.2}s", status, result.duration.as_secs_f64()));
    if result.timed_out {
        out.push_str(&format!(" {}", ui_warn("(timed out)")));
    }
    out.push('\n');

    for (label, text) in [("stdout", &result.stdout), ("stderr", &result.stderr)] {
        let text = text.trim_end();
        if text.is_empty() {
            continue;
        }
        out.push_str(&format!("    {}\n", ui_dim(&format!("{}:", label))));
        let lines: Vec<&str> = text.lines().collect();
        let skipped = lines.len().saturating_sub(MAX_OUTPUT_LINES);
        if skipped > 0 {
            out.push_str(&format!("      {}\n", ui_dim(&format!("... {} earlier lines", skipped))));
        }
        for line in &lines[skipped..] {
            out.push_str(&format!("      {}\n", line));
        }
    }
    out
}

/// Numbered command list, one per line.
pub fn format_commands(commands: &[String]) -> String {
    commands
        .iter()
        .enumerate()
        .map(|(i, cmd)| format!("  {}. {}", i + 1, cmd))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return format!("{}\n", ui_dim("No history yet."));
    }

    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!(
            "{} {} {}\n",
            ui_dim(&entry.timestamp.format("%Y-%m-%d %H:%M").to_string()),
            ui_title(&entry.request),
            ui_dim(&format!("[{}]", entry.outcome))
        ));
        if !entry.commands.is_empty() {
            out.push_str(&format_commands(&entry.commands));
            out.push('\n');
        }
    }
    out
}

pub fn render_stats(snapshot: &MetricsSnapshot) -> String {
    format!("{}\n{}\n", ui_title("Session stats"), snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_commands_numbers_from_one() {
        let commands = vec!["ls".to_string(), "ls -la".to_string()];
        assert_eq!(format_commands(&commands), "  1. ls\n  2. ls -la");
        assert_eq!(format_commands(&[]), "");
    }
}
