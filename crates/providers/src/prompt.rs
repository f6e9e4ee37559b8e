//! Prompt construction for translation requests.

use crate::traits::Message;
use bashai_protocol::{Attempt, OsProfile, Request, ShellDialect, Transcript};

/// Size caps that bound the cost of a single translation request.
#[derive(Debug, Clone, Copy)]
pub struct PromptLimits {
    /// Budget for the user message; older attempts are dropped first to fit.
    pub max_prompt_chars: usize,
    pub max_request_chars: usize,
    /// Tail of stderr kept for the most recent attempt.
    pub max_stderr_chars: usize,
    pub max_stdout_chars: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_prompt_chars: 6_000,
            max_request_chars: 2_000,
            max_stderr_chars: 1_500,
            max_stdout_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    limits: PromptLimits,
}

impl PromptBuilder {
    pub fn new(limits: PromptLimits) -> Self {
        Self { limits }
    }

    pub fn build(&self, request: &Request, transcript: &Transcript) -> Vec<Message> {
        vec![
            Message::system(system_prompt(&request.os_profile)),
            Message::user(self.user_prompt(request, transcript)),
        ]
    }

    fn user_prompt(&self, request: &Request, transcript: &Transcript) -> String {
        let mut prompt = format!(
            "Request: {}\n",
            head_chars(request.raw_text.trim(), self.limits.max_request_chars)
        );

        let Some((last, earlier)) = transcript.attempts().split_last() else {
            return prompt;
        };

        let failure = self.failure_block(last);
        let mut history: Vec<String> = earlier.iter().map(history_line).collect();
        let mut omitted = 0;
        while !history.is_empty()
            && prompt.len() + failure.len() + history_len(&history) > self.limits.max_prompt_chars
        {
            history.remove(0);
            omitted += 1;
        }

        if !history.is_empty() || omitted > 0 {
            prompt.push_str("\nEarlier attempts (oldest first):\n");
            if omitted > 0 {
                prompt.push_str(&format!("({} older attempts omitted)\n", omitted));
            }
            for line in &history {
                prompt.push_str(line);
            }
        }

        prompt.push_str(&failure);
        prompt.push_str(
            "\nThe last command failed. Propose a corrected command that addresses the error above. \
             Do not repeat any command that already failed.\n",
        );
        prompt
    }

    fn failure_block(&self, attempt: &Attempt) -> String {
        let mut block = format!(
            "\nMost recent attempt (#{}):\nCommand: {}\n",
            attempt.attempt_number,
            attempt.candidate.summary()
        );
        if let Some(result) = &attempt.result {
            block.push_str(&format!("Exit code: {}\n", result.exit_code));
            if result.timed_out {
                block.push_str("The command timed out and was killed.\n");
            }
            let stderr = result.stderr.trim();
            if !stderr.is_empty() {
                block.push_str(&format!(
                    "stderr:\n{}\n",
                    tail_chars(stderr, self.limits.max_stderr_chars)
                ));
            }
            let stdout = result.stdout.trim();
            if !stdout.is_empty() {
                block.push_str(&format!(
                    "stdout:\n{}\n",
                    tail_chars(stdout, self.limits.max_stdout_chars)
                ));
            }
        }
        block
    }
}

fn system_prompt(profile: &OsProfile) -> String {
    let fence = match profile.shell {
        ShellDialect::Posix => "bash",
        ShellDialect::Cmd => "cmd",
        ShellDialect::PowerShell => "powershell",
    };
    let hints = profile
        .syntax_hints()
        .iter()
        .map(|h| format!("- {}", h))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You translate natural-language requests into commands for {}.\n\
         Reply with exactly one command inside a ```{} code block, then at most one short sentence of explanation.\n\
         If the request asks for a script or program file, reply instead with one code block whose info string is \
         `file:<name>` and whose body is the complete file contents.\n\
         Never use placeholders the user would have to fill in.\n\
         Syntax notes:\n{}",
        profile.describe(),
        fence,
        hints
    )
}

fn history_line(attempt: &Attempt) -> String {
    let status = match &attempt.result {
        Some(r) if r.timed_out => "timed out".to_string(),
        Some(r) => format!("exit {}", r.exit_code),
        None => "not executed".to_string(),
    };
    format!(
        "#{} {} -> {}\n",
        attempt.attempt_number,
        head_chars(&attempt.candidate.summary(), 300),
        status
    )
}

fn history_len(lines: &[String]) -> usize {
    lines.iter().map(String::len).sum()
}

fn head_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - max).collect();
    format!("...{}", tail)
}
