//! Grammar for model replies.
//!
//! ```text
//! reply   := prose? fence prose? | plain
//! fence   := "```" info NL body "```"
//! info    := ""                      -> Shell
//!          | shell-tag               -> Shell
//!          | "file:" name            -> FileGeneration(name)
//!          | lang (SP name)?         -> FileGeneration(name | generated.<ext>)
//! plain   := first non-empty line, optional "Command:" prefix, rest is explanation
//! ```
//!
//! Only the first fenced block is considered.

use bashai_protocol::CommandCandidate;
use thiserror::Error;

const SHELL_TAGS: &[&str] = &[
    "bash", "sh", "shell", "zsh", "console", "terminal", "powershell", "pwsh", "ps1", "cmd",
    "bat", "batch",
];

const PROMPT_PREFIXES: &[&str] = &["$ ", "> ", "PS> ", "C:\\> "];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply is empty")]
    Empty,
    #[error("code block is not closed")]
    UnclosedFence,
    #[error("code block contains no command")]
    EmptyBlock,
    #[error("reply contains no command")]
    NoCommand,
}

enum FenceKind {
    Shell,
    File(String),
}

pub fn parse_reply(reply: &str, origin_attempt: u32) -> Result<CommandCandidate, ReplyError> {
    if reply.trim().is_empty() {
        return Err(ReplyError::Empty);
    }

    let lines: Vec<&str> = reply.lines().collect();
    let Some(open) = lines.iter().position(|l| l.trim_start().starts_with("```")) else {
        return parse_plain(&lines, origin_attempt);
    };

    let close = lines[open + 1..]
        .iter()
        .position(|l| l.trim_start().starts_with("```"))
        .map(|offset| open + 1 + offset)
        .ok_or(ReplyError::UnclosedFence)?;

    let info = lines[open].trim_start().trim_start_matches('`').trim();
    let body = &lines[open + 1..close];
    let explanation = lines[..open]
        .iter()
        .chain(lines[close + 1..].iter())
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let candidate = match fence_kind(info) {
        FenceKind::Shell => {
            let command = first_command(body).ok_or(ReplyError::EmptyBlock)?;
            CommandCandidate::shell(command, origin_attempt)
        }
        FenceKind::File(name) => {
            let contents = body.join("\n");
            if contents.trim().is_empty() {
                return Err(ReplyError::EmptyBlock);
            }
            CommandCandidate::file(name, format!("{}\n", contents.trim_end()), origin_attempt)
        }
    };

    Ok(candidate.with_explanation(explanation))
}

fn parse_plain(lines: &[&str], origin_attempt: u32) -> Result<CommandCandidate, ReplyError> {
    let Some(index) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return Err(ReplyError::Empty);
    };

    let mut command = lines[index].trim();
    for prefix in ["Command:", "command:", "COMMAND:"] {
        if let Some(rest) = command.strip_prefix(prefix) {
            command = rest.trim();
        }
    }
    let command = strip_prompt(command.trim_matches('`').trim());
    if command.is_empty() {
        return Err(ReplyError::NoCommand);
    }

    let explanation = lines[index + 1..]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(CommandCandidate::shell(command, origin_attempt).with_explanation(explanation))
}

fn fence_kind(info: &str) -> FenceKind {
    if let Some(name) = info
        .strip_prefix("file:")
        .or_else(|| info.strip_prefix("file="))
    {
        let name = name.trim();
        return FenceKind::File(if name.is_empty() {
            "generated.txt".to_string()
        } else {
            name.to_string()
        });
    }

    let mut tokens = info.split_whitespace();
    let Some(lang) = tokens.next().map(|t| t.to_lowercase()) else {
        return FenceKind::Shell;
    };
    let name = tokens
        .next()
        .map(|t| {
            t.trim_start_matches("filename=")
                .trim_start_matches("file=")
                .trim_matches('"')
                .to_string()
        })
        .filter(|t| !t.is_empty());

    match name {
        Some(name) => FenceKind::File(name),
        None if SHELL_TAGS.contains(&lang.as_str()) => FenceKind::Shell,
        None => FenceKind::File(format!("generated.{}", extension_for(&lang))),
    }
}

fn extension_for(lang: &str) -> &'static str {
    match lang {
        "python" | "py" | "python3" => "py",
        "javascript" | "js" | "node" => "js",
        "typescript" | "ts" => "ts",
        "ruby" | "rb" => "rb",
        "perl" | "pl" => "pl",
        "rust" | "rs" => "rs",
        "go" | "golang" => "go",
        "c" => "c",
        "cpp" | "c++" => "cpp",
        "java" => "java",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "sql" => "sql",
        "markdown" | "md" => "md",
        _ => "txt",
    }
}

/// First executable line of a shell block, joining `\` continuations.
fn first_command(body: &[&str]) -> Option<String> {
    let mut command = String::new();
    for raw in body {
        let line = strip_prompt(raw.trim());
        if command.is_empty() && (line.is_empty() || is_comment(line)) {
            continue;
        }
        match line.strip_suffix('\\') {
            Some(head) => {
                command.push_str(head.trim_end());
                command.push(' ');
            }
            None => {
                command.push_str(line);
                break;
            }
        }
    }
    let command = command.trim().to_string();
    (!command.is_empty()).then_some(command)
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with("::") || line.to_lowercase().starts_with("rem ")
}

fn strip_prompt(line: &str) -> &str {
    for prefix in PROMPT_PREFIXES {
        if let Some(rest) = line.strip_prefix(prefix) {
            return rest.trim_start();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use bashai_protocol::CandidateKind;

    #[test]
    fn test_plain_single_line() {
        let c = parse_reply("find . -name \"*.py\"", 1).unwrap();
        assert_eq!(c.text, "find . -name \"*.py\"");
        assert_eq!(c.kind, CandidateKind::Shell);
        assert_eq!(c.origin_attempt, 1);
        assert!(c.explanation.is_none());
    }

    #[test]
    fn test_plain_with_prefix_and_explanation() {
        let c = parse_reply("\nCommand: `ls -la`\nLists all files.\n", 2).unwrap();
        assert_eq!(c.text, "ls -la");
        assert_eq!(c.explanation.as_deref(), Some("Lists all files."));
    }

    #[test]
    fn test_fenced_shell_block() {
        let reply = "Here you go:\n```bash\n# list python sources\n$ find . -name '*.py'\necho extra\n```\nFinds Python files.";
        let c = parse_reply(reply, 1).unwrap();
        assert_eq!(c.kind, CandidateKind::Shell);
        assert_eq!(c.text, "find . -name '*.py'");
        assert_eq!(c.explanation.as_deref(), Some("Here you go: Finds Python files."));
    }

    #[test]
    fn test_untagged_fence_is_shell() {
        let c = parse_reply("```\ndir /b\n```", 1).unwrap();
        assert_eq!(c.kind, CandidateKind::Shell);
        assert_eq!(c.text, "dir /b");
    }

    #[test]
    fn test_line_continuation() {
        let c = parse_reply("```sh\ntar -czf out.tgz \\\n  src\n```", 1).unwrap();
        assert_eq!(c.text, "tar -czf out.tgz src");
    }

    #[test]
    fn test_file_tag() {
        let c = parse_reply("```file:scripts/hello.py\nprint('hi')\n```", 3).unwrap();
        assert_eq!(c.file_name(), Some("scripts/hello.py"));
        assert_eq!(c.text, "print('hi')\n");
        assert_eq!(c.origin_attempt, 3);
    }

    #[test]
    fn test_language_with_name_and_language_only() {
        let named = parse_reply("```python backup.py\nimport os\n```", 1).unwrap();
        assert_eq!(named.file_name(), Some("backup.py"));

        let unnamed = parse_reply("```python\nimport os\n```", 1).unwrap();
        assert_eq!(unnamed.file_name(), Some("generated.py"));

        let shell_named = parse_reply("```bash setup.sh\nset -e\n```", 1).unwrap();
        assert_eq!(shell_named.file_name(), Some("setup.sh"));
    }

    #[test]
    fn test_malformed_replies() {
        assert_eq!(parse_reply("   \n ", 1), Err(ReplyError::Empty));
        assert_eq!(parse_reply("```bash\nls", 1), Err(ReplyError::UnclosedFence));
        assert_eq!(parse_reply("```bash\n# only a comment\n```", 1), Err(ReplyError::EmptyBlock));
        assert_eq!(parse_reply("```python\n\n```", 1), Err(ReplyError::EmptyBlock));
        assert_eq!(parse_reply("Command: ``", 1), Err(ReplyError::NoCommand));
    }
}
