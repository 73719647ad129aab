//! Rule-based intent classification for voice and text commands.

use regex::{Regex, RegexBuilder};

use crate::domain::models::{Intent, ParsedCommand};

const PATTERN_CONFIDENCE: f64 = 0.8;
const VERB_CONFIDENCE: f64 = 0.6;
const UNKNOWN_CONFIDENCE: f64 = 0.3;

/// Normalized commands at or below this length never take the verb fallback.
const MIN_FALLBACK_LEN: usize = 10;

/// Intent groups in precedence order. The first group with a matching pattern wins.
const INTENT_PATTERNS: &[(Intent, &[&str])] = &[
    (
        Intent::CreateTask,
        &[
            r"^(please\s+)?(can|could|would)\s+you\s+(please\s+)?(add|create|implement|fix|build|write|make|update|refactor)\b",
            r"^(please\s+)?(add|create|implement|fix|build|write|make)\b",
            r"^(i\s+want|i\s+need|i'd\s+like|let's|lets)\s+(you\s+to\s+)?(add|create|implement|fix|build|write|make|update|refactor)\b",
            r"\bnew\s+task\b",
        ],
    ),
    (
        Intent::ListTasks,
        &[
            r"\b(list|show)(\s+me)?(\s+all)?(\s+the)?(\s+my)?(\s+current)?\s+tasks\b",
            r"^what\s+are(\s+all)?\s+(my|the)\s+tasks\b",
            r"\ball\s+(my\s+)?tasks\b",
        ],
    ),
    (
        Intent::CancelTask,
        &[
            r"^(please\s+)?(cancel|stop|abort|kill|halt)\b",
            r"\bcancel\s+(the\s+|this\s+|that\s+|my\s+|current\s+)?task\b",
        ],
    ),
    (
        Intent::CheckStatus,
        &[
            r"\bstatus\b",
            r"\bprogress\b",
            r"^(how\s+is|how's)\b",
            r"^is\s+(it|the\s+task)\s+(done|finished|complete)\b",
            r"\bwhat('s|\s+is)\s+happening\b",
        ],
    ),
];

const ACTION_VERBS: &[&str] = &[
    "add", "create", "implement", "fix", "update", "refactor", "remove", "delete", "change", "modify",
    "improve", "optimize", "write", "build", "test", "debug", "deploy", "configure",
];

/// Applied in order, once each, to the original text of a `create_task` command.
const TASK_PREFIXES: &[&str] = &[
    r"^(hey|ok|okay)\s*,?\s+",
    r"^please\s+",
    r"^(can|could|would)\s+you\s+(please\s+)?",
    r"^(i\s+want|i\s+need|i'd\s+like)\s+you\s+to\s+",
    r"^(create|add|make|start)\s+(a\s+)?(new\s+)?task\s+(to|for)\s+",
    r"^new\s+task\s*:?\s*",
    r"^task\s*:\s*",
];

const GITHUB_URL_PATTERN: &str = r"https?://(?:www\.)?github\.com/[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+";

/// Deterministic, side-effect free command classifier.
#[derive(Debug)]
pub struct CommandParser {
    intents: Vec<(Intent, Vec<Regex>)>,
    verb_pattern: Regex,
    task_prefixes: Vec<Regex>,
    repo_pattern: Regex,
    repo_mention: Regex,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandParser {
    /// Parser with the built-in phrase tables.
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let compile = |pattern: &str| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("built-in command pattern must compile")
        };

        let intents = INTENT_PATTERNS
            .iter()
            .map(|(intent, patterns)| (*intent, patterns.iter().map(|p| compile(p)).collect()))
            .collect();

        Self {
            intents,
            verb_pattern: compile(&format!(r"\b({})\b", ACTION_VERBS.join("|"))),
            task_prefixes: TASK_PREFIXES.iter().map(|p| compile(p)).collect(),
            repo_pattern: compile(GITHUB_URL_PATTERN),
            repo_mention: compile(&format!(r"\s*\b(to|in|on|for|at)?\s*{GITHUB_URL_PATTERN}\S*")),
        }
    }

    /// Classify `text`. Total: every input yields a command.
    pub fn parse(&self, text: &str) -> ParsedCommand {
        let normalized = text.trim().to_lowercase();

        let matched = self
            .intents
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(&normalized)))
            .map(|(intent, _)| *intent);

        let (intent, confidence) = match matched {
            Some(intent) => (intent, PATTERN_CONFIDENCE),
            None if normalized.chars().count() > MIN_FALLBACK_LEN
                && self.verb_pattern.is_match(&normalized) =>
            {
                (Intent::CreateTask, VERB_CONFIDENCE)
            }
            None => return ParsedCommand::unknown(UNKNOWN_CONFIDENCE),
        };

        if intent != Intent::CreateTask {
            return ParsedCommand {
                intent,
                task: None,
                repo_url: None,
                confidence,
            };
        }

        ParsedCommand {
            intent,
            task: self.extract_task(text),
            repo_url: self.extract_repo_url(text),
            confidence,
        }
    }

    fn extract_task(&self, text: &str) -> Option<String> {
        let mut task = text.trim().to_string();
        for prefix in &self.task_prefixes {
            task = prefix.replace(&task, "").trim_start().to_string();
        }

        let task = self.repo_mention.replace_all(&task, "");
        let task = task.trim().trim_end_matches(['.', '!', '?', ',']).trim();

        (!task.is_empty()).then(|| task.to_string())
    }

    fn extract_repo_url(&self, text: &str) -> Option<String> {
        self.repo_pattern.find(text).map(|m| {
            m.as_str()
                .trim_end_matches('.')
                .trim_end_matches(".git")
                .to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(text: &str) -> ParsedCommand {
        CommandParser::new().parse(text)
    }

    #[test]
    fn test_cancel_the_task() {
        let cmd = parse("cancel the task");
        assert_eq!(cmd.intent, Intent::CancelTask);
        assert!((cmd.confidence - 0.8).abs() < f64::EPSILON);
        assert!(cmd.task.is_none());
    }

    #[test]
    fn test_create_task_extracts_description() {
        let cmd = parse("add dark mode to the settings page");
        assert_eq!(cmd.intent, Intent::CreateTask);
        assert!(cmd.task.as_deref().unwrap().contains("dark mode"));
        assert!(cmd.repo_url.is_none());
    }

    #[test]
    fn test_create_task_extracts_repo_url() {
        let cmd = parse("add tests to https://github.com/user/my-repo");
        assert_eq!(cmd.intent, Intent::CreateTask);
        assert_eq!(cmd.repo_url.as_deref(), Some("https://github.com/user/my-repo"));
        assert_eq!(cmd.task.as_deref(), Some("add tests"));
    }

    #[test]
    fn test_gibberish_is_unknown() {
        let cmd = parse("asdfghjkl");
        assert_eq!(cmd.intent, Intent::Unknown);
        assert!(cmd.confidence < 0.5);
    }

    #[test]
    fn test_politeness_prefixes_are_stripped() {
        let cmd = parse("Please could you create a task to Fix the Login bug.");
        assert_eq!(cmd.intent, Intent::CreateTask);
        assert_eq!(cmd.task.as_deref(), Some("Fix the Login bug"));
    }

    #[test]
    fn test_repo_url_keeps_original_case_and_drops_git_suffix() {
        let cmd = parse("Fix CI in https://github.com/Acme/Web-App.git");
        assert_eq!(cmd.repo_url.as_deref(), Some("https://github.com/Acme/Web-App"));
    }

    #[test]
    fn test_list_and_status_intents() {
        assert_eq!(parse("show me all tasks").intent, Intent::ListTasks);
        assert_eq!(parse("what are my tasks").intent, Intent::ListTasks);
        assert_eq!(parse("what's the status").intent, Intent::CheckStatus);
        assert_eq!(parse("how is it going").intent, Intent::CheckStatus);
        assert_eq!(parse("stop everything").intent, Intent::CancelTask);
    }

    #[test]
    fn test_create_group_precedes_later_groups() {
        // Matches both the create and the status group.
        let cmd = parse("create a status page");
        assert_eq!(cmd.intent, Intent::CreateTask);
    }

    #[test]
    fn test_verb_fallback_has_lower_confidence() {
        let cmd = parse("we should refactor the billing module");
        assert_eq!(cmd.intent, Intent::CreateTask);
        assert!((cmd.confidence - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_short_text_skips_verb_fallback() {
        let cmd = parse("go fix");
        assert_eq!(cmd.intent, Intent::Unknown);
    }

    #[test]
    fn test_verb_must_be_whole_word() {
        let cmd = parse("the address book is great");
        assert_eq!(cmd.intent, Intent::Unknown);
    }

    #[test]
    fn test_empty_input() {
        let cmd = parse("   ");
        assert_eq!(cmd.intent, Intent::Unknown);
    }

    proptest! {
        #[test]
        fn parse_is_total_and_bounded(text in ".{0,200}") {
            let cmd = parse(&text);
            prop_assert!((0.0..=1.0).contains(&cmd.confidence));
            if cmd.intent != Intent::CreateTask {
                prop_assert!(cmd.task.is_none());
            }
        }

        #[test]
        fn parse_is_deterministic(text in "[a-z ]{0,60}") {
            prop_assert_eq!(parse(&text), parse(&text));
        }
    }
}
