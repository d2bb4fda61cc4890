//! Line-by-line classification of packer output into [`LogEvent`]s.
//!
//! The rule tables encode the conventions of the text produced by
//! [`PackerService`](crate::services::PackerService): a success report whose first line
//! is the headline, and failure reports whose headline carries an `[错误]` marker followed
//! by `解决方案:`/`可能原因:` sections of `-` bullet points.

use crate::models::{LogEvent, Severity};
use regex::Regex;

/// A success-channel rule: any of `patterns` as a substring selects this rule.
#[derive(Debug, Clone)]
pub struct SuccessRule {
    pub patterns: &'static [&'static str],
    pub severity: Severity,
    pub highlight: bool,
}

/// Success-channel rules, first match wins.
pub const SUCCESS_RULES: &[SuccessRule] = &[
    SuccessRule {
        patterns: &["操作成功", "操作完成"],
        severity: Severity::Success,
        highlight: true,
    },
    SuccessRule {
        patterns: &["输出:", "大小:", "压缩率:"],
        severity: Severity::Success,
        highlight: false,
    },
    SuccessRule {
        patterns: &["UPX 输出:"],
        severity: Severity::Info,
        highlight: false,
    },
    SuccessRule {
        patterns: &["扫描", "检测"],
        severity: Severity::Warning,
        highlight: false,
    },
];

/// Predicates of the error channel, evaluated in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorPredicate {
    Headline,
    Section,
    Bullet,
}

/// Classifies result and error text into log events.
///
/// Stateless apart from the compiled patterns; share one instance behind an `Arc`.
#[derive(Debug)]
pub struct OutputClassifier {
    /// Lines announcing a cause or a fix ("解决方案:" / "可能原因:")
    section_pattern: Regex,

    /// Bullet points of a section (trimmed line starting with '-')
    bullet_pattern: Regex,

    error_rules: [(ErrorPredicate, Severity); 3],
}

impl OutputClassifier {
    pub fn new() -> Self {
        Self {
            section_pattern: Regex::new(r"解决方案:|可能原因:").expect("Invalid section regex"),
            bullet_pattern: Regex::new(r"^\s*-").expect("Invalid bullet regex"),
            error_rules: [
                (ErrorPredicate::Headline, Severity::Error),
                (ErrorPredicate::Section, Severity::Warning),
                (ErrorPredicate::Bullet, Severity::Hint),
            ],
        }
    }

    /// Split `text` into lines and classify each non-blank one.
    ///
    /// `is_error_channel` selects the failure rules; otherwise the success rules apply.
    pub fn classify(&self, text: &str, is_error_channel: bool) -> Vec<LogEvent> {
        text.split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                if is_error_channel {
                    self.classify_error_line(line, index == 0)
                } else {
                    Self::classify_success_line(line)
                }
            })
            .collect()
    }

    fn classify_success_line(line: &str) -> LogEvent {
        let matched = SUCCESS_RULES
            .iter()
            .find(|rule| rule.patterns.iter().any(|pattern| line.contains(pattern)));

        match matched {
            Some(rule) => {
                let event = LogEvent::new(line, rule.severity);
                if rule.highlight { event.highlighted() } else { event }
            }
            None => LogEvent::info(line),
        }
    }

    fn classify_error_line(&self, line: &str, is_first_line: bool) -> LogEvent {
        let matched = self
            .error_rules
            .iter()
            .find(|(predicate, _)| self.test(*predicate, line))
            .map(|(_, severity)| *severity);

        let severity = matched.unwrap_or(if is_first_line {
            Severity::Error
        } else {
            Severity::Hint
        });

        LogEvent::new(line, severity)
    }

    fn test(&self, predicate: ErrorPredicate, line: &str) -> bool {
        match predicate {
            ErrorPredicate::Headline => line.contains("[错误]"),
            ErrorPredicate::Section => self.section_pattern.is_match(line),
            ErrorPredicate::Bullet => self.bullet_pattern.is_match(line),
        }
    }
}

impl Default for OutputClassifier {
    fn default() -> Self {
        Self::new()
    }
}
