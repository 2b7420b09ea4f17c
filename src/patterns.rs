//! Two ordered classes of compiled text patterns ("waiting" and "thinking").
//!
//! Patterns only answer match/no-match. Invalid patterns are skipped at compile
//! time so a bad profile entry degrades detection instead of aborting the run.

use regex::Regex;
use std::fmt;

use crate::config::PatternLists;
use crate::error::PatternError;
use crate::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternClass {
    Waiting,
    Thinking,
}

impl PatternClass {
    pub fn label(self) -> &'static str {
        match self {
            PatternClass::Waiting => "waiting",
            PatternClass::Thinking => "thinking",
        }
    }
}

impl fmt::Display for PatternClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable after startup; safe to share by reference.
#[derive(Debug, Default)]
pub struct PatternSet {
    waiting: Vec<Regex>,
    thinking: Vec<Regex>,
}

impl PatternSet {
    /// Compile both classes, keeping declared order and skipping invalid entries.
    ///
    /// The returned errors describe every skipped pattern; they have already been logged.
    pub fn compile(lists: &PatternLists) -> (Self, Vec<PatternError>) {
        let mut errors = Vec::new();
        let waiting = compile_class(PatternClass::Waiting, &lists.waiting, &mut errors);
        let thinking = compile_class(PatternClass::Thinking, &lists.thinking, &mut errors);
        (Self { waiting, thinking }, errors)
    }

    pub fn len(&self, class: PatternClass) -> usize {
        self.class(class).len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty() && self.thinking.is_empty()
    }

    pub fn match_waiting(&self, text: &str) -> bool {
        self.first_match(PatternClass::Waiting, text).is_some()
    }

    pub fn match_thinking(&self, text: &str) -> bool {
        self.first_match(PatternClass::Thinking, text).is_some()
    }

    /// First pattern of `class`, in declared order, that matches `text`.
    pub fn first_match(&self, class: PatternClass, text: &str) -> Option<&str> {
        self.class(class)
            .iter()
            .find(|regex| regex.is_match(text))
            .map(Regex::as_str)
    }

    /// First pattern of `class` matching any of `lines`. Patterns are the outer loop so
    /// declared order decides which pattern is reported.
    pub fn first_match_in_lines<'a, I>(&self, class: PatternClass, lines: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a str>,
        I::IntoIter: Clone,
    {
        let lines = lines.into_iter();
        self.class(class)
            .iter()
            .find(|regex| lines.clone().any(|line| regex.is_match(line)))
            .map(Regex::as_str)
    }

    fn class(&self, class: PatternClass) -> &[Regex] {
        match class {
            PatternClass::Waiting => &self.waiting,
            PatternClass::Thinking => &self.thinking,
        }
    }
}

fn compile_class(
    class: PatternClass,
    sources: &[String],
    errors: &mut Vec<PatternError>,
) -> Vec<Regex> {
    let mut compiled = Vec::with_capacity(sources.len());
    for source in sources {
        match Regex::new(source) {
            Ok(regex) => compiled.push(regex),
            Err(err) => {
                let err = PatternError {
                    class,
                    pattern: source.clone(),
                    source: err,
                };
                log_debug(&format!("skipping pattern: {err}"));
                tracing::warn!(class = class.label(), pattern = %source, "skipping invalid pattern");
                errors.push(err);
            }
        }
    }
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lists(waiting: &[&str], thinking: &[&str]) -> PatternLists {
        PatternLists {
            waiting: waiting.iter().map(|p| p.to_string()).collect(),
            thinking: thinking.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn invalid_pattern_is_skipped_and_valid_one_still_matches() {
        let (set, errors) = PatternSet::compile(&lists(&["(unclosed", r"\(y/n\)"], &[]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].class, PatternClass::Waiting);
        assert_eq!(errors[0].pattern, "(unclosed");
        assert_eq!(set.len(PatternClass::Waiting), 1);
        assert!(set.match_waiting("Continue? (y/n)"));
        assert!(!set.match_waiting("Continue?"));
    }

    #[test]
    fn empty_classes_never_match() {
        let (set, errors) = PatternSet::compile(&PatternLists::default());
        assert!(errors.is_empty());
        assert!(set.is_empty());
        assert!(!set.match_waiting("anything (y/n)"));
        assert!(!set.match_thinking("Building"));
    }

    #[test]
    fn first_match_reports_declared_order() {
        let (set, _) = PatternSet::compile(&lists(&[], &["Build", "Building", "ing"]));
        assert_eq!(
            set.first_match(PatternClass::Thinking, "Building..."),
            Some("Build")
        );
        assert_eq!(set.first_match(PatternClass::Thinking, "running"), Some("ing"));
        assert_eq!(set.first_match(PatternClass::Thinking, "done"), None);
    }

    #[test]
    fn line_matching_anchors_per_line() {
        let (set, _) = PatternSet::compile(&lists(&[r"^>\s*$"], &[]));
        let lines = ["compiling", "> ", "tail"];
        assert_eq!(
            set.first_match_in_lines(PatternClass::Waiting, lines.iter().copied()),
            Some(r"^>\s*$")
        );
        let lines = ["a > b"];
        assert!(set
            .first_match_in_lines(PatternClass::Waiting, lines.iter().copied())
            .is_none());
    }

    #[test]
    fn classes_are_independent() {
        let (set, _) = PatternSet::compile(&lists(&["wait"], &["Running"]));
        assert!(set.match_waiting("please wait"));
        assert!(!set.match_thinking("please wait"));
        assert!(set.match_thinking("Running tests"));
        assert!(!set.match_waiting("Running tests"));
    }

    #[test]
    fn pattern_error_names_class_and_pattern() {
        let (_, errors) = PatternSet::compile(&lists(&[], &["[a-"]));
        let message = errors[0].to_string();
        assert!(message.contains("thinking"));
        assert!(message.contains("[a-"));
    }
}
