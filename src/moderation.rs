//! Denylist screening for user-generated text, shared by message and post
//! ingestion. Matching is case-insensitive substring search after punctuation
//! is scrubbed to spaces; a literal `*` in the input stands in for any single
//! character of a denylist entry, so censored spellings ("f**k") are still
//! caught, provided at least one character of the entry appears literally.

use serde::Serialize;

use crate::error::{AppError, AppResult};

const DEFAULT_DENYLIST: &[&str] = &[
    "fuck",
    "shit",
    "damn",
    "bitch",
    "asshole",
    "bastard",
    "crap",
    "piss",
    "slut",
    "whore",
    "faggot",
    "nigger",
    "retard",
    "gay",
    "stupid",
    "idiot",
    "moron",
    "dumb",
    "kill yourself",
    "kys",
];

const BLOCKED_REASON: &str = "Content contains inappropriate language";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub clean: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModerationFilter {
    denylist: Vec<Vec<char>>,
}

impl ModerationFilter {
    pub fn new() -> Self {
        Self::with_denylist(DEFAULT_DENYLIST.iter().copied())
    }

    pub fn with_denylist<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let denylist = words
            .into_iter()
            .map(|word| word.as_ref().to_lowercase().chars().collect::<Vec<char>>())
            .filter(|word| !word.is_empty())
            .collect();
        Self { denylist }
    }

    pub fn check(&self, text: &str) -> Verdict {
        if self.matches(text) {
            Verdict {
                clean: false,
                reason: Some(BLOCKED_REASON.to_string()),
            }
        } else {
            Verdict {
                clean: true,
                reason: None,
            }
        }
    }

    /// Shorthand for ingestion paths: `ContentBlocked` on a hit.
    pub fn ensure_clean(&self, text: &str) -> AppResult<()> {
        let verdict = self.check(text);
        if verdict.clean {
            Ok(())
        } else {
            Err(AppError::ContentBlocked {
                reason: verdict.reason.unwrap_or_else(|| BLOCKED_REASON.to_string()),
            })
        }
    }

    fn matches(&self, text: &str) -> bool {
        let scrubbed = scrub(text);
        self.denylist
            .iter()
            .any(|word| contains_word(&scrubbed, word))
    }
}

impl Default for ModerationFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercases and replaces punctuation with spaces. Whitespace survives so
/// multi-word entries can match; `*` survives as the censorship wildcard.
fn scrub(text: &str) -> Vec<char> {
    text.chars()
        .flat_map(|c| c.to_lowercase())
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '*' {
                c
            } else {
                ' '
            }
        })
        .collect()
}

/// Substring search where `*` in the haystack matches any one character.
/// A window must match at least one character literally, so fully-censored
/// runs of asterisks are not treated as profanity.
fn contains_word(haystack: &[char], word: &[char]) -> bool {
    if word.is_empty() || haystack.len() < word.len() {
        return false;
    }
    haystack.windows(word.len()).any(|window| {
        let mut literal = false;
        for (have, want) in window.iter().zip(word.iter()) {
            if have == want {
                literal = true;
            } else if *have != '*' {
                return false;
            }
        }
        literal
    })
}
