//! Free-text package filter.
//!
//! The filter is split on whitespace and every token becomes its own capture
//! group in one case-insensitive alternation. A record matches when every
//! group matched somewhere in it. Matches are leftmost-first and never
//! overlap, so a repeated token can only ever fill its first group and a
//! filter like `"foo foo"` matches nothing.

use regex::{Regex, RegexBuilder};

use super::StoreError;

#[derive(Debug, Clone)]
pub struct SearchFilter {
    regex: Option<Regex>,
    tokens: usize,
}

impl SearchFilter {
    pub fn new(filter: &str) -> Result<Self, StoreError> {
        let groups: Vec<String> = filter
            .split_whitespace()
            .map(|token| format!("({})", regex::escape(&token.to_lowercase())))
            .collect();

        if groups.is_empty() {
            return Ok(Self {
                regex: None,
                tokens: 0,
            });
        }

        let regex = RegexBuilder::new(&groups.join("|"))
            .case_insensitive(true)
            .build()
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(Self {
            regex: Some(regex),
            tokens: groups.len(),
        })
    }

    /// Number of whitespace-separated tokens in the filter.
    pub fn tokens(&self) -> usize {
        self.tokens
    }

    /// Whether every token matched somewhere in `text`. An empty filter
    /// matches everything.
    pub fn matches(&self, text: &str) -> bool {
        let Some(regex) = &self.regex else {
            return true;
        };

        let mut seen = vec![false; self.tokens];
        for caps in regex.captures_iter(text) {
            if let Some(group) = (1..=self.tokens).find(|&i| caps.get(i).is_some()) {
                seen[group - 1] = true;
            }
        }
        seen.iter().all(|&hit| hit)
    }
}
