//! Name and tag predicates applied over the playlist.
//!
//! A filter combines a regular expression over song names with a disjunction
//! of tag rules. Each rule is a conjunction of signed tag literals: a rule
//! matches a song when every required tag is present and every negated tag
//! is absent.

use regex::Regex;

/// One signed tag requirement inside a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLiteral {
    pub tag: String,
    /// `true` requires the tag to be present, `false` requires it absent.
    pub required: bool,
}

/// A conjunction of tag literals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagRule {
    pub literals: Vec<TagLiteral>,
}

impl TagRule {
    /// A rule with no literals matches nothing.
    pub fn matches(&self, tags: &[String]) -> bool {
        !self.literals.is_empty()
            && self
                .literals
                .iter()
                .all(|literal| literal.required == tags.iter().any(|tag| *tag == literal.tag))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Filter {
    pattern: String,
    regex: Option<Regex>,
    rules: Vec<TagRule>,
    strict: bool,
}

impl Filter {
    /// Compiles a filter. An empty pattern disables the name side; an empty
    /// rule list disables the tag side. An invalid pattern is a user-input
    /// error and produces no filter.
    pub fn new(pattern: &str, rules: Vec<TagRule>, strict: bool) -> Result<Filter, String> {
        let regex = if pattern.is_empty() {
            None
        } else {
            Some(Regex::new(pattern).map_err(|err| format!("invalid filter pattern: {}", err))?)
        };
        Ok(Filter {
            pattern: pattern.to_string(),
            regex,
            rules,
            strict,
        })
    }

    /// The filter every song passes.
    pub fn match_all() -> Filter {
        Filter::default()
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn rules(&self) -> &[TagRule] {
        &self.rules
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    fn pattern_enabled(&self) -> bool {
        self.regex.is_some()
    }

    fn tags_enabled(&self) -> bool {
        !self.rules.is_empty()
    }

    pub fn is_match_all(&self) -> bool {
        !self.pattern_enabled() && !self.tags_enabled()
    }

    /// Pure predicate over one song's name and tags.
    pub fn check(&self, name: &str, tags: &[String]) -> bool {
        let pattern_result = match &self.regex {
            Some(regex) => regex.is_match(name),
            None => true,
        };
        let tags_result = if self.tags_enabled() {
            self.rules.iter().any(|rule| rule.matches(tags))
        } else {
            true
        };

        match (self.pattern_enabled(), self.tags_enabled()) {
            (false, false) => true,
            (false, true) => tags_result,
            (true, false) => pattern_result,
            (true, true) => {
                if self.strict {
                    pattern_result && tags_result
                } else {
                    pattern_result || tags_result
                }
            }
        }
    }
}
