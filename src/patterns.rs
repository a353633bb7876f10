//! Pattern Dictionary: the typed, validated rule set the tagger runs.
//!
//! Rules are authored in TOML (see `patterns/default_patterns.toml`, which is
//! compiled into the binary) and validated once. Every failure surfaces as a
//! [`PatternConfigError`] before any document is processed.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::PatternConfigError;
use crate::model::{Category, CommitmentStrength, ImpactArea, Subcategory};

pub const BUILTIN_DICTIONARY_TOML: &str = include_str!("../patterns/default_patterns.toml");
pub const BUILTIN_SOURCE_NAME: &str = "builtin";

const STEM_MARKER: char = '*';

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryConfig {
    pub version: String,
    #[serde(default)]
    pub context: ContextConfig,
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
    #[serde(default = "default_max_quote_chars")]
    pub max_quote_chars: usize,
}

fn default_window_chars() -> usize {
    200
}

fn default_max_quote_chars() -> usize {
    300
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_chars: default_window_chars(),
            max_quote_chars: default_max_quote_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub id: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<CommitmentStrength>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<ImpactArea>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regex: Vec<String>,
    #[serde(default)]
    pub requires_number: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Keyword,
    Regex,
}

/// Rules and compiled patterns of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleCounts {
    pub category: Category,
    pub rules: usize,
    pub keywords: usize,
    pub regexes: usize,
}

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub kind: PatternKind,
    regex: Regex,
}

/// A match span in byte offsets of the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct Matcher {
    patterns: Vec<CompiledPattern>,
}

impl Matcher {
    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    /// Pattern declaration order first, then text order.
    pub fn find_all(&self, text: &str) -> Vec<PatternMatch> {
        let mut matches = Vec::new();
        for pattern in &self.patterns {
            for found in pattern.regex.find_iter(text) {
                if found.start() == found.end() {
                    continue;
                }
                matches.push(PatternMatch {
                    start: found.start(),
                    end: found.end(),
                });
            }
        }
        matches
    }
}

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub id: String,
    pub category: Category,
    pub subcategory: Option<Subcategory>,
    pub matcher: Matcher,
    pub requires_number: bool,
}

impl PatternRule {
    pub fn strength(&self) -> Option<CommitmentStrength> {
        match self.subcategory {
            Some(Subcategory::Strength(strength)) => Some(strength),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatternDictionary {
    pub version: String,
    pub source_name: String,
    pub context: ContextConfig,
    pub rules: Vec<PatternRule>,
}

impl PatternDictionary {
    pub fn builtin() -> Result<Self, PatternConfigError> {
        Self::from_toml_str(BUILTIN_DICTIONARY_TOML, BUILTIN_SOURCE_NAME)
    }

    /// Loads `path` when given, otherwise the built-in dictionary.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::builtin().context("built-in pattern dictionary is invalid");
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read pattern dictionary {}", path.display()))?;
        let dictionary = Self::from_toml_str(&raw, &path.display().to_string())?;
        Ok(dictionary)
    }

    pub fn from_toml_str(raw: &str, source_name: &str) -> Result<Self, PatternConfigError> {
        let config: DictionaryConfig =
            toml::from_str(raw).map_err(|error| PatternConfigError::Parse {
                source_name: source_name.to_string(),
                message: error.to_string(),
            })?;
        Self::from_config(config, source_name)
    }

    pub fn from_config(
        config: DictionaryConfig,
        source_name: &str,
    ) -> Result<Self, PatternConfigError> {
        if config.context.window_chars == 0 || config.context.max_quote_chars == 0 {
            return Err(PatternConfigError::InvalidContext {
                window_chars: config.context.window_chars,
                max_quote_chars: config.context.max_quote_chars,
            });
        }

        let mut seen_ids = HashSet::new();
        let mut rules = Vec::with_capacity(config.rules.len());
        for rule in config.rules {
            let id = rule.id.trim().to_string();
            if id.is_empty() {
                return Err(PatternConfigError::EmptyRuleId);
            }
            if !seen_ids.insert(id.clone()) {
                return Err(PatternConfigError::DuplicateRuleId(id));
            }

            let subcategory = resolve_subcategory(&id, &rule)?;
            let matcher = compile_matcher(&id, &rule.keywords, &rule.regex)?;

            rules.push(PatternRule {
                id,
                category: rule.category,
                subcategory,
                matcher,
                requires_number: rule.requires_number,
            });
        }

        Ok(Self {
            version: config.version,
            source_name: source_name.to_string(),
            context: config.context,
            rules,
        })
    }

    pub fn rules_in(&self, category: Category) -> impl Iterator<Item = &PatternRule> {
        self.rules
            .iter()
            .filter(move |rule| rule.category == category)
    }

    pub fn rule_counts(&self) -> Vec<RuleCounts> {
        Category::ALL
            .into_iter()
            .map(|category| {
                let mut counts = RuleCounts {
                    category,
                    rules: 0,
                    keywords: 0,
                    regexes: 0,
                };
                for rule in self.rules_in(category) {
                    counts.rules += 1;
                    for pattern in rule.matcher.patterns() {
                        match pattern.kind {
                            PatternKind::Keyword => counts.keywords += 1,
                            PatternKind::Regex => counts.regexes += 1,
                        }
                    }
                }
                counts
            })
            .collect()
    }
}

fn resolve_subcategory(
    rule_id: &str,
    rule: &RuleConfig,
) -> Result<Option<Subcategory>, PatternConfigError> {
    let category = rule.category.as_str().to_string();
    let unexpected = |field: &'static str| PatternConfigError::UnexpectedSubcategory {
        rule_id: rule_id.to_string(),
        category: category.clone(),
        field,
    };
    let missing = |field: &'static str| PatternConfigError::MissingSubcategory {
        rule_id: rule_id.to_string(),
        category: category.clone(),
        field,
    };

    match rule.category {
        Category::Language => {
            if rule.area.is_some() {
                return Err(unexpected("area"));
            }
            rule.strength
                .map(|strength| Some(Subcategory::Strength(strength)))
                .ok_or_else(|| missing("strength"))
        }
        Category::ImpactArea => {
            if rule.strength.is_some() {
                return Err(unexpected("strength"));
            }
            rule.area
                .map(|area| Some(Subcategory::Area(area)))
                .ok_or_else(|| missing("area"))
        }
        Category::Target | Category::Initiative => {
            if rule.strength.is_some() {
                return Err(unexpected("strength"));
            }
            if rule.area.is_some() {
                return Err(unexpected("area"));
            }
            Ok(None)
        }
    }
}

fn compile_matcher(
    rule_id: &str,
    keywords: &[String],
    regexes: &[String],
) -> Result<Matcher, PatternConfigError> {
    if keywords.is_empty() && regexes.is_empty() {
        return Err(PatternConfigError::EmptyMatcher {
            rule_id: rule_id.to_string(),
        });
    }

    let mut patterns = Vec::with_capacity(keywords.len() + regexes.len());
    for keyword in keywords {
        let expression = keyword_expression(keyword).ok_or_else(|| {
            PatternConfigError::EmptyKeyword {
                rule_id: rule_id.to_string(),
            }
        })?;
        patterns.push(CompiledPattern {
            kind: PatternKind::Keyword,
            regex: build_regex(rule_id, keyword, &expression)?,
        });
    }

    for pattern in regexes {
        patterns.push(CompiledPattern {
            kind: PatternKind::Regex,
            regex: build_regex(rule_id, pattern, pattern)?,
        });
    }

    Ok(Matcher { patterns })
}

fn build_regex(rule_id: &str, source: &str, expression: &str) -> Result<Regex, PatternConfigError> {
    RegexBuilder::new(expression)
        .case_insensitive(true)
        .build()
        .map_err(|error| PatternConfigError::InvalidRegex {
            rule_id: rule_id.to_string(),
            pattern: source.to_string(),
            source: error,
        })
}

/// Escaped keyword with word boundaries; a trailing `*` extends the match to
/// the end of the word.
fn keyword_expression(keyword: &str) -> Option<String> {
    let trimmed = keyword.trim();
    let (body, is_stem) = match trimmed.strip_suffix(STEM_MARKER) {
        Some(stem) => (stem.trim_end(), true),
        None => (trimmed, false),
    };
    if body.is_empty() {
        return None;
    }

    // Internal runs of whitespace match any whitespace, so line-wrapped
    // phrases still hit.
    let escaped = body
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<String>>()
        .join(r"\s+");

    let leading = if body.chars().next().is_some_and(is_word_char) {
        r"\b"
    } else {
        ""
    };
    let trailing = if is_stem {
        r"\w*"
    } else if body.chars().last().is_some_and(is_word_char) {
        r"\b"
    } else {
        ""
    };

    Some(format!("{leading}{escaped}{trailing}"))
}

fn is_word_char(character: char) -> bool {
    character.is_alphanumeric() || character == '_'
}
