use std::collections::HashMap;

use rayon::prelude::*;

use crate::commands::extract::DocumentCorpus;
use crate::model::{
    Category, CommitmentStrength, Document, Finding, Page, Qualifier, Subcategory,
};
use crate::patterns::{PatternDictionary, PatternMatch};
use crate::util::normalize_whitespace;

use super::context::{ContextWindow, SentenceIndex, currency_amounts, percentages_and_years};

/// Scans corpus pages against a validated dictionary.
///
/// Output is a pure function of the dictionary and the page text: page
/// order, then rule declaration order, then pattern order, then text order.
pub struct CategoricalExtractor<'a> {
    dictionary: &'a PatternDictionary,
    window: ContextWindow,
}

impl<'a> CategoricalExtractor<'a> {
    pub fn new(dictionary: &'a PatternDictionary) -> Self {
        Self {
            dictionary,
            window: ContextWindow {
                window_chars: dictionary.context.window_chars,
                max_quote_chars: dictionary.context.max_quote_chars,
            },
        }
    }

    /// Pages are scanned in parallel; findings keep page order.
    pub fn extract_document(&self, corpus: &DocumentCorpus) -> Vec<Finding> {
        corpus
            .pages
            .par_iter()
            .map(|page| self.extract_page(&corpus.document, page))
            .collect::<Vec<Vec<Finding>>>()
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn extract_page(&self, document: &Document, page: &Page) -> Vec<Finding> {
        let text = page.raw_text.as_str();
        if text.trim().is_empty() {
            return Vec::new();
        }

        let sentences = SentenceIndex::new(text);
        let rule_matches = self
            .dictionary
            .rules
            .iter()
            .map(|rule| rule.matcher.find_all(text))
            .collect::<Vec<Vec<PatternMatch>>>();
        let weakest = self.weakest_strength_per_sentence(&sentences, &rule_matches);

        let mut ordinals = HashMap::<(Category, String), u32>::new();
        let mut findings = Vec::new();

        for (rule, matches) in self.dictionary.rules.iter().zip(&rule_matches) {
            for found in matches {
                let quote = self.window.quote(text, &sentences, found.start, found.end);
                let numeric_values = numeric_values(rule.category, &quote);
                if rule.requires_number && !has_number(rule.category, &quote, &numeric_values) {
                    continue;
                }

                let (subcategory, qualifier) = match rule.category {
                    Category::Language => {
                        let Some(own) = rule.strength() else {
                            continue;
                        };
                        let classified = weakest[sentences.sentences_for(found.start, found.end)]
                            .iter()
                            .flatten()
                            .copied()
                            .max()
                            .unwrap_or(own)
                            .max(own);
                        (
                            Some(Subcategory::Strength(classified)),
                            downgrade_qualifier(own, classified),
                        )
                    }
                    Category::Target => {
                        let qualifier = if numeric_values.is_empty() {
                            Qualifier::Qualitative
                        } else {
                            Qualifier::Quantified
                        };
                        (rule.subcategory, Some(qualifier))
                    }
                    Category::Initiative => (
                        rule.subcategory,
                        (!numeric_values.is_empty()).then_some(Qualifier::InvestmentDisclosed),
                    ),
                    Category::ImpactArea => (rule.subcategory, None),
                };

                let matched_text = normalize_whitespace(&text[found.start..found.end]);
                let ordinal = ordinals
                    .entry((rule.category, matched_text.to_lowercase()))
                    .or_insert(0);
                *ordinal += 1;

                findings.push(Finding {
                    document_id: document.document_id.clone(),
                    document_type: document.document_type,
                    year: document.year,
                    page_number: page.page_number,
                    category: rule.category,
                    subcategory,
                    rule_id: rule.id.clone(),
                    matched_text,
                    ordinal: *ordinal,
                    context_quote: quote,
                    numeric_values,
                    qualifier,
                });
            }
        }

        findings
    }

    /// Weakest commitment tier matched in each sentence of the page.
    fn weakest_strength_per_sentence(
        &self,
        sentences: &SentenceIndex,
        rule_matches: &[Vec<PatternMatch>],
    ) -> Vec<Option<CommitmentStrength>> {
        let mut weakest = vec![None; sentences.len()];
        for (rule, matches) in self.dictionary.rules.iter().zip(rule_matches) {
            let Some(strength) = rule.strength() else {
                continue;
            };
            for found in matches {
                for index in sentences.sentences_for(found.start, found.end) {
                    weakest[index] = weakest[index].max(Some(strength));
                }
            }
        }
        weakest
    }
}

fn numeric_values(category: Category, quote: &str) -> Vec<String> {
    match category {
        Category::Target => percentages_and_years(quote),
        Category::Initiative => currency_amounts(quote),
        Category::Language | Category::ImpactArea => Vec::new(),
    }
}

fn has_number(category: Category, quote: &str, numeric_values: &[String]) -> bool {
    match category {
        Category::Target | Category::Initiative => !numeric_values.is_empty(),
        Category::Language | Category::ImpactArea => {
            !percentages_and_years(quote).is_empty() || !currency_amounts(quote).is_empty()
        }
    }
}

fn downgrade_qualifier(own: CommitmentStrength, classified: CommitmentStrength) -> Option<Qualifier> {
    if classified <= own {
        return None;
    }
    match own {
        CommitmentStrength::Strong => Some(Qualifier::DowngradedFromStrong),
        CommitmentStrength::Moderate => Some(Qualifier::DowngradedFromModerate),
        CommitmentStrength::Weak => None,
    }
}
