use anyhow::Result;
use tracing::info;

use crate::cli::PatternsArgs;
use crate::patterns::{BUILTIN_DICTIONARY_TOML, PatternDictionary};
use crate::util::write_atomic;

pub fn run(args: PatternsArgs) -> Result<()> {
    if let Some(path) = args.write_default.as_deref() {
        write_atomic(path, BUILTIN_DICTIONARY_TOML.as_bytes())?;
        info!(path = %path.display(), "wrote built-in pattern dictionary");
    }

    let dictionary = PatternDictionary::load(args.patterns_path.as_deref())?;
    info!(
        source = %dictionary.source_name,
        version = %dictionary.version,
        rules = dictionary.rules.len(),
        window_chars = dictionary.context.window_chars,
        max_quote_chars = dictionary.context.max_quote_chars,
        "pattern dictionary is valid"
    );

    for counts in dictionary.rule_counts() {
        info!(
            category = %counts.category,
            rules = counts.rules,
            keywords = counts.keywords,
            regexes = counts.regexes,
            "rules by category"
        );
    }

    Ok(())
}
