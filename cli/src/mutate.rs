use std::fs;

use anyhow::{Context, Result};
use wordbreak_core::RuleSet;

use crate::Mutate;

pub fn mutate(args: Mutate) -> Result<()> {
    let text = fs::read_to_string(&args.rules)
        .with_context(|| format!("Unable to read the rule file at {}", args.rules.display()))?;
    let rule_set = RuleSet::parse(&text);

    for word in &args.words {
        for candidate in rule_set.expand(word) {
            println!("{candidate}");
        }
    }

    Ok(())
}
