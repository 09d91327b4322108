//! Fact sheet and assistant prompt commands

use anyhow::Result;
use tally_core::{config::Config, context::ContextAssembler, db::Database};

pub fn cmd_summary(db: &Database, config: &Config, owner: &str) -> Result<()> {
    let context = ContextAssembler::new(db, config.context.clone()).for_owner(owner)?;

    println!("{}", context.facts());
    if context.has_data() {
        println!();
        println!(
            "({} records across {} periods)",
            context.record_count, context.period_count
        );
    }

    Ok(())
}

/// Print the prompt an assistant would receive for `question`
pub fn cmd_ask(db: &Database, config: &Config, owner: &str, question: &str) -> Result<()> {
    let context = ContextAssembler::new(db, config.context.clone()).for_owner(owner)?;
    let prompt = context.prompt(question)?;
    println!("{}", prompt);
    Ok(())
}
