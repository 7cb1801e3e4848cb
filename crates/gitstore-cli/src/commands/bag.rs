//! Bag command handlers

use anyhow::{Context, Result};

use gitstore_core::{Bag, Store, StoreError};

use crate::output::Output;

/// Create a bag, or update the description of an existing one
pub fn create(
    store: &Store,
    name: String,
    description: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut bag = match store.get_bag(&name) {
        Ok(bag) => bag,
        Err(StoreError::NoBag { .. }) => Bag::new(name),
        Err(e) => return Err(e).context("Failed to read bag"),
    };
    if let Some(description) = description {
        bag.set_description(description);
    }

    store.put_bag(&bag).context("Failed to save bag")?;

    output.success(&format!("Saved bag: {}", bag.name));
    Ok(())
}

/// Show a bag and how many tiddlers it holds
pub fn show(store: &Store, name: &str, output: &Output) -> Result<()> {
    let bag = store.get_bag(name)?;
    let count = store.list_tiddlers(name)?.len();
    output.print_bag(&bag, count);
    Ok(())
}

/// List all bags
pub fn list(store: &Store, output: &Output) -> Result<()> {
    let bags = store.list_bags()?;
    output.print_bags(&bags);
    Ok(())
}
