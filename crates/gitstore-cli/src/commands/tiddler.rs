//! Tiddler command handlers

use anyhow::{bail, Context, Result};

use gitstore_core::{Store, StoreError, Tiddler};

use crate::editor::{confirm, read_tiddler};
use crate::output::Output;

/// Everything `put` needs besides the store
pub struct PutArgs {
    pub bag: String,
    pub title: String,
    pub text: Option<String>,
    pub tags: Vec<String>,
    pub fields: Vec<String>,
    pub content_type: Option<String>,
}

/// Write a tiddler as the store's user
///
/// Without `--text` the current tiddler, or a blank one, is opened for
/// editing with the given tags, fields and type already applied.
pub fn put(store: &Store, args: PutArgs, output: &Output) -> Result<()> {
    let mut tiddler = match args.text {
        Some(ref text) => {
            let mut tiddler = Tiddler::new(args.title.as_str(), args.bag.as_str());
            tiddler.set_text(text.as_str());
            tiddler
        }
        None => match store.get(&args.bag, &args.title) {
            Ok(mut current) => {
                current.creator = None;
                current.created = None;
                current
            }
            Err(StoreError::NoTiddler { .. }) => {
                Tiddler::new(args.title.as_str(), args.bag.as_str())
            }
            Err(e) => return Err(e).context("Failed to read current tiddler"),
        },
    };

    if !args.tags.is_empty() {
        tiddler.set_tags(args.tags.clone());
    }
    if args.content_type.is_some() {
        tiddler.content_type = args.content_type.clone();
    }
    for field in &args.fields {
        let (name, value) = parse_field(field)?;
        tiddler.set_field(name, value);
    }

    if args.text.is_none() {
        tiddler = read_tiddler(&tiddler)?;
    }
    tiddler.set_modifier(store.usersign());

    store.put(&mut tiddler).context("Failed to put tiddler")?;

    output.success(&format!(
        "Put {}:{} at revision {}",
        tiddler.bag,
        tiddler.title,
        tiddler.revision.as_deref().unwrap_or("")
    ));
    output.print_tiddler(&tiddler);

    Ok(())
}

/// Show a tiddler, optionally as of an older revision
pub fn show(
    store: &Store,
    bag: &str,
    title: &str,
    revision: Option<&str>,
    output: &Output,
) -> Result<()> {
    let tiddler = match revision {
        Some(revision) => store.get_revision(bag, title, revision)?,
        None => store.get(bag, title)?,
    };

    output.print_tiddler(&tiddler);
    Ok(())
}

/// Show the revisions of a tiddler
pub fn history(store: &Store, bag: &str, title: &str, output: &Output) -> Result<()> {
    let revisions = store.list_revisions(bag, title)?;
    output.print_revisions(&revisions);
    Ok(())
}

/// List the tiddlers in a bag
pub fn list(store: &Store, bag: &str, output: &Output) -> Result<()> {
    let titles = store.list_tiddlers(bag)?;
    output.print_titles(bag, &titles);
    Ok(())
}

/// Delete a tiddler
pub fn delete(store: &Store, bag: &str, title: &str, output: &Output) -> Result<()> {
    // Fail early on a missing tiddler, before prompting
    store.get(bag, title)?;

    if output.should_prompt() {
        println!("Delete tiddler: {}:{}", bag, title);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store
        .delete(bag, title)
        .context("Failed to delete tiddler")?;

    output.success(&format!("Deleted tiddler: {}:{}", bag, title));

    Ok(())
}

/// Split a `key=value` field argument
fn parse_field(field: &str) -> Result<(&str, &str)> {
    match field.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => bail!("Invalid field '{}'. Use key=value.", field),
    }
}
