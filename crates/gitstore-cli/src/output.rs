//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use gitstore_core::{Bag, CommitInfo, Tiddler};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a single tiddler
    pub fn print_tiddler(&self, tiddler: &Tiddler) {
        match self.format {
            OutputFormat::Human => {
                println!("Title:    {}", tiddler.title);
                println!("Bag:      {}", tiddler.bag);
                if let Some(ref revision) = tiddler.revision {
                    println!("Revision: {}", revision);
                }
                if let Some(ref modifier) = tiddler.modifier {
                    println!("Modifier: {}", modifier);
                }
                println!("Modified: {}", tiddler.modified.format("%Y-%m-%d %H:%M:%S"));
                if let Some(ref creator) = tiddler.creator {
                    println!("Creator:  {}", creator);
                }
                if let Some(created) = tiddler.created {
                    println!("Created:  {}", created.format("%Y-%m-%d %H:%M:%S"));
                }
                if !tiddler.tags.is_empty() {
                    println!("Tags:     {}", tiddler.tags.join(", "));
                }
                if let Some(ref content_type) = tiddler.content_type {
                    println!("Type:     {}", content_type);
                }
                for (name, value) in &tiddler.fields {
                    println!("{}: {}", name, value);
                }
                if !tiddler.text.is_empty() {
                    println!();
                    println!("{}", tiddler.text);
                }
            }
            OutputFormat::Json => print_json(tiddler),
            OutputFormat::Quiet => {
                if let Some(ref revision) = tiddler.revision {
                    println!("{}", revision);
                }
            }
        }
    }

    /// Print tiddler titles in a bag
    pub fn print_titles(&self, bag: &str, titles: &[String]) {
        match self.format {
            OutputFormat::Human => {
                if titles.is_empty() {
                    println!("No tiddlers in bag '{}'.", bag);
                    return;
                }
                for title in titles {
                    println!("{}", title);
                }
                println!("\n{} tiddler(s)", titles.len());
            }
            OutputFormat::Json => print_json(&titles),
            OutputFormat::Quiet => {
                for title in titles {
                    println!("{}", title);
                }
            }
        }
    }

    /// Print the revision history of a tiddler, newest first
    pub fn print_revisions(&self, revisions: &[CommitInfo]) {
        match self.format {
            OutputFormat::Human => {
                for commit in revisions {
                    println!(
                        "{} | {} | {} | {}",
                        short_id(&commit.id),
                        commit.time.format("%Y-%m-%d %H:%M"),
                        truncate(&commit.author_name, 20),
                        commit.message
                    );
                }
                println!("\n{} revision(s)", revisions.len());
            }
            OutputFormat::Json => print_json(&revisions),
            OutputFormat::Quiet => {
                for commit in revisions {
                    println!("{}", commit.id);
                }
            }
        }
    }

    /// Print a single bag
    pub fn print_bag(&self, bag: &Bag, tiddler_count: usize) {
        match self.format {
            OutputFormat::Human => {
                println!("Name:        {}", bag.name);
                if !bag.description.is_empty() {
                    println!("Description: {}", bag.description);
                }
                println!("Tiddlers:    {}", tiddler_count);
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "name": bag.name,
                        "description": bag.description,
                        "tiddlers": tiddler_count
                    })
                );
            }
            OutputFormat::Quiet => {
                println!("{}", bag.name);
            }
        }
    }

    /// Print a list of bag names
    pub fn print_bags(&self, bags: &[String]) {
        match self.format {
            OutputFormat::Human => {
                if bags.is_empty() {
                    println!("No bags found.");
                    return;
                }
                for name in bags {
                    println!("{}", name);
                }
                println!("\n{} bag(s)", bags.len());
            }
            OutputFormat::Json => print_json(&bags),
            OutputFormat::Quiet => {
                for name in bags {
                    println!("{}", name);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode JSON: {}", e),
    }
}

/// First eight characters of a commit id
fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
