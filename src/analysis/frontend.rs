//! Static seed finder page with the master dataset embedded.
//!
//! The page keeps its data between `// SEED_DB:BEGIN` and `// SEED_DB:END`. Updating
//! replaces only that block, so manual edits to the rest of the page survive. A page
//! without the markers is regenerated from the bundled template.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;

use super::master::MasterDataset;
use crate::paths::write_atomic;
use crate::proposals::ProposalCatalog;

const TEMPLATE: &str = include_str!("../../resources/seed-finder.html");
const DATA_PLACEHOLDER: &str = "{{SEED_DATA}}";
const BLOCK_PATTERN: &str = r"(?s)// SEED_DB:BEGIN\n.*?\n[ \t]*// SEED_DB:END";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendUpdate {
    /// No page existed; written from the template
    Created,
    /// Data block replaced in place
    Updated,
    /// Page had no data markers; rewritten from the template
    Regenerated,
}

#[derive(Serialize)]
struct CompactSeed<'a> {
    s: &'a str,
    p: &'a [String],
}

#[derive(Serialize)]
struct SeedDb<'a> {
    count: usize,
    seeds: Vec<CompactSeed<'a>>,
}

/// Builds the JavaScript data block (`PROPOSALS` and `SEED_DB` constants).
pub fn render_data_block(master: &MasterDataset, catalog: &ProposalCatalog) -> Result<String> {
    let proposals =
        serde_json::to_string(&catalog.details()).context("Failed to serialize proposals")?;

    let seeds: Vec<CompactSeed> = master
        .entries()
        .map(|e| CompactSeed {
            s: e.seed.as_str(),
            p: &e.proposals,
        })
        .collect();
    let seed_db = serde_json::to_string(&SeedDb {
        count: seeds.len(),
        seeds,
    })
    .context("Failed to serialize seed data")?;

    Ok(format!(
        "        const PROPOSALS = {};\n        const SEED_DB = {};",
        script_safe(&proposals),
        script_safe(&seed_db)
    ))
}

/// Keeps `</script>` sequences in string data from closing the script element.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

/// Renders the full page from the bundled template.
pub fn render_page(data_block: &str) -> String {
    TEMPLATE.replace(DATA_PLACEHOLDER, data_block)
}

/// Writes the page from the template, discarding any existing page.
pub fn regenerate_frontend(
    path: &Path,
    master: &MasterDataset,
    catalog: &ProposalCatalog,
) -> Result<()> {
    let page = render_page(&render_data_block(master, catalog)?);
    write_atomic(path, page.as_bytes())
        .context(format!("Failed to write frontend: {}", path.display()))
}

/// Replaces the embedded data of an existing page, or creates the page.
pub fn update_frontend(
    path: &Path,
    master: &MasterDataset,
    catalog: &ProposalCatalog,
) -> Result<FrontendUpdate> {
    if !path.exists() {
        regenerate_frontend(path, master, catalog)?;
        return Ok(FrontendUpdate::Created);
    }

    let html = fs::read_to_string(path)
        .context(format!("Failed to read frontend: {}", path.display()))?;
    let block = render_data_block(master, catalog)?;

    match replace_data_block(&html, &block)? {
        Some(updated) => {
            write_atomic(path, updated.as_bytes())
                .context(format!("Failed to write frontend: {}", path.display()))?;
            Ok(FrontendUpdate::Updated)
        }
        None => {
            tracing::warn!(
                "No SEED_DB markers in {}, regenerating from template",
                path.display()
            );
            regenerate_frontend(path, master, catalog)?;
            Ok(FrontendUpdate::Regenerated)
        }
    }
}

/// Returns `html` with the marked data block replaced, or `None` without markers.
fn replace_data_block(html: &str, block: &str) -> Result<Option<String>> {
    let pattern = Regex::new(BLOCK_PATTERN).context("Invalid data block pattern")?;

    let Some(found) = pattern.find(html) else {
        return Ok(None);
    };

    let mut updated = String::with_capacity(html.len() + block.len());
    updated.push_str(&html[..found.start()]);
    updated.push_str("// SEED_DB:BEGIN\n");
    updated.push_str(block);
    updated.push_str("\n        // SEED_DB:END");
    updated.push_str(&html[found.end()..]);
    Ok(Some(updated))
}
