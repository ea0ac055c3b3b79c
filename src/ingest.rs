//! `qa ingest`: extract, chunk, embed and persist one document.

use std::path::Path;

use anyhow::Result;

use crate::assistant::Assistant;
use crate::config::Config;

pub async fn run_ingest(config: &Config, path: &Path, content_type: Option<&str>) -> Result<()> {
    let assistant = Assistant::from_config(config.clone()).await?;
    let mut session = assistant.session();
    let report = assistant
        .ingest_file(&mut session, path, content_type)
        .await?;

    println!("Indexed {}", path.display());
    println!("  document: {}", report.document_id);
    println!("  chars:    {}", report.chars);
    println!("  chunks:   {}", report.chunks);
    if report.skipped_pages > 0 {
        println!(
            "  pages:    {} ({} without text skipped)",
            report.pages, report.skipped_pages
        );
    } else {
        println!("  pages:    {}", report.pages);
    }
    println!("  stored under namespace '{}'", config.index.namespace);
    Ok(())
}
