//! Import run orchestration used by the CLI.
//!
//! A run fetches the document (and stylesheet, concurrently), then either
//! renders the transform into a page file, prints the bare transform result,
//! or prints the document itself.

mod statistics;

use std::time::Instant;

use anyhow::{Context, Result};
use log::info;

use crate::config::Config;
use crate::import::XmlImporter;
use crate::render::XslRenderer;
use crate::transport::{Capabilities, TransportKind};
use crate::xml::XmlDocument;

pub use statistics::log_fetch_statistics;

/// Result of a completed import run.
#[derive(Debug, Clone)]
pub struct ImportReport {
    /// Serialized output markup (page, transform result, or document)
    pub output: String,
    /// Transport the run used
    pub transport: TransportKind,
    /// Wall-clock duration of the run
    pub elapsed_seconds: f64,
}

/// Runs one import as described by `config`.
///
/// # Errors
///
/// Returns an error chain describing the first step that failed: invalid
/// configuration, no usable transport, a failed fetch, an unreadable page
/// file, or a failed render.
pub async fn run_import(config: Config) -> Result<ImportReport> {
    config.validate().context("Invalid configuration")?;
    let start = Instant::now();

    let importer = XmlImporter::detect(&Capabilities::detect(), config.fetch_config())
        .context("Failed to initialize HTTP transport")?;
    let transport = importer.fetcher().transport_kind();
    info!("Using {transport} transport");

    let (xml, xsl) = match &config.xsl {
        Some(xsl_url) => {
            let (xml, xsl) = futures::future::try_join(
                load(&importer, &config.url, config.allow_cache),
                load(&importer, xsl_url, config.allow_cache),
            )
            .await?;
            (xml, Some(xsl))
        }
        None => (load(&importer, &config.url, config.allow_cache).await?, None),
    };

    let output = match (xsl, &config.page, &config.target) {
        (Some(xsl), Some(page_path), Some(target)) => {
            let markup = tokio::fs::read_to_string(page_path)
                .await
                .with_context(|| format!("Failed to read page file {}", page_path.display()))?;
            let mut page = XmlDocument::parse(&markup).with_context(|| {
                format!("Page file {} is not well-formed XML", page_path.display())
            })?;
            XslRenderer::new()
                .render(&mut page, &xml, &xsl, target)
                .with_context(|| format!("Failed to render into #{target}"))?;
            page.to_xml_string()
        }
        (Some(xsl), _, _) => XslRenderer::new()
            .transform(&xml, &xsl)
            .context("Failed to apply stylesheet")?
            .to_xml_string(),
        (None, _, _) => xml.to_xml_string(),
    };

    let elapsed_seconds = start.elapsed().as_secs_f64();
    log_fetch_statistics(importer.fetcher().stats(), elapsed_seconds);

    Ok(ImportReport {
        output,
        transport,
        elapsed_seconds,
    })
}

async fn load(importer: &XmlImporter, url: &str, allow_cache: bool) -> Result<XmlDocument> {
    importer
        .load(url, allow_cache)
        .await
        .with_context(|| format!("Failed to import {url}"))
}
