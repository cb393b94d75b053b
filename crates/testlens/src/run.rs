// Copyright (c) 2026 - present testlens contributors
// SPDX-License-Identifier: MIT

//! Top-level run loop
//!
//! Wires the input stream, the core pipeline, the optional output formatter
//! and the renderer together and decides the process exit code.

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use testlens_core::pipeline::{self, Pipeline};

use crate::config::{Config, OutputFormat};
use crate::formatter::{ExternalFormatter, OutputFormatter, Passthrough, format_package};
use crate::render::{self, RenderSettings, Renderer};

/// Run testlens with the given configuration
///
/// Returns the exit code the process should end with.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the input cannot be
/// read, the test output cannot be parsed, the formatter fails, or stdout
/// cannot be written.
pub async fn run(config: &Config) -> anyhow::Result<i32> {
    config.validate()?;

    let input: Box<dyn AsyncRead + Unpin + Send> = match config.input_path() {
        Some(path) => {
            debug!(path = %path.display(), "reading test output from file");
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input file {}", path.display()))?;
            Box::new(file)
        }
        None => {
            debug!("reading test output from stdin");
            Box::new(tokio::io::stdin())
        }
    };
    let formatter: Box<dyn OutputFormatter> = match &config.formatter {
        Some(command) => Box::new(ExternalFormatter::new(
            command.as_str(),
            config.formatter_timeout(),
        )),
        None => Box::new(Passthrough),
    };

    let mut stdout = tokio::io::stdout();
    let pipeline = pipeline::spawn(input);
    let code = match config.format {
        OutputFormat::Text => {
            render_text(pipeline, formatter.as_ref(), config.render_settings(), &mut stdout).await?
        }
        OutputFormat::Json => write_json(pipeline, formatter.as_ref(), &mut stdout).await?,
    };

    if config.nofail && code != 0 {
        info!(code, "failures found, exiting with 0 because of --nofail");
        return Ok(0);
    }
    Ok(code)
}

/// Stream rendered text to `out` as the pipeline produces it
///
/// # Errors
///
/// Returns the first parse, formatter or write error. Text written before
/// the error stays written.
pub async fn render_text<W>(
    mut pipeline: Pipeline,
    formatter: &dyn OutputFormatter,
    settings: RenderSettings,
    out: &mut W,
) -> anyhow::Result<i32>
where
    W: AsyncWrite + Unpin,
{
    let mut renderer = Renderer::new(settings);
    let mut packages = 0usize;

    while let Some(line) = pipeline.prefixes.recv().await {
        write(out, &renderer.prefix(&line)).await?;
    }
    if let Some(downloads) = pipeline.downloads.recv().await {
        write(out, &renderer.downloads(&downloads)).await?;
    }
    while let Some(mut package) = pipeline.packages.recv().await {
        format_package(formatter, &mut package)
            .await
            .with_context(|| format!("Failed to format output of package {}", package.name))?;
        write(out, &renderer.package(&package)).await?;
        packages += 1;
    }

    pipeline
        .handle
        .join()
        .await
        .context("Failed to process test output")?;
    out.flush().await.context("Failed to flush output")?;

    info!(packages, exit_code = renderer.exit_code(), "run complete");
    Ok(renderer.exit_code())
}

/// Write the complete result to `out` as one JSON document
///
/// # Errors
///
/// Returns the first parse, formatter, serialization or write error.
pub async fn write_json<W>(
    pipeline: Pipeline,
    formatter: &dyn OutputFormatter,
    out: &mut W,
) -> anyhow::Result<i32>
where
    W: AsyncWrite + Unpin,
{
    let mut result = pipeline
        .collect()
        .await
        .context("Failed to process test output")?;
    for package in &mut result.packages {
        format_package(formatter, package)
            .await
            .with_context(|| format!("Failed to format output of package {}", package.name))?;
    }

    let mut json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
    json.push('\n');
    write(out, &json).await?;
    out.flush().await.context("Failed to flush output")?;

    let code = render::exit_code(&result);
    info!(packages = result.packages.len(), exit_code = code, "run complete");
    Ok(code)
}

async fn write<W>(out: &mut W, text: &str) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if text.is_empty() {
        return Ok(());
    }
    out.write_all(text.as_bytes())
        .await
        .context("Failed to write output")
}
