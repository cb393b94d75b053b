// Copyright (c) 2026 - present testlens contributors
// SPDX-License-Identifier: MIT

//! Concurrent pipeline
//!
//! Runs the tokenizer and the aggregator as two tokio tasks joined by a
//! depth-1 channel. The aggregator publishes on three depth-1 channels
//! (prefix lines, the downloads summary, packages) and drops each sender as
//! soon as its phase is over, so a consumer reads them strictly in that
//! order:
//!
//! ```no_run
//! # async fn example() -> Result<(), testlens_core::LensError> {
//! let mut pipeline = testlens_core::pipeline::spawn(tokio::io::stdin());
//! while let Some(line) = pipeline.prefixes.recv().await {
//!     println!("{line}");
//! }
//! let downloads = pipeline.downloads.recv().await;
//! while let Some(package) = pipeline.packages.recv().await {
//!     println!("{} {}", package.result, package.name);
//! }
//! pipeline.handle.join().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Tokenizer failures travel down the event channel so the aggregator stops
//! without flushing; the error surfaces from [`PipelineHandle::join`].

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::LensError;
use crate::event::Event;
use crate::parser::{Emission, EventParser};
use crate::result::{Downloads, Package, ParseResult};
use crate::tokenizer::{Tokenizer, take_line};

/// Receivers for the three output sequences plus the task handle
#[derive(Debug)]
pub struct Pipeline {
    /// Raw lines seen before any recognized activity
    pub prefixes: mpsc::Receiver<String>,
    /// Exactly one downloads summary
    pub downloads: mpsc::Receiver<Downloads>,
    /// Finalized packages in emission order
    pub packages: mpsc::Receiver<Package>,
    /// Handle to wait for both tasks
    pub handle: PipelineHandle,
}

/// Handle to the tokenizer and aggregator tasks
#[derive(Debug)]
pub struct PipelineHandle {
    tokenizer: JoinHandle<()>,
    aggregator: JoinHandle<Result<(), LensError>>,
}

impl PipelineHandle {
    /// Wait for both tasks to finish
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the run: a read or tokenization error,
    /// an aggregation error, [`LensError::StreamClosed`] if a consumer went
    /// away, or [`LensError::Join`] if a task panicked.
    pub async fn join(self) -> Result<(), LensError> {
        let aggregated = self.aggregator.await?;
        self.tokenizer.await?;
        aggregated
    }
}

impl Pipeline {
    /// Drain all three sequences in order into a [`ParseResult`]
    ///
    /// # Errors
    ///
    /// Returns whatever [`PipelineHandle::join`] reports.
    pub async fn collect(mut self) -> Result<ParseResult, LensError> {
        let mut result = ParseResult::default();
        while let Some(line) = self.prefixes.recv().await {
            result.prefix.push(line);
        }
        if let Some(downloads) = self.downloads.recv().await {
            result.downloads = downloads;
        }
        while let Some(package) = self.packages.recv().await {
            result.packages.push(package);
        }
        self.handle.join().await?;
        Ok(result)
    }
}

/// Start the pipeline over an async byte stream
///
/// Must be called from within a tokio runtime. Closing or exhausting the
/// reader ends the run.
pub fn spawn<R>(reader: R) -> Pipeline
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (event_tx, event_rx) = mpsc::channel(1);
    let (prefix_tx, prefixes) = mpsc::channel(1);
    let (downloads_tx, downloads) = mpsc::channel(1);
    let (packages_tx, packages) = mpsc::channel(1);

    let tokenizer = tokio::spawn(tokenize(reader, event_tx));
    let sinks = Sinks {
        prefix: Some(prefix_tx),
        downloads: Some(downloads_tx),
        packages: packages_tx,
    };
    let aggregator = tokio::spawn(aggregate(event_rx, sinks));

    Pipeline {
        prefixes,
        downloads,
        packages,
        handle: PipelineHandle {
            tokenizer,
            aggregator,
        },
    }
}

async fn tokenize<R>(reader: R, events: mpsc::Sender<Result<Event, LensError>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut tokenizer = Tokenizer::new();
    let mut buf = Vec::new();
    let mut line_number = 0;

    loop {
        buf.clear();
        let outcome = match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let Some(line) = take_line(&buf) else {
                    break;
                };
                line_number += 1;
                tokenizer.classify(&line, line_number)
            }
            Err(e) => Err(e.into()),
        };

        let failed = outcome.is_err();
        let delivered = match outcome {
            Ok(Some(event)) => events.send(Ok(event)).await.is_ok(),
            Ok(None) => true,
            Err(e) => events.send(Err(e)).await.is_ok(),
        };
        if failed || !delivered {
            debug!(line_number, failed, "tokenizer stopping early");
            return;
        }
    }
    debug!(lines = line_number, "input exhausted");
}

/// Output side of the aggregator task
struct Sinks {
    prefix: Option<mpsc::Sender<String>>,
    downloads: Option<mpsc::Sender<Downloads>>,
    packages: mpsc::Sender<Package>,
}

impl Sinks {
    async fn send(&mut self, emission: Emission) -> Result<(), LensError> {
        match emission {
            Emission::Prefix(line) => {
                if let Some(tx) = &self.prefix {
                    tx.send(line)
                        .await
                        .map_err(|_| LensError::StreamClosed { stream: "prefix" })?;
                }
            }
            Emission::Downloads(downloads) => {
                self.prefix = None;
                if let Some(tx) = self.downloads.take() {
                    tx.send(downloads)
                        .await
                        .map_err(|_| LensError::StreamClosed { stream: "downloads" })?;
                }
            }
            Emission::Package(package) => {
                self.packages
                    .send(package)
                    .await
                    .map_err(|_| LensError::StreamClosed { stream: "packages" })?;
            }
        }
        Ok(())
    }
}

async fn aggregate(
    mut events: mpsc::Receiver<Result<Event, LensError>>,
    mut sinks: Sinks,
) -> Result<(), LensError> {
    let mut parser = EventParser::new();
    while let Some(event) = events.recv().await {
        for emission in parser.process(event?)? {
            sinks.send(emission).await?;
        }
        if !parser.is_prefix_open() {
            sinks.prefix = None;
        }
    }
    for emission in parser.finish() {
        sinks.send(emission).await?;
    }
    Ok(())
}
