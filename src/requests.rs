// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Servicing the viewer's fetch requests.
//!
//! Each [`Request`] becomes one or more tokio tasks whose results come back
//! over an mpsc channel as [`Completion`]s, in whatever order the network
//! delivers them.

use std::sync::Arc;

use log::{debug, info, warn};
use skyview_core::catalog::{chunk_file_name, Generation};
use skyview_core::{CatalogKind, FetchFailure, Renderer, Request, Viewer};
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::fetch::DataClient;

pub const CHANNEL_CAPACITY: usize = 64;

/// A finished fetch.
#[derive(Debug)]
pub enum Completion {
    Chunk {
        generation: Generation,
        index: usize,
        body: Result<String, FetchFailure>,
    },
    Catalog {
        kind: CatalogKind,
        body: Result<String, FetchFailure>,
    },
    MilkyWay(Result<String, FetchFailure>),
    Lookup {
        name: String,
        body: Result<String, FetchFailure>,
    },
}

/// Spawns fetch tasks and counts the ones still running.
#[derive(Debug)]
pub struct Fetcher {
    client: DataClient,
    config: Arc<AppConfig>,
    tx: mpsc::Sender<Completion>,
    outstanding: usize,
}

impl Fetcher {
    #[must_use]
    pub fn new(client: DataClient, config: Arc<AppConfig>) -> (Self, mpsc::Receiver<Completion>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                client,
                config,
                tx,
                outstanding: 0,
            },
            rx,
        )
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Start every request the viewer queued.
    pub fn submit<R: Renderer>(&mut self, viewer: &mut Viewer<R>) {
        for request in viewer.take_requests() {
            self.spawn(request);
        }
    }

    fn spawn(&mut self, request: Request) {
        match request {
            Request::FetchChunks { generation, count } => {
                info!("Fetching {count} catalog chunks for {generation}");
                for index in 1..=count {
                    let name = chunk_file_name(&self.config.chunk_pattern, index);
                    self.spawn_fetch(name, true, move |body| Completion::Chunk {
                        generation,
                        index,
                        body,
                    });
                }
            }
            Request::FetchCatalog(kind) => match self.config.catalog_file(kind) {
                Some(name) => {
                    let name = name.to_owned();
                    self.spawn_fetch(name, true, move |body| Completion::Catalog { kind, body });
                }
                None => warn!("No file configured for the {kind} catalog"),
            },
            Request::FetchMilkyWay => {
                let name = self.config.milky_way_file.clone();
                self.spawn_fetch(name, true, Completion::MilkyWay);
            }
            Request::Lookup(name) => {
                let client = self.client.clone();
                let tx = self.tx.clone();
                self.outstanding += 1;
                tokio::spawn(async move {
                    let body = client.lookup(&name).await.map_err(|e| e.into_failure());
                    if tx.send(Completion::Lookup { name, body }).await.is_err() {
                        debug!("Completion channel closed");
                    }
                });
            }
        }
    }

    fn spawn_fetch<F>(&mut self, name: String, cacheable: bool, wrap: F)
    where
        F: FnOnce(Result<String, FetchFailure>) -> Completion + Send + 'static,
    {
        let client = self.client.clone();
        let tx = self.tx.clone();
        self.outstanding += 1;
        tokio::spawn(async move {
            let body = client
                .fetch_text(&name, cacheable)
                .await
                .map_err(|e| {
                    warn!("Unable to fetch {name}: {e}");
                    e.into_failure()
                });
            if tx.send(wrap(body)).await.is_err() {
                debug!("Completion channel closed");
            }
        });
    }

    /// Hand a completion to the viewer.
    pub fn deliver<R: Renderer>(&mut self, viewer: &mut Viewer<R>, completion: Completion) {
        self.outstanding = self.outstanding.saturating_sub(1);
        match completion {
            Completion::Chunk {
                generation,
                index,
                body,
            } => viewer.chunk_completed(generation, index, body),
            Completion::Catalog { kind, body } => viewer.catalog_completed(kind, body),
            Completion::MilkyWay(body) => viewer.milky_way_completed(body),
            Completion::Lookup { name, body } => viewer.lookup_completed(&name, body),
        }
    }

    /// Run queued requests until none are left in flight.
    pub async fn settle<R: Renderer>(
        &mut self,
        viewer: &mut Viewer<R>,
        rx: &mut mpsc::Receiver<Completion>,
    ) {
        self.submit(viewer);
        while self.outstanding > 0 {
            let Some(completion) = rx.recv().await else {
                warn!("Completion channel closed with {} fetches outstanding", self.outstanding);
                return;
            };
            self.deliver(viewer, completion);
            self.submit(viewer);
        }
    }
}

/// Load the stack table, its processing status, and the event-file
/// versions. Only the stack table is required.
pub async fn load_stack_data<R: Renderer>(
    viewer: &mut Viewer<R>,
    client: &DataClient,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let stacks = client.fetch_text(&config.stack_file, true).await?;
    viewer.load_stacks(&stacks)?;
    info!("Loaded {} stacks", viewer.stacks().len());

    match client.fetch_text(&config.status_file, false).await {
        Ok(text) => match viewer.apply_status(&text) {
            Ok(summary) => info!(
                "Status: {} stacks updated, {} finished",
                summary.updated, summary.finished
            ),
            Err(e) => warn!("Unable to read the processing status: {e}"),
        },
        Err(e) => warn!("Unable to download the processing status: {e}"),
    }

    match client.fetch_text(&config.versions_file, true).await {
        Ok(text) => {
            if let Err(e) = viewer.load_versions(&text) {
                warn!("Unable to read the event file versions: {e}");
            }
        }
        Err(e) => debug!("No event file versions: {e}"),
    }

    Ok(())
}
