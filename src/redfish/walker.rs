//! Resource Graph Walker
//!
//! Breadth-first traversal of a BMC's resource graph starting at the service
//! root. Links are followed by name according to the kind of the document they
//! appear in (see [`follow_links`]); everything else, including `Links` back
//! references that make the graph cyclic, is ignored.
//!
//! # Bounds
//!
//! - Every normalized path is fetched at most once (visited set)
//! - Nothing deeper than `max_depth` hops from the root is enqueued
//! - Each level is fetched concurrently, at most `parallelism` requests at a time
//!
//! # Failures
//!
//! The service root and the Systems/Chassis collections are essential: losing
//! one of them ends the walk with [`WalkError::Essential`]. Any other failed
//! fetch is recorded in [`WalkOutput::skipped`] and the walk goes on.
//!
//! A rejected session suspends the walk. The affected paths are re-queued, so
//! calling [`Walker::walk`] again with a fresh session resumes where it stopped.

use crate::error::{FetchError, WalkError};
use crate::redfish::client::RedfishClient;
use crate::redfish::session::Session;
use crate::redfish::types::{ResourceDocument, ResourceKind, SERVICE_ROOT};
use futures_util::{stream, StreamExt};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

/// Default traversal depth; deep enough to reach drives
/// (root → Systems → system → Storage → storage → drive).
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Default number of concurrent fetches per walk
pub const DEFAULT_PARALLELISM: usize = 4;

/// Link properties followed per resource kind, with whether a failure to
/// fetch the linked resource is fatal.
pub fn follow_links(kind: ResourceKind) -> &'static [(&'static str, bool)] {
    match kind {
        ResourceKind::ServiceRoot => &[("Systems", true), ("Chassis", true), ("Managers", false)],
        ResourceKind::Collection => &[("Members", false)],
        ResourceKind::ComputerSystem => &[("Processors", false), ("Memory", false), ("Storage", false)],
        ResourceKind::Chassis => &[("Power", false), ("Thermal", false), ("Sensors", false)],
        ResourceKind::Storage => &[("Drives", false)],
        _ => &[],
    }
}

/// A resource that could not be fetched
#[derive(Debug, Clone)]
pub struct SkippedResource {
    pub path: String,
    pub reason: String,
}

/// Everything a completed walk gathered
#[derive(Debug, Default)]
pub struct WalkOutput {
    pub documents: Vec<ResourceDocument>,
    pub skipped: Vec<SkippedResource>,
}

#[derive(Debug)]
struct Pending {
    path: String,
    depth: usize,
    essential: bool,
}

/// Resumable walk state
#[derive(Debug)]
pub struct Walker {
    max_depth: usize,
    parallelism: usize,
    queue: VecDeque<Pending>,
    visited: HashSet<String>,
    output: WalkOutput,
}

impl Walker {
    pub fn new(max_depth: usize, parallelism: usize) -> Self {
        let mut walker = Self {
            max_depth,
            parallelism: parallelism.max(1),
            queue: VecDeque::new(),
            visited: HashSet::new(),
            output: WalkOutput::default(),
        };
        walker.enqueue(SERVICE_ROOT.to_string(), 0, true);
        walker
    }

    fn enqueue(&mut self, path: String, depth: usize, essential: bool) {
        if self.visited.insert(path.clone()) {
            self.queue.push_back(Pending {
                path,
                depth,
                essential,
            });
        }
    }

    fn accept(&mut self, pending: Pending, document: ResourceDocument) {
        let links = follow_links(document.kind());
        if pending.depth < self.max_depth {
            for (name, essential) in links {
                let essential = *essential && document.kind() == ResourceKind::ServiceRoot;
                for path in document.links(name) {
                    self.enqueue(path, pending.depth + 1, essential);
                }
            }
        } else if links.iter().any(|(name, _)| !document.links(name).is_empty()) {
            debug!(path = %pending.path, "Depth limit reached, not following links");
        }
        self.output.documents.push(document);
    }

    /// Drains the queue level by level. On `Err(WalkError::SessionExpired)`
    /// the walk can be resumed with a new session.
    pub async fn walk(&mut self, client: &RedfishClient, session: &Session) -> Result<(), WalkError> {
        while !self.queue.is_empty() {
            let level: Vec<Pending> = self.queue.drain(..).collect();

            let mut fetches = stream::iter(level)
                .map(|pending| async move {
                    let result = client.fetch(session, &pending.path).await;
                    (pending, result)
                })
                .buffer_unordered(self.parallelism);

            let mut expired = Vec::new();
            let mut fatal = None;

            while let Some((pending, result)) = fetches.next().await {
                match result {
                    Ok(document) => self.accept(pending, document),
                    Err(FetchError::SessionExpired) => expired.push(pending),
                    Err(source) if pending.essential => {
                        fatal.get_or_insert(WalkError::Essential {
                            path: pending.path,
                            source,
                        });
                    }
                    Err(err) => {
                        warn!(
                            bmc = %client.address(),
                            path = %pending.path,
                            error = %err,
                            "Skipping resource"
                        );
                        self.output.skipped.push(SkippedResource {
                            path: pending.path,
                            reason: err.to_string(),
                        });
                    }
                }
            }
            drop(fetches);

            if let Some(err) = fatal {
                return Err(err);
            }
            if !expired.is_empty() {
                for pending in expired.into_iter().rev() {
                    self.queue.push_front(pending);
                }
                return Err(WalkError::SessionExpired);
            }
        }

        Ok(())
    }

    /// Documents fetched so far.
    pub fn documents(&self) -> &[ResourceDocument] {
        &self.output.documents
    }

    pub fn finish(self) -> WalkOutput {
        self.output
    }
}

/// Walks the whole graph in one go with the default bounds.
pub async fn walk(client: &RedfishClient, session: &Session) -> Result<WalkOutput, WalkError> {
    let mut walker = Walker::new(DEFAULT_MAX_DEPTH, DEFAULT_PARALLELISM);
    walker.walk(client, session).await?;
    Ok(walker.finish())
}
