//! Asynchronous clip loading.
//!
//! The stage hands a [`LoadTicket`] to the loader with every request and gets
//! it back with the completion. Tickets carry the [`Epoch`] that was current
//! when the request was made; a completion whose epoch no longer matches is
//! dropped without a trace, so loads started before a `clear` never bring
//! their rigs back.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::{
    clip::{parse_bvh, LoadedClip},
    config::EngineConfig,
};

/// Generation counter bumped by every scene clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket {
    pub epoch: Epoch,
    pub request: u64,
}

/// A clip identifier together with the location it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSource {
    pub id: String,
    pub url: String,
}

impl ClipSource {
    /// Identifiers that already look like URLs are used verbatim; anything
    /// else is looked up under the asset root.
    pub fn resolve(id: &str, engine: &EngineConfig) -> Self {
        let url = if id.starts_with("http") {
            id.to_string()
        } else {
            format!("{}{}.{}", engine.asset_root, id, engine.asset_extension)
        };
        Self {
            id: id.to_string(),
            url,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.url.starts_with("http")
    }
}

#[derive(Debug)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub source: ClipSource,
    /// The loaded clip, or a human-readable failure reason.
    pub outcome: std::result::Result<LoadedClip, String>,
}

/// Resolves clip sources off the frame loop.
///
/// `request` must not block; results are collected later through `poll`,
/// which the stage calls once per frame.
pub trait ClipLoader {
    fn request(&mut self, ticket: LoadTicket, source: ClipSource);

    fn poll(&mut self) -> Vec<LoadCompletion>;
}

/// Reads and parses BVH files on background threads.
#[derive(Debug)]
pub struct BvhFileLoader {
    sender: Sender<LoadCompletion>,
    receiver: Receiver<LoadCompletion>,
}

impl Default for BvhFileLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl BvhFileLoader {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }
}

impl ClipLoader for BvhFileLoader {
    fn request(&mut self, ticket: LoadTicket, source: ClipSource) {
        let sender = self.sender.clone();
        std::thread::spawn(move || {
            let outcome = load_file(&source);
            // The loader may be gone by the time we finish; nobody is waiting then.
            let _ = sender.send(LoadCompletion {
                ticket,
                source,
                outcome,
            });
        });
    }

    fn poll(&mut self) -> Vec<LoadCompletion> {
        self.receiver.try_iter().collect()
    }
}

fn load_file(source: &ClipSource) -> std::result::Result<LoadedClip, String> {
    if source.is_remote() {
        return Err("remote sources are not supported by the file loader".to_string());
    }
    let text = std::fs::read_to_string(&source.url).map_err(|err| err.to_string())?;
    parse_bvh(&source.id, &text).map_err(|err| err.to_string())
}
