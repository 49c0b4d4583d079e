use std::collections::HashMap;

use crate::{
    clip::{parse_bvh, LoadedClip},
    loader::{ClipLoader, ClipSource, LoadCompletion, LoadTicket},
    Result,
};

/// In-memory registry of clips keyed by identifier.
///
/// As a [`ClipLoader`] it answers requests on the following `poll`, which
/// keeps loading asynchronous from the caller's point of view while staying
/// fully deterministic.
#[derive(Debug, Default)]
pub struct ClipLibrary {
    clips: HashMap<String, LoadedClip>,
    queued: Vec<(LoadTicket, ClipSource)>,
}

impl ClipLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, clip: LoadedClip) {
        self.clips.insert(id.into(), clip);
    }

    /// Parses BVH text and registers the result under `id`.
    pub fn register_bvh(&mut self, id: &str, source: &str) -> Result<()> {
        let clip = parse_bvh(id, source)?;
        self.register(id, clip);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&LoadedClip> {
        self.clips.get(id)
    }

    /// Requests waiting for the next poll.
    pub fn queued(&self) -> usize {
        self.queued.len()
    }
}

impl ClipLoader for ClipLibrary {
    fn request(&mut self, ticket: LoadTicket, source: ClipSource) {
        self.queued.push((ticket, source));
    }

    fn poll(&mut self) -> Vec<LoadCompletion> {
        std::mem::take(&mut self.queued)
            .into_iter()
            .map(|(ticket, source)| {
                let outcome = self
                    .clips
                    .get(&source.id)
                    .cloned()
                    .ok_or_else(|| format!("unknown clip `{}`", source.id));
                LoadCompletion {
                    ticket,
                    source,
                    outcome,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clip::fixtures::ARM_BVH, config::EngineConfig, loader::Epoch};

    fn ticket(request: u64) -> LoadTicket {
        LoadTicket {
            epoch: Epoch::default(),
            request,
        }
    }

    #[test]
    fn answers_on_the_next_poll() {
        let mut library = ClipLibrary::new();
        library.register_bvh("arm", ARM_BVH).unwrap();
        let engine = EngineConfig::default();

        library.request(ticket(1), ClipSource::resolve("arm", &engine));
        assert_eq!(library.queued(), 1);

        let done = library.poll();
        assert_eq!(done.len(), 1);
        assert!(done[0].outcome.is_ok());
        assert!(library.poll().is_empty());
    }

    #[test]
    fn unknown_clips_fail_with_their_identifier() {
        let mut library = ClipLibrary::new();
        library.request(ticket(2), ClipSource::resolve("ghost", &EngineConfig::default()));

        let done = library.poll();
        let reason = done[0].outcome.as_ref().unwrap_err();
        assert!(reason.contains("ghost"));
    }

    #[test]
    fn registered_clips_share_their_data() {
        let mut library = ClipLibrary::new();
        library.register_bvh("arm", ARM_BVH).unwrap();
        library.request(ticket(1), ClipSource::resolve("arm", &EngineConfig::default()));
        library.request(ticket(2), ClipSource::resolve("arm", &EngineConfig::default()));

        let done = library.poll();
        let first = done[0].outcome.as_ref().unwrap();
        let second = done[1].outcome.as_ref().unwrap();
        assert!(std::sync::Arc::ptr_eq(&first.clip, &second.clip));
        assert!(library.get("arm").is_some());
    }
}
