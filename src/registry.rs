// ABOUTME: Indexed collection mapping stream id to stream record, with the control stream always resident
// ABOUTME: Mirrors the HashMap-backed registry pattern used for decoder lookup elsewhere in this codebase

use std::collections::HashMap;

use crate::config::MuxConfig;
use crate::stream::{Stream, StreamId, StreamState};

/// The stream id reserved for the outer control-plane protocol. Always
/// present once registered and never removed by ordinary teardown.
pub const CONTROL_STREAM_ID: StreamId = 1;

/// O(1) lookup/insert/delete collection of live streams.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    streams: HashMap<StreamId, Stream>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self {
            streams: HashMap::new(),
        }
    }

    /// Register the control stream (id 1), used once at connection setup.
    pub fn register_control_stream(&mut self, config: &MuxConfig) {
        self.streams.insert(
            CONTROL_STREAM_ID,
            Stream::new(CONTROL_STREAM_ID, StreamState::Established, config),
        );
    }

    pub fn insert(&mut self, stream: Stream) {
        self.streams.insert(stream.id, stream);
    }

    pub fn get(&self, id: StreamId) -> Option<&Stream> {
        self.streams.get(&id)
    }

    pub fn get_mut(&mut self, id: StreamId) -> Option<&mut Stream> {
        self.streams.get_mut(&id)
    }

    pub fn contains(&self, id: StreamId) -> bool {
        id == CONTROL_STREAM_ID || self.streams.contains_key(&id)
    }

    /// Remove a stream from the registry. A no-op for the control stream,
    /// which is never torn down by ordinary stream lifecycle events.
    pub fn remove(&mut self, id: StreamId) -> Option<Stream> {
        if id == CONTROL_STREAM_ID {
            return None;
        }
        self.streams.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Tear down every non-control stream, used when emitting or receiving
    /// GO_AWAY after a protocol error (S5).
    pub fn reset_all(&mut self) {
        for stream in self.streams.values_mut() {
            if stream.id != CONTROL_STREAM_ID {
                stream.state = StreamState::Reset;
            }
        }
        self.streams.retain(|&id, _| id == CONTROL_STREAM_ID);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_stream_is_always_resident() {
        let mut registry = StreamRegistry::new();
        registry.register_control_stream(&MuxConfig::default());
        assert!(registry.contains(CONTROL_STREAM_ID));
        assert!(registry.remove(CONTROL_STREAM_ID).is_none());
        assert!(registry.contains(CONTROL_STREAM_ID));
    }

    #[test]
    fn insert_lookup_and_remove_round_trip() {
        let mut registry = StreamRegistry::new();
        let config = MuxConfig::default();
        registry.insert(Stream::new(3, StreamState::Init, &config));
        assert!(registry.contains(3));
        assert_eq!(registry.get(3).unwrap().id, 3);

        let removed = registry.remove(3).unwrap();
        assert_eq!(removed.id, 3);
        assert!(!registry.contains(3));
    }

    #[test]
    fn reset_all_clears_non_control_streams() {
        let mut registry = StreamRegistry::new();
        let config = MuxConfig::default();
        registry.register_control_stream(&config);
        registry.insert(Stream::new(3, StreamState::Established, &config));
        registry.insert(Stream::new(5, StreamState::Established, &config));

        registry.reset_all();

        assert!(registry.contains(CONTROL_STREAM_ID));
        assert!(!registry.contains(3));
        assert!(!registry.contains(5));
    }
}
