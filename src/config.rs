// ABOUTME: Runtime configuration for the tcp mux core: window sizes, ring buffer capacity and the enable switch
// ABOUTME: Mirrors the keep-alive config builder pattern used elsewhere in this codebase

/// Configuration for the multiplexer core.
///
/// # Example
///
/// ```rust
/// use tcpmux::MuxConfig;
///
/// // Default configuration (256 KiB windows, 128 KiB ring buffers, enabled)
/// let config = MuxConfig::default();
///
/// // Small windows, useful in tests that want to exercise backpressure quickly
/// let config = MuxConfig::default()
///     .with_max_stream_window_size(4096)
///     .with_rbuf_size(4096);
///
/// // Transparent passthrough: mux framing is a no-op
/// let config = MuxConfig::disabled();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxConfig {
    /// When `false`, the core never frames traffic: bytes pass through
    /// unmodified and no SYN/window-update bookkeeping happens. The control
    /// plane negotiates whether the peer supports muxing before this is set.
    pub tcp_mux_enabled: bool,

    /// Initial and maximum per-stream window, in both directions.
    pub max_stream_window_size: u32,

    /// Capacity of each per-stream tx/rx ring buffer.
    pub rbuf_size: u32,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            tcp_mux_enabled: true,
            max_stream_window_size: 262_144,
            rbuf_size: 131_072,
        }
    }
}

impl MuxConfig {
    /// Set the per-stream window size.
    pub fn with_max_stream_window_size(mut self, size: u32) -> Self {
        self.max_stream_window_size = size;
        self
    }

    /// Set the ring buffer capacity.
    pub fn with_rbuf_size(mut self, size: u32) -> Self {
        self.rbuf_size = size;
        self
    }

    /// Build a configuration with muxing disabled (transparent passthrough).
    pub fn disabled() -> Self {
        Self {
            tcp_mux_enabled: false,
            ..Default::default()
        }
    }

    /// Half of the window, the threshold past which a deficit triggers an
    /// unsolicited WINDOW_UPDATE.
    pub fn window_update_threshold(&self) -> u32 {
        self.max_stream_window_size / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_defaults() {
        let config = MuxConfig::default();
        assert!(config.tcp_mux_enabled);
        assert_eq!(config.max_stream_window_size, 262_144);
        assert_eq!(config.rbuf_size, 131_072);
    }

    #[test]
    fn builder_overrides_fields() {
        let config = MuxConfig::default()
            .with_max_stream_window_size(4096)
            .with_rbuf_size(2048);
        assert_eq!(config.max_stream_window_size, 4096);
        assert_eq!(config.rbuf_size, 2048);
    }

    #[test]
    fn disabled_config_keeps_other_defaults() {
        let config = MuxConfig::disabled();
        assert!(!config.tcp_mux_enabled);
        assert_eq!(config.max_stream_window_size, 262_144);
    }
}
