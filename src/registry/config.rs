//! Registry configuration

/// Connection registry configuration options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Per-connection outbound queue capacity (frames)
    ///
    /// A push to a connection whose queue is full fails immediately.
    pub outbound_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
        }
    }
}

impl RegistryConfig {
    /// Set the per-connection outbound queue capacity (minimum 1)
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }
}
