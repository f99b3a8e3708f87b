//! Runtime configuration for the threaded executors.

/// Configuration for a [`DispatchQueue`](crate::DispatchQueue).
///
/// Worker threads are named `"<name>-<index>"`.
#[derive(Debug, Clone)]
pub struct DispatchQueueConfig {
    pub name: String,
    pub threads: usize,
    pub stack_size: Option<usize>,
}

impl Default for DispatchQueueConfig {
    fn default() -> Self {
        Self {
            name: "dispatch".into(),
            threads: 1,
            stack_size: None,
        }
    }
}

impl DispatchQueueConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> DispatchQueueConfigBuilder {
        DispatchQueueConfigBuilder::default()
    }
}

/// Builder for ergonomic dispatch queue configuration.
#[derive(Debug, Clone, Default)]
pub struct DispatchQueueConfigBuilder {
    config: DispatchQueueConfig,
}

impl DispatchQueueConfigBuilder {
    /// Sets the queue name used for worker thread names and logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Sets the number of worker threads.
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    /// Sets the stack size in bytes of each worker thread.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> DispatchQueueConfig {
        self.config
    }
}

/// Configuration for an [`ActiveObject`](crate::ActiveObject).
#[derive(Debug, Clone)]
pub struct ActiveObjectConfig {
    pub name: String,
    pub stack_size: Option<usize>,
}

impl Default for ActiveObjectConfig {
    fn default() -> Self {
        Self {
            name: "active".into(),
            stack_size: None,
        }
    }
}

impl ActiveObjectConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_size: None,
        }
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}
