//! Minimal plugin kernel: named services plus named plugin functions.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::providers::LlmProvider;

/// Value returned by a kernel function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionValue {
    /// Plain text (persona system messages).
    Text(String),
    /// Document contents (retrieval).
    Documents(Vec<String>),
}

/// Named string arguments passed to a kernel function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelArguments(BTreeMap<String, String>);

impl KernelArguments {
    /// Add an argument.
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.0.insert(key.to_owned(), value.to_string());
        self
    }

    /// Look up an argument.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Errors raised by the kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// No function registered under the given plugin/function pair.
    #[error("function {plugin}.{function} not registered")]
    FunctionNotFound {
        /// Plugin name.
        plugin: String,
        /// Function name.
        function: String,
    },
    /// No service registered under the given id.
    #[error("service {0} not registered")]
    ServiceNotFound(String),
    /// A required argument was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// A function the kernel can invoke by name.
#[async_trait]
pub trait KernelFunction: Send + Sync {
    /// Function name within its plugin.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Run the function.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError`] on invalid arguments.
    async fn invoke(&self, args: &KernelArguments) -> Result<FunctionValue, KernelError>;
}

/// Registry of chat services and plugin functions.
#[derive(Default)]
pub struct Kernel {
    services: BTreeMap<String, Arc<dyn LlmProvider>>,
    plugins: BTreeMap<String, BTreeMap<String, Arc<dyn KernelFunction>>>,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("plugins", &self.plugin_names())
            .finish()
    }
}

impl Kernel {
    /// Empty kernel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chat completion service under `id`.
    pub fn add_service(&mut self, id: &str, service: Arc<dyn LlmProvider>) {
        self.services.insert(id.to_owned(), service);
    }

    /// Look up a chat completion service.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ServiceNotFound`] when nothing is registered.
    pub fn service(&self, id: &str) -> Result<Arc<dyn LlmProvider>, KernelError> {
        self.services
            .get(id)
            .cloned()
            .ok_or_else(|| KernelError::ServiceNotFound(id.to_owned()))
    }

    /// Whether a service is registered under `id`.
    pub fn has_service(&self, id: &str) -> bool {
        self.services.contains_key(id)
    }

    /// Register a function under `plugin`.
    pub fn add_function(&mut self, plugin: &str, function: Arc<dyn KernelFunction>) {
        self.plugins
            .entry(plugin.to_owned())
            .or_default()
            .insert(function.name().to_owned(), function);
    }

    /// Names of loaded plugins, sorted.
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    /// Invoke `plugin.function` with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::FunctionNotFound`] for unknown names, or the
    /// function's own error.
    pub async fn invoke(
        &self,
        plugin: &str,
        function: &str,
        args: &KernelArguments,
    ) -> Result<FunctionValue, KernelError> {
        let f = self
            .plugins
            .get(plugin)
            .and_then(|functions| functions.get(function))
            .ok_or_else(|| KernelError::FunctionNotFound {
                plugin: plugin.to_owned(),
                function: function.to_owned(),
            })?;
        tracing::debug!(plugin, function, "invoking kernel function");
        f.invoke(args).await
    }
}
