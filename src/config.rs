use std::sync::Arc;

/// Per-registry configuration.
///
/// Each [`Registry`](crate::Registry) is an independent namespace. Use the builder
/// methods to customize, or [`Default`] for an unlimited registry named `"default"`.
///
/// # Examples
///
/// ```rust
/// use fanout::RegistryConfig;
///
/// let config = RegistryConfig::default()
///     .with_namespace("billing")
///     .with_max_subscribers_per_key(8)
///     .with_debug(true);
/// assert_eq!(config.namespace(), "billing");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistryConfig {
    /// Name used in debug traces to tell registries apart.
    /// Default: "default"
    namespace: Arc<str>,

    /// Maximum number of subscribers a single key may hold.
    /// Default: unlimited
    max_subscribers_per_key: Option<usize>,

    /// Forces debug tracing on or off. When unset, tracing is enabled whenever a
    /// `tracing` subscriber is interested in DEBUG events from this crate.
    /// Default: unset
    debug: Option<bool>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            namespace: Arc::from("default"),
            max_subscribers_per_key: None,
            debug: None,
        }
    }
}

impl RegistryConfig {
    pub fn with_namespace<N: Into<Arc<str>>>(mut self, namespace: N) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Cap the number of subscribers per key.
    ///
    /// [`Registry::subscribe`](crate::Registry::subscribe) fails with
    /// [`Error::LimitExceeded`](crate::Error::LimitExceeded) once any of the
    /// requested keys is full.
    pub fn with_max_subscribers_per_key(mut self, limit: usize) -> Self {
        self.max_subscribers_per_key = Some(limit);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn namespace_arc(&self) -> Arc<str> {
        self.namespace.clone()
    }

    pub fn max_subscribers_per_key(&self) -> Option<usize> {
        self.max_subscribers_per_key
    }

    /// The explicit debug override, if any.
    pub fn debug(&self) -> Option<bool> {
        self.debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.namespace(), "default");
        assert_eq!(config.max_subscribers_per_key(), None);
        assert_eq!(config.debug(), None);
    }

    #[test]
    fn test_builder() {
        let config = RegistryConfig::default()
            .with_namespace(String::from("orders"))
            .with_max_subscribers_per_key(3)
            .with_debug(false);
        assert_eq!(config.namespace(), "orders");
        assert_eq!(config.max_subscribers_per_key(), Some(3));
        assert_eq!(config.debug(), Some(false));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip() {
        let config = RegistryConfig::default().with_max_subscribers_per_key(4);
        let json = serde_json::to_string(&config).unwrap();
        let back: RegistryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
