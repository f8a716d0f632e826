//! Capability registry resolving `(module, action)` pairs to handlers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{ActionError, RegistryError};

/// A callable operation on an external module.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Invoke the operation with positional arguments.
    async fn call(&self, args: Vec<Value>) -> Result<Value, ActionError>;
}

/// Adapter turning an async closure into an [`ActionHandler`].
struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ActionError>> + Send,
{
    async fn call(&self, args: Vec<Value>) -> Result<Value, ActionError> {
        (self.0)(args).await
    }
}

#[derive(Clone)]
struct Capability {
    handler: Arc<dyn ActionHandler>,
    arity: Option<usize>,
}

/// Explicit mapping from `(module, action)` to typed handlers.
///
/// Names are validated when registered, so an unknown pair at call time is
/// always reported as `ActionError::Unsupported`.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<(String, String), Capability>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.names())
            .finish()
    }
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'));
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(RegistryError::InvalidName(name.to_string()))
    }
}

impl CapabilityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `module.action`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidName` for malformed names and
    /// `RegistryError::Duplicate` if the pair is already registered.
    pub fn register<H>(
        &mut self,
        module: &str,
        action: &str,
        arity: Option<usize>,
        handler: H,
    ) -> Result<(), RegistryError>
    where
        H: ActionHandler + 'static,
    {
        self.insert(module, action, arity, Arc::new(handler))
    }

    /// Register an async closure for `module.action`.
    ///
    /// # Errors
    ///
    /// Same as [`CapabilityRegistry::register`].
    pub fn register_fn<F, Fut>(
        &mut self,
        module: &str,
        action: &str,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.insert(module, action, None, Arc::new(FnHandler(handler)))
    }

    /// Register an already shared handler.
    ///
    /// # Errors
    ///
    /// Same as [`CapabilityRegistry::register`].
    pub fn insert(
        &mut self,
        module: &str,
        action: &str,
        arity: Option<usize>,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<(), RegistryError> {
        validate_name(module)?;
        validate_name(action)?;

        let key = (module.to_string(), action.to_string());
        if self.capabilities.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                module: module.to_string(),
                action: action.to_string(),
            });
        }

        tracing::debug!(module, action, ?arity, "Registered capability");
        self.capabilities.insert(key, Capability { handler, arity });
        Ok(())
    }

    /// Whether `module.action` can be invoked.
    #[must_use]
    pub fn contains(&self, module: &str, action: &str) -> bool {
        self.capabilities
            .contains_key(&(module.to_string(), action.to_string()))
    }

    /// Number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Whether no capabilities are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Registered pairs as `module.action`, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .capabilities
            .keys()
            .map(|(module, action)| format!("{module}.{action}"))
            .collect();
        names.sort();
        names
    }

    /// Invoke `module.action` with positional arguments.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Unsupported` for unknown pairs,
    /// `ActionError::Arity` on an argument count mismatch, or whatever the
    /// handler returns.
    pub async fn invoke(
        &self,
        module: &str,
        action: &str,
        args: Vec<Value>,
    ) -> Result<Value, ActionError> {
        let capability = self
            .capabilities
            .get(&(module.to_string(), action.to_string()))
            .ok_or_else(|| ActionError::Unsupported {
                module: module.to_string(),
                action: action.to_string(),
            })?;

        if let Some(expected) = capability.arity {
            if args.len() != expected {
                return Err(ActionError::Arity {
                    expected,
                    actual: args.len(),
                });
            }
        }

        capability.handler.call(args).await
    }
}
