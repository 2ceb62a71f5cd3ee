//! Start-up surface: register functions, then freeze into a router.

use std::sync::Arc;

use axum::Router;
use relay_core::{CoreError, DurableFunction, Registry};
use relay_executor::{Connector, Engine, HttpTransport, TaskEngine};

use crate::{
    bridge::Bridge,
    config::GatewayConfig,
    routes::{create_router, AppState},
};

/// Options accepted by [`Gateway::register`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterOptions {
    /// Defaults to `1`.
    pub version: Option<u32>,
}

impl RegisterOptions {
    /// Register under a specific version.
    #[must_use]
    pub fn version(version: u32) -> Self {
        Self { version: Some(version) }
    }
}

/// A gateway under construction.
///
/// Functions can only be registered before [`Gateway::into_router`]; after
/// that the registry is shared read-only by every request.
pub struct Gateway {
    registry: Registry,
    engine: Arc<dyn Engine>,
    connector: Arc<dyn Connector>,
    config: GatewayConfig,
}

impl Gateway {
    /// A gateway using the task engine and the HTTP transport.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            registry: Registry::new(),
            engine: Arc::new(TaskEngine::new()),
            connector: Arc::new(HttpTransport::new()),
            config,
        }
    }

    /// Replace the engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the transport connector.
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Register `func`. Without an explicit `name` the function's own
    /// [`DurableFunction::name`] is used.
    ///
    /// # Errors
    /// - [`CoreError::UnnamedFunction`] if no name is available.
    /// - [`CoreError::DuplicateFunction`] if the name and version are taken.
    /// - [`CoreError::InvalidVersion`] for version `0`.
    pub fn register<F>(
        &mut self,
        name: Option<&str>,
        func: F,
        options: RegisterOptions,
    ) -> Result<(), CoreError>
    where
        F: DurableFunction + 'static,
    {
        let name = match name {
            Some(n) => n.to_owned(),
            None => func.name().ok_or(CoreError::UnnamedFunction)?.to_owned(),
        };
        let version = options.version.unwrap_or(1);
        self.registry.add(Arc::new(func), &name, version)?;
        tracing::debug!(%name, version, "function registered");
        Ok(())
    }

    /// Number of registered functions.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.registry.len()
    }

    /// The configuration this gateway was built with.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Freeze the registry and build the HTTP router.
    #[must_use]
    pub fn into_router(self) -> Router {
        let bridge = Bridge::new(
            Arc::new(self.registry),
            self.engine,
            self.connector,
            self.config.credentials,
            self.config.deadline,
        );
        create_router(Arc::new(AppState {
            bridge,
            listener_scheme: self.config.listener_scheme,
            verbose: self.config.verbose,
        }))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use relay_core::{from_fn, Context, FunctionError};
    use serde_json::{json, Value};

    use super::*;

    struct Named;

    #[async_trait]
    impl DurableFunction for Named {
        async fn call(&self, _ctx: Context, _args: Vec<Value>) -> Result<Value, FunctionError> {
            Ok(json!("named"))
        }

        fn name(&self) -> Option<&str> {
            Some("named")
        }
    }

    fn noop() -> impl DurableFunction {
        from_fn(|_ctx: Context, _args: Vec<Value>| async move {
            Ok::<_, FunctionError>(Value::Null)
        })
    }

    #[test]
    fn register_defaults_to_version_one() {
        let mut gateway = Gateway::new(GatewayConfig::default());
        assert!(gateway.register(Some("f"), noop(), RegisterOptions::default()).is_ok());
        assert!(
            matches!(
                gateway.register(Some("f"), noop(), RegisterOptions::version(1)),
                Err(CoreError::DuplicateFunction { version: 1, .. })
            ),
            "default version must be 1"
        );
        assert!(gateway.register(Some("f"), noop(), RegisterOptions::version(2)).is_ok());
        assert_eq!(gateway.registered(), 2);
    }

    #[test]
    fn register_without_name_uses_function_name() {
        let mut gateway = Gateway::new(GatewayConfig::default());
        assert!(gateway.register(None, Named, RegisterOptions::default()).is_ok());
        assert!(matches!(
            gateway.register(None, noop(), RegisterOptions::default()),
            Err(CoreError::UnnamedFunction)
        ));
        assert_eq!(gateway.registered(), 1);
    }
}
