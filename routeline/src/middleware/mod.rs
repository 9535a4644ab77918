pub mod access_log;
pub mod recover;
pub mod registry;

use crate::message::{Request, Response};
use crate::router::dispatcher::DispatchError;
use async_trait::async_trait;
use std::sync::Arc;

pub type SharedMiddleware = Arc<dyn Middleware>;

/// A request-processing stage that runs before (and around) the handler.
///
/// # Behavior
/// A stage receives the request and a [`Next`] continuation. Calling
/// [`Next::run`] hands the (possibly updated) request to the remaining stages
/// and finally to the handler; not calling it short-circuits the dispatch and
/// the stage's own response becomes the result.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn process(&self, request: Request, next: Next<'_>) -> Result<Response, DispatchError>;

    fn name(&self) -> &str;
}

/// The innermost step of a middleware chain.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, request: Request) -> Result<Response, DispatchError>;
}

/// Continuation handed to a middleware stage.
pub struct Next<'a> {
    stages: &'a [SharedMiddleware],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    pub(crate) fn new(stages: &'a [SharedMiddleware], endpoint: &'a dyn Endpoint) -> Self {
        Self { stages, endpoint }
    }

    /// Number of stages that will still run before the endpoint.
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }

    /// Runs the remaining stages, then the endpoint.
    pub async fn run(self, request: Request) -> Result<Response, DispatchError> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                log::trace!("Running middleware '{}'", stage.name());
                stage.process(request, Next::new(rest, self.endpoint)).await
            }
            None => self.endpoint.call(request).await,
        }
    }
}

/// An ordered list of middleware stages.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    stages: Vec<SharedMiddleware>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: SharedMiddleware) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[SharedMiddleware] {
        &self.stages
    }

    pub fn names(&self) -> Vec<String> {
        self.stages
            .iter()
            .map(|stage| stage.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs `stages` strictly in order and finally `endpoint`.
    pub async fn run(
        stages: &[SharedMiddleware],
        request: Request,
        endpoint: &dyn Endpoint,
    ) -> Result<Response, DispatchError> {
        Next::new(stages, endpoint).run(request).await
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl FromIterator<SharedMiddleware> for MiddlewareChain {
    fn from_iter<T: IntoIterator<Item = SharedMiddleware>>(iter: T) -> Self {
        Self {
            stages: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records its name into a shared trace, optionally without continuing.
    pub(crate) struct Tracing {
        pub name: &'static str,
        pub trace: Arc<Mutex<Vec<String>>>,
        pub short_circuit: bool,
    }

    #[async_trait]
    impl Middleware for Tracing {
        async fn process(&self, request: Request, next: Next<'_>) -> Result<Response, DispatchError> {
            self.trace.lock().unwrap().push(self.name.to_string());
            if self.short_circuit {
                return Ok(Response::new().with_body(format!("stopped by {}", self.name)));
            }
            next.run(request.with_header("X-Last-Stage", self.name)).await
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    struct Terminal {
        trace: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Endpoint for Terminal {
        async fn call(&self, request: Request) -> Result<Response, DispatchError> {
            self.trace.lock().unwrap().push("handler".to_string());
            Ok(Response::new().with_body(request.header("X-Last-Stage").unwrap_or("none").to_string()))
        }
    }

    fn stage(name: &'static str, trace: &Arc<Mutex<Vec<String>>>, short_circuit: bool) -> SharedMiddleware {
        Arc::new(Tracing {
            name,
            trace: trace.clone(),
            short_circuit,
        })
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let chain: MiddlewareChain = [stage("first", &trace, false), stage("second", &trace, false)]
            .into_iter()
            .collect();
        let endpoint = Terminal { trace: trace.clone() };
        let response = MiddlewareChain::run(chain.stages(), Request::new("GET", "/"), &endpoint)
            .await
            .unwrap();
        assert_eq!(response.body_text(), "second");
        assert_eq!(*trace.lock().unwrap(), vec!["first", "second", "handler"]);
        assert_eq!(chain.names(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_later_stages() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let stages = vec![
            stage("auth", &trace, true),
            stage("audit", &trace, false),
        ];
        let endpoint = Terminal { trace: trace.clone() };
        let response = MiddlewareChain::run(&stages, Request::new("GET", "/"), &endpoint)
            .await
            .unwrap();
        assert_eq!(response.body_text(), "stopped by auth");
        assert_eq!(*trace.lock().unwrap(), vec!["auth"]);
    }

    #[tokio::test]
    async fn test_empty_chain_calls_endpoint() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let endpoint = Terminal { trace: trace.clone() };
        let response = MiddlewareChain::run(&[], Request::new("GET", "/"), &endpoint)
            .await
            .unwrap();
        assert_eq!(response.body_text(), "none");
        assert_eq!(*trace.lock().unwrap(), vec!["handler"]);
    }
}
