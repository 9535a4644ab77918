use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use routeline::handler::resolver::{ClassName, ClassRegistry, Controller};
use routeline::handler::{HandlerError, SharedHandler, handler_fn, method_handler};
use routeline::message::hyper::{from_hyper, into_hyper};
use routeline::middleware::access_log::AccessLog;
use routeline::middleware::recover::RecoverErrors;
use routeline::{DispatchError, Middleware, Next, Request, Response, Router, StatusCode};
use tokio::net::TcpListener;

#[derive(Default, ClassName)]
struct GreetingController {
    greeting: String,
}

impl GreetingController {
    fn greet(&self, name: &str) -> String {
        let greeting = if self.greeting.is_empty() { "Hello" } else { &self.greeting };
        format!("<h1>{greeting}, {name}!</h1>")
    }
}

impl Controller for GreetingController {
    fn bind(self: Arc<Self>, method: &str) -> Option<SharedHandler> {
        match method {
            "index" => Some(method_handler(self, |this, _request, _response, _params| async move {
                Ok::<_, HandlerError>(this.greet("World"))
            })),
            "show" => Some(method_handler(self, |this, _request, _response, params| async move {
                Ok::<_, HandlerError>(this.greet(params.get("name").unwrap_or("stranger")))
            })),
            _ => None,
        }
    }
}

/// Rejects requests without an `X-Api-Key` header.
struct RequireApiKey;

#[async_trait]
impl Middleware for RequireApiKey {
    async fn process(&self, request: Request, next: Next<'_>) -> Result<Response, DispatchError> {
        if request.header("X-Api-Key").is_none() {
            return Ok(Response::new()
                .with_status(StatusCode::UNAUTHORIZED)
                .with_body("missing api key"));
        }
        next.run(request).await
    }

    fn name(&self) -> &str {
        "require_api_key"
    }
}

fn create_router() -> Result<Router, Box<dyn std::error::Error + Send + Sync>> {
    let classes = ClassRegistry::new();
    classes.register::<GreetingController>();

    let mut router = Router::new(Arc::new(classes));
    router.global_middleware(AccessLog).global_middleware(RecoverErrors::default());

    router.get("/", "GreetingController")?.name("home")?;
    router.get("/greet/{name}", "GreetingController@show")?.name("greet")?;
    router
        .post(
            "/echo",
            handler_fn(|request, response: Response, _params| async move {
                Ok::<_, HandlerError>(
                    response
                        .with_header("Content-Type", "text/plain")
                        .with_body(format!("Echo: {}", request.body_text())),
                )
            }),
        )?
        .middleware(RequireApiKey)?;
    router.get("/fail", handler_fn(|_request, _response, _params| async move {
        Err::<String, _>("this route always fails")
    }))?;
    router.set_pre_route("/v1")?;
    Ok(router)
}

async fn handle_request(
    request: hyper::Request<Incoming>,
    router: Arc<Router>,
) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
    let request = match from_hyper(request).await {
        Ok(request) => request,
        Err(e) => {
            log::warn!("Could not read request body: {}", e);
            return Ok(plain(400, "bad request"));
        }
    };
    let response = match router.dispatch(request.clone()).await {
        Ok(response) => response,
        Err(e) => {
            log::error!("[{}] Dispatch failed: {}", request.id(), e);
            match router.internal_error(&request).await {
                Ok(response) => response,
                Err(_) => return Ok(plain(500, "internal server error")),
            }
        }
    };
    Ok(into_hyper(response).unwrap_or_else(|_| plain(500, "invalid response")))
}

fn plain(status: u16, body: &'static str) -> hyper::Response<Full<Bytes>> {
    let mut response = hyper::Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = hyper::StatusCode::from_u16(status).unwrap_or(hyper::StatusCode::INTERNAL_SERVER_ERROR);
    response
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    let router = Arc::new(create_router()?);
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = TcpListener::bind(addr).await?;

    println!("routeline demo running on http://{}", addr);
    for route in router.routes() {
        println!("  {:<7} {}", route.method.to_string(), route.pattern);
    }
    println!();
    println!("Examples:");
    println!("  curl http://127.0.0.1:3000/v1/greet/ferris");
    println!("  curl -X POST -H 'X-Api-Key: demo' -d 'Hello' http://127.0.0.1:3000/v1/echo");
    println!("  curl http://127.0.0.1:3000/v1/fail");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let router = router.clone();
        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service_fn(move |request| handle_request(request, router.clone())))
                .await
            {
                eprintln!("Error serving connection: {}", err);
            }
        });
    }
}
