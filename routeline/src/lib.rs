//! Ordered HTTP route table with `{placeholder}` matching, controller action
//! resolution and middleware dispatch.

extern crate self as routeline;

pub mod config;
pub mod handler;
pub mod message;
pub mod middleware;
pub mod render;
pub mod router;
pub mod status;

pub use handler::resolver::ClassName;
pub use handler::{handler_fn, method_handler, Handler, HandlerError, SharedHandler};
pub use message::{Method, Reply, Request, Response};
pub use middleware::{Middleware, Next};
pub use router::dispatcher::DispatchError;
pub use router::{Router, RouterError};
pub use status::StatusCode;
