//! Fallback HTML pages used when no handler produces a response.

use once_cell::sync::Lazy;
use std::sync::Arc;

pub trait FallbackRenderer: Send + Sync {
    fn not_found_html(&self) -> String;

    fn internal_error_html(&self) -> String;
}

pub type SharedRenderer = Arc<dyn FallbackRenderer>;

/// The built-in error pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

const PAGE_STYLE: &str = r#"    <style>
        body {
            font-family: sans-serif;
            text-align: center;
            margin: 50px;
        }

        h1 {
            color: #333;
        }

        hr {
            border: none;
            border-top: 1px solid #ccc;
            margin: 20px auto;
            width: 50%;
        }

        p {
            color: #666;
        }
    </style>
"#;

impl HtmlRenderer {
    fn page(title: &str, message: &str) -> String {
        format!(
            "<html>\n    <head>\n        <title>{title}</title>\n    </head>\n{PAGE_STYLE}    <body>\n        <h1>{heading}</h1>\n        <hr>\n        <p>{message}</p>\n    </body>\n</html>\n",
            heading = title.replacen(' ', " | ", 1),
        )
    }
}

impl FallbackRenderer for HtmlRenderer {
    fn not_found_html(&self) -> String {
        Self::page(
            "404 Not Found",
            "The requested URL was not found on this server.",
        )
    }

    fn internal_error_html(&self) -> String {
        Self::page(
            "500 Internal Server Error",
            "The server could not complete the request.",
        )
    }
}

pub(crate) static DEFAULT_RENDERER: Lazy<SharedRenderer> = Lazy::new(|| Arc::new(HtmlRenderer));
