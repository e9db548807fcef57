//! Diagnostics. Each worker-facing component gets a named `tracing` span
//! and delegates to the `tracing` ecosystem directly instead of
//! hand-rolling formatting — this crate is a library, not an app with its
//! own log sink, so the ambient logging stack is "be a good `tracing`
//! citizen", not "own a logger".

use tracing::Span;
use workhive_sdk::trace::{TraceWriter, TracingTraceWriter};

/// A named diagnostic source, one per worker ID or per internal component
/// (`"hive::controller"`, `"hive::router"`, ...).
#[derive(Clone)]
pub struct Diag {
    span: Span,
    writer: TracingTraceWriter,
}

impl Diag {
    pub fn named(name: &str) -> Self {
        Self {
            span: tracing::info_span!("workhive", component = %name),
            writer: TracingTraceWriter,
        }
    }

    pub fn for_worker(id: &str) -> Self {
        Self {
            span: tracing::info_span!("workhive", worker_id = %id),
            writer: TracingTraceWriter,
        }
    }

    pub fn info(&self, message: &str) {
        let _enter = self.span.enter();
        self.writer.info(message);
    }

    pub fn warn(&self, message: &str) {
        let _enter = self.span.enter();
        self.writer.warning(message);
    }

    pub fn error(&self, message: &str) {
        let _enter = self.span.enter();
        self.writer.error(message);
    }

    pub fn debug(&self, message: &str) {
        let _enter = self.span.enter();
        self.writer.verbose(message);
    }
}
