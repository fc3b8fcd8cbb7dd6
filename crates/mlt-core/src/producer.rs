// crates/mlt-core/src/producer.rs
//
// The higher-level object model (services, producers, filters, transitions)
// lives outside this crate; this trait is the minimal contract the consumer
// core needs from it. Implementors own whatever timeline/service graph state
// produces frames; this crate never looks inside.

use crate::frame::Frame;

/// A connected upstream service, or the test-card fallback.
///
/// `acquire` mirrors MLT's synchronous `mlt_service_get_frame`: the producer
/// returns the next frame immediately, or `None` at end-of-stream (or on any
/// transient failure, which the worker treats the same as end-of-stream, per
/// starvation handling in the read-ahead loop).
pub trait UpstreamProducer: Send + Sync {
    fn acquire(&self) -> Option<Frame>;
}

/// Injected collaborator that resolves a `test_card` identifier to a running
/// producer. Stands in for MLT's process-wide `mlt_factory_producer` lookup;
/// see DESIGN.md for why this is a capability rather than a singleton.
pub trait FrameSourceFactory: Send + Sync {
    /// Instantiate the producer named by `test_card`. Returns `None` if the
    /// identifier isn't recognised; the consumer simply runs without a
    /// fallback in that case, same as the original's silent no-op.
    fn create(&self, test_card: &str) -> Option<std::sync::Arc<dyn UpstreamProducer>>;
}
