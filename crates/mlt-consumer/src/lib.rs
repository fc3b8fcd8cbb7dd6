// crates/mlt-consumer/src/lib.rs

pub mod consumer;
pub mod queue;
pub mod sink;
pub mod skip;
pub mod source;
pub mod worker;

pub use consumer::Consumer;
pub use sink::{ConsumerSink, EventHub, FrameShowObserver, NullSink, StoppedObserver};
pub use source::{ConnectedSource, EnrichingSource, FrameSource, PushSlot, PushSource};
pub use worker::{ReadAheadWorker, WorkerConfig};
