// crates/mlt-core/src/lib.rs
//
// Pure project data. No threads, no sockets, no sink-specific decode.
// Serializable via serde where it crosses a process boundary (ConsumerProperties).
// Used by mlt-consumer and by any future crate that needs the same frame/property
// vocabulary without pulling in the worker machinery.

pub mod frame;
pub mod producer;
pub mod properties;
pub mod sample_calculator;

pub use frame::{AudioBuffer, Frame, FrameMaterialiser, ImageBuffer, PixelFormat, SampleFormat};
pub use producer::UpstreamProducer;
pub use properties::{ConsumerProperties, Normalisation};
pub use sample_calculator::sample_calculator;
