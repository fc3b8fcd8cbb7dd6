// crates/mlt-core/src/frame.rs
//
// Frame: one unit of presentation (one video image plus its aligned audio
// slice). Owned by exactly one holder at a time: the push slot, the
// presentation queue, the worker's local variable, or the sink. That
// invariant comes for free from Rust's move semantics rather than being
// tracked at runtime: `Frame` is not `Clone`, so passing it anywhere
// transfers ownership.

use std::cell::OnceCell;
use std::sync::{Arc, Weak};

use uuid::Uuid;

use crate::producer::UpstreamProducer;
use crate::sample_calculator::sample_calculator;

/// Output pixel format for the materialised image. Default is packed 4:2:2
/// YUV.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Yuv422,
    Rgb24,
    Rgba,
}

impl Default for PixelFormat {
    fn default() -> Self {
        PixelFormat::Yuv422
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    S16,
    F32Le,
}

impl Default for SampleFormat {
    fn default() -> Self {
        SampleFormat::S16
    }
}

/// A materialised image: raw pixel data in `format` at `width`x`height`.
#[derive(Clone, Debug)]
pub struct ImageBuffer {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// A materialised audio slice: `samples` frames of `channels`-interleaved data
/// at `frequency` Hz. `samples` is the sample-calculator's per-frame count,
/// not a fixed constant; see `sample_calculator`.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    pub format: SampleFormat,
    pub frequency: u32,
    pub channels: u32,
    pub samples: u32,
    pub data: Vec<u8>,
}

/// Injected collaborator that actually produces pixels/samples for a frame.
/// Kept out of this crate's concern: the consumer core never decodes
/// anything, it only calls through this trait. Format-specific rendering
/// back-ends live elsewhere entirely.
pub trait FrameMaterialiser: Send + Sync {
    fn materialise_image(&self, width: u32, height: u32, format: PixelFormat) -> ImageBuffer;
    fn materialise_audio(
        &self,
        frequency: u32,
        channels: u32,
        samples: u32,
    ) -> AudioBuffer;
}

/// Recognised frame-level properties the consumer core attaches after
/// acquisition and consults before materialisation.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameAttributes {
    /// 1 means normal playback; anything else is trick play and disables
    /// skipping for this frame.
    pub speed: i32,
    pub rescale_interp: Option<RescaleInterp>,
    pub consumer_aspect_ratio: f64,
    pub consumer_deinterlace: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RescaleInterp {
    Nearest,
    Bilinear,
    Hyper,
}

impl Default for RescaleInterp {
    fn default() -> Self {
        RescaleInterp::Bilinear
    }
}

impl RescaleInterp {
    /// Parses the `rescale` property string. Anything unrecognised falls
    /// back to the default rather than rejecting the value outright.
    pub fn parse(value: &str) -> Self {
        match value {
            "nearest" => RescaleInterp::Nearest,
            "hyper" | "bicubic" => RescaleInterp::Hyper,
            _ => RescaleInterp::Bilinear,
        }
    }
}

/// One unit of presentation. Materialisation is lazy and idempotent: calling
/// `materialise_image`/`materialise_audio` twice with the same materialiser
/// only does the work once (`OnceCell`), so nothing needs a separate dirty
/// flag.
pub struct Frame {
    pub id: Uuid,
    pub attrs: FrameAttributes,
    pub rendered: bool,
    /// Non-owning back-reference to the test-card fallback, attached by the
    /// consumer core after acquisition. `Weak` because the consumer owns
    /// the test-card producer's lifetime, not the frame.
    pub test_card_producer: Option<Weak<dyn UpstreamProducer>>,

    image: OnceCell<ImageBuffer>,
    audio: OnceCell<AudioBuffer>,
    materialiser: Arc<dyn FrameMaterialiser>,
}

impl Frame {
    pub fn new(materialiser: Arc<dyn FrameMaterialiser>) -> Self {
        Self {
            id: Uuid::new_v4(),
            attrs: FrameAttributes::default(),
            rendered: false,
            test_card_producer: None,
            image: OnceCell::new(),
            audio: OnceCell::new(),
            materialiser,
        }
    }

    /// Force image materialisation at `(width, height, format)`. A no-op if
    /// already materialised; subsequent calls just read the cached buffer.
    pub fn materialise_image(&self, width: u32, height: u32, format: PixelFormat) -> &ImageBuffer {
        self.image
            .get_or_init(|| self.materialiser.materialise_image(width, height, format))
    }

    pub fn image(&self) -> Option<&ImageBuffer> {
        self.image.get()
    }

    /// Force audio materialisation for the `counter`-th frame of the worker's
    /// lifetime, using the sample calculator to size the slice so rounding is
    /// distributed evenly over time rather than truncated every frame.
    pub fn materialise_audio(&self, fps: f64, frequency: u32, channels: u32, counter: u32) -> &AudioBuffer {
        self.audio.get_or_init(|| {
            let samples = sample_calculator(fps, frequency, counter);
            self.materialiser.materialise_audio(frequency, channels, samples)
        })
    }

    pub fn audio(&self) -> Option<&AudioBuffer> {
        self.audio.get()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("attrs", &self.attrs)
            .field("rendered", &self.rendered)
            .field("has_image", &self.image.get().is_some())
            .field("has_audio", &self.audio.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingMaterialiser {
        image_calls: std::sync::atomic::AtomicU32,
    }

    impl FrameMaterialiser for CountingMaterialiser {
        fn materialise_image(&self, width: u32, height: u32, format: PixelFormat) -> ImageBuffer {
            self.image_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            ImageBuffer { format, width, height, data: vec![0; (width * height) as usize] }
        }

        fn materialise_audio(&self, frequency: u32, channels: u32, samples: u32) -> AudioBuffer {
            AudioBuffer {
                format: SampleFormat::S16,
                frequency,
                channels,
                samples,
                data: vec![0; (samples * channels * 2) as usize],
            }
        }
    }

    #[test]
    fn materialise_image_is_idempotent() {
        let m = Arc::new(CountingMaterialiser { image_calls: 0.into() });
        let frame = Frame::new(m.clone());
        frame.materialise_image(720, 576, PixelFormat::Yuv422);
        frame.materialise_image(720, 576, PixelFormat::Yuv422);
        assert_eq!(m.image_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn fresh_frame_has_no_image_or_audio() {
        let m = Arc::new(CountingMaterialiser { image_calls: 0.into() });
        let frame = Frame::new(m);
        assert!(frame.image().is_none());
        assert!(frame.audio().is_none());
    }
}
