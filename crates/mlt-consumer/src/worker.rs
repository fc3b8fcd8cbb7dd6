// crates/mlt-consumer/src/worker.rs
//
// ReadAheadWorker: the single long-lived background task per consumer that
// bridges the frame source to the presentation queue. A stateful loop owned
// by one thread, backpressured by a bounded hand-off, torn down by a flag
// the caller flips and then joins.
//
// One deliberate departure from the original C loop: `mlt_consumer_get_frame`
// returning NULL is handled here by retrying acquisition in a small inner
// loop rather than re-entering the outer loop with a stale/absent frame.
// The original's `continue` re-pushes whatever `frame` last held (NULL on
// transient starvation), which doesn't typecheck for an owned, non-optional
// `Frame`. The retry loop still rechecks `ahead` every iteration, so it
// unblocks on stop within the same roughly one-second bound push-mode
// acquisition already guarantees.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use mlt_core::frame::PixelFormat;

use crate::queue::PresentationQueue;
use crate::skip::SkipState;
use crate::source::FrameSource;

#[derive(Clone, Copy, Debug)]
pub struct WorkerConfig {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub video_off: bool,
    pub audio_off: bool,
    pub fps: f64,
    pub frequency: u32,
    pub channels: u32,
}

pub struct ReadAheadWorker {
    thread: Option<JoinHandle<()>>,
}

impl ReadAheadWorker {
    /// Spawn the worker. `ahead` is latched `true` here and is the only
    /// cooperative cancellation signal the thread observes.
    pub fn spawn(
        source: Arc<dyn FrameSource>,
        queue: Arc<PresentationQueue>,
        ahead: Arc<AtomicBool>,
        config: WorkerConfig,
    ) -> Self {
        ahead.store(true, Ordering::SeqCst);
        let thread = thread::spawn(move || run(source, queue, ahead, config));
        Self { thread: Some(thread) }
    }

    /// Block until the worker thread has exited. Consumed by value so a
    /// worker can only be joined once.
    pub fn join(mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn elapsed_micros(ante: &mut Instant) -> i64 {
    let now = Instant::now();
    let dt = now.duration_since(*ante);
    *ante = now;
    dt.as_micros() as i64
}

fn run(source: Arc<dyn FrameSource>, queue: Arc<PresentationQueue>, ahead: Arc<AtomicBool>, config: WorkerConfig) {
    let still_running = {
        let ahead = ahead.clone();
        move || ahead.load(Ordering::SeqCst)
    };

    // Bootstrap: the first frame primes the loop below.
    let mut current = match source.acquire() {
        Some(frame) => frame,
        None => return, // nothing to read ahead of, so the worker has nothing to do
    };

    if !config.video_off {
        current.materialise_image(config.width, config.height, config.format);
    }
    let mut counter: u32 = 0;
    if !config.audio_off {
        current.materialise_audio(config.fps, config.frequency, config.channels, counter);
        counter += 1;
    }
    current.rendered = true;

    let mut skip = SkipState::new();
    let mut ante = Instant::now();

    // Main loop: push the frame in hand, acquire the next one, decide
    // whether to skip it, and materialise accordingly.
    while ahead.load(Ordering::SeqCst) {
        queue.push_back(current, &still_running);
        skip.time_wait += elapsed_micros(&mut ante);

        let mut next = None;
        while ahead.load(Ordering::SeqCst) {
            match source.acquire() {
                Some(frame) => {
                    next = Some(frame);
                    break;
                }
                None => continue, // upstream starvation: transient, keep polling
            }
        }
        skip.time_frame += elapsed_micros(&mut ante);

        current = match next {
            Some(frame) => frame,
            None => break, // stop arrived while we had no frame in hand
        };

        if current.attrs.speed != 1 {
            skip.reset_for_trick_play();
        }

        if !skip.skip_next {
            if !config.video_off {
                current.materialise_image(config.width, config.height, config.format);
            }
            current.rendered = true;
        } else {
            skip.record_skip();
        }

        // Audio is never skipped, only video.
        if !config.audio_off {
            current.materialise_audio(config.fps, config.frequency, config.channels, counter);
            counter += 1;
        }

        skip.time_process += elapsed_micros(&mut ante);
        skip.count += 1;
        skip.decide_skip_next(queue.count());
    }

    // Teardown: `current` drops here when it was never pushed (outer
    // condition false before this iteration's push, or the inner
    // starvation-retry gave up).
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlt_core::frame::{AudioBuffer, Frame, ImageBuffer, SampleFormat};
    use mlt_core::FrameMaterialiser;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;
    use std::time::Duration;

    struct CountingMaterialiser {
        image_calls: AtomicU32,
    }

    impl FrameMaterialiser for CountingMaterialiser {
        fn materialise_image(&self, width: u32, height: u32, format: PixelFormat) -> ImageBuffer {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            ImageBuffer { format, width, height, data: vec![] }
        }
        fn materialise_audio(&self, frequency: u32, channels: u32, samples: u32) -> AudioBuffer {
            AudioBuffer { format: SampleFormat::S16, frequency, channels, samples, data: vec![] }
        }
    }

    /// A source that hands out a fixed number of frames, then always returns
    /// None (simulating permanent EOF, the way a finite test clip would).
    struct FiniteSource {
        remaining: Mutex<u32>,
        materialiser: Arc<CountingMaterialiser>,
        speeds: Mutex<Vec<i32>>, // per-frame speed override, popped front-to-back
    }

    impl FrameSource for FiniteSource {
        fn acquire(&self) -> Option<Frame> {
            let mut remaining = self.remaining.lock().unwrap();
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
            let mut frame = Frame::new(self.materialiser.clone());
            let mut speeds = self.speeds.lock().unwrap();
            if !speeds.is_empty() {
                frame.attrs.speed = speeds.remove(0);
            } else {
                frame.attrs.speed = 1;
            }
            Some(frame)
        }
    }

    fn config() -> WorkerConfig {
        WorkerConfig {
            width: 16,
            height: 16,
            format: PixelFormat::Yuv422,
            video_off: false,
            audio_off: false,
            fps: 25.0,
            frequency: 48000,
            channels: 2,
        }
    }

    #[test]
    fn worker_drains_finite_source_and_exits() {
        let materialiser = Arc::new(CountingMaterialiser { image_calls: 0.into() });
        let source: Arc<dyn FrameSource> = Arc::new(FiniteSource {
            remaining: Mutex::new(5),
            materialiser: materialiser.clone(),
            speeds: Mutex::new(vec![]),
        });
        let queue = Arc::new(PresentationQueue::new(25));
        let ahead = Arc::new(AtomicBool::new(false));
        let worker = ReadAheadWorker::spawn(source, queue.clone(), ahead.clone(), config());

        // The source only has 5 frames; once exhausted the worker exits on
        // its own even though nobody ever touches `ahead` again.
        worker.join();
        assert!(queue.count() <= 5);
    }

    #[test]
    fn trick_play_frame_is_always_materialised() {
        let materialiser = Arc::new(CountingMaterialiser { image_calls: 0.into() });
        let source: Arc<dyn FrameSource> = Arc::new(FiniteSource {
            remaining: Mutex::new(3),
            materialiser: materialiser.clone(),
            speeds: Mutex::new(vec![1, 2, 1]), // middle frame is trick-play
        });
        let queue = Arc::new(PresentationQueue::new(25));
        let ahead = Arc::new(AtomicBool::new(false));
        let worker = ReadAheadWorker::spawn(source, queue.clone(), ahead, config());
        worker.join();

        let mut rendered_count = 0;
        while let Some(frame) = queue.pop_back() {
            if frame.rendered {
                rendered_count += 1;
            }
        }
        // Bootstrap frame + the trick-play frame are always rendered at
        // minimum; with a drained 3-frame source and no real time pressure
        // the skip controller never engages, so every frame should show up
        // rendered.
        assert!(rendered_count >= 2);
    }

    #[test]
    fn stopping_ahead_unblocks_worker_promptly() {
        // A source that blocks forever once exhausted, simulating push-mode
        // starvation. The worker must still exit once `ahead` flips.
        struct BlockingThenNothing {
            first: Mutex<bool>,
            materialiser: Arc<CountingMaterialiser>,
        }
        impl FrameSource for BlockingThenNothing {
            fn acquire(&self) -> Option<Frame> {
                let mut first = self.first.lock().unwrap();
                if *first {
                    *first = false;
                    Some(Frame::new(self.materialiser.clone()))
                } else {
                    std::thread::sleep(Duration::from_millis(5));
                    None
                }
            }
        }

        let materialiser = Arc::new(CountingMaterialiser { image_calls: 0.into() });
        let source: Arc<dyn FrameSource> = Arc::new(BlockingThenNothing {
            first: Mutex::new(true),
            materialiser,
        });
        let queue = Arc::new(PresentationQueue::new(25));
        let ahead = Arc::new(AtomicBool::new(true));
        let worker = ReadAheadWorker::spawn(source, queue, ahead.clone(), config());

        std::thread::sleep(Duration::from_millis(30));
        ahead.store(false, Ordering::SeqCst);
        worker.join(); // must return; the test hangs if cancellation is broken
    }
}
