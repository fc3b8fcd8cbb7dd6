// crates/mlt-consumer/src/consumer.rs
//
// Lifecycle controller tying the other modules together: connection state,
// the push slot, the read-ahead worker, the presentation queue and the sink
// adapter. One owner struct holds the thread handle, the cancellation flag
// and the collaborators, exposing start/stop/join-style methods as its only
// public lifecycle surface, generalized here from one fixed pipeline to the
// connected/push choice and the real-time/direct split.
//
// Ref-counted teardown (`close` only runs once, when the last handle goes
// away) is modeled with `Arc<Consumer>` + `Drop` rather than a manual
// strong-count check: that's what `Arc` is for, and `Drop::drop` already
// runs exactly once no matter how many clones existed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use mlt_core::frame::{PixelFormat, RescaleInterp};
use mlt_core::producer::FrameSourceFactory;
use mlt_core::{ConsumerProperties, Frame, FrameMaterialiser, UpstreamProducer};

use crate::queue::PresentationQueue;
use crate::sink::{ConsumerSink, EventHub, FrameShowObserver, StoppedObserver};
use crate::source::{ConnectedSource, EnrichingSource, FrameSource, IdleSource, PushSlot, PushSource};
use crate::worker::{ReadAheadWorker, WorkerConfig};

/// Everything the consumer needs to materialise frames, injected once at
/// construction. A real back-end supplies an `UpstreamProducer`-agnostic
/// encoder/renderer here; tests use a counting stub.
pub struct Consumer {
    properties: Mutex<ConsumerProperties>,
    format: PixelFormat,
    materialiser: Arc<dyn FrameMaterialiser>,
    factory: Option<Arc<dyn FrameSourceFactory>>,
    sink: Arc<dyn ConsumerSink>,
    events: Arc<EventHub>,

    producer: Mutex<Option<Arc<dyn UpstreamProducer>>>,
    push_slot: Arc<PushSlot>,
    test_card_producer: Mutex<Option<Arc<dyn UpstreamProducer>>>,

    /// Built fresh on every `start`, shared between the worker thread and a
    /// direct (non-real-time) `realtime_frame` call.
    active_source: Mutex<Option<Arc<dyn FrameSource>>>,
    queue: Mutex<Option<Arc<PresentationQueue>>>,
    worker: Mutex<Option<ReadAheadWorker>>,
    ahead: Arc<AtomicBool>,
    real_time: AtomicBool,
}

impl Consumer {
    pub fn new(
        materialiser: Arc<dyn FrameMaterialiser>,
        sink: Arc<dyn ConsumerSink>,
        factory: Option<Arc<dyn FrameSourceFactory>>,
    ) -> Arc<Self> {
        let properties = ConsumerProperties::from_env();
        let real_time = properties.real_time;
        Arc::new(Self {
            properties: Mutex::new(properties),
            format: PixelFormat::default(),
            materialiser,
            factory,
            sink,
            events: Arc::new(EventHub::new()),
            producer: Mutex::new(None),
            push_slot: Arc::new(PushSlot::new()),
            test_card_producer: Mutex::new(None),
            active_source: Mutex::new(None),
            queue: Mutex::new(None),
            worker: Mutex::new(None),
            ahead: Arc::new(AtomicBool::new(false)),
            real_time: AtomicBool::new(real_time),
        })
    }

    pub fn properties(&self) -> ConsumerProperties {
        self.properties.lock().unwrap().clone()
    }

    pub fn set_properties(&self, properties: ConsumerProperties) {
        *self.properties.lock().unwrap() = properties;
    }

    pub fn on_frame_show(&self, observer: FrameShowObserver) {
        self.events.on_frame_show(observer);
    }

    pub fn on_stopped(&self, observer: StoppedObserver) {
        self.events.on_stopped(observer);
    }

    /// Attach an upstream service. Takes priority over push mode regardless
    /// of the `put_mode` property, matching the original's connected-producer
    /// check coming first.
    pub fn connect(&self, producer: Arc<dyn UpstreamProducer>) {
        *self.producer.lock().unwrap() = Some(producer);
    }

    pub fn disconnect(&self) {
        *self.producer.lock().unwrap() = None;
    }

    fn is_connected(&self) -> bool {
        self.producer.lock().unwrap().is_some()
    }

    /// Deposit a frame for the worker to pick up. A connected producer makes
    /// this a no-op (the frame is simply dropped) since the consumer already
    /// has a source. The return value is opaque and non-zero on every path;
    /// callers must not interpret it as a status code.
    pub fn put(&self, frame: Frame) -> i32 {
        if self.is_connected() {
            drop(frame);
        } else {
            let sink = self.sink.clone();
            self.push_slot.put(frame, &|| sink.is_stopped());
        }
        1
    }

    /// Start a new lifecycle: discard any stale push-slot frame, (re)attach
    /// the test-card fallback if configured, run the `ante` hook, latch
    /// `real_time`, rebuild the frame source from current connection state,
    /// and hand off to the sink adapter.
    pub fn start(&self) -> anyhow::Result<()> {
        self.push_slot.clear_and_notify();

        let snapshot = {
            let mut props = self.properties.lock().unwrap();
            props.running = true;
            props.clone()
        };

        self.sync_test_card(&snapshot);

        if let Some(cmd) = &snapshot.ante {
            run_shell_hook(cmd);
        }

        self.real_time.store(snapshot.real_time, Ordering::SeqCst);
        self.events.rearm();
        *self.active_source.lock().unwrap() = Some(self.build_source(&snapshot));

        self.sink.start()
    }

    fn sync_test_card(&self, snapshot: &ConsumerProperties) {
        let mut test_card = self.test_card_producer.lock().unwrap();
        match &snapshot.test_card {
            Some(name) if test_card.is_none() => {
                if let Some(factory) = &self.factory {
                    *test_card = factory.create(name);
                }
            }
            None => *test_card = None,
            _ => {}
        }
    }

    fn build_source(&self, snapshot: &ConsumerProperties) -> Arc<dyn FrameSource> {
        let rescale_interp = RescaleInterp::parse(&snapshot.rescale);
        let deinterlace = snapshot.progressive || snapshot.deinterlace;
        let test_card = self
            .test_card_producer
            .lock()
            .unwrap()
            .as_ref()
            .map(Arc::downgrade);

        let connected = self.producer.lock().unwrap().clone();
        if let Some(producer) = connected {
            Arc::new(EnrichingSource::new(
                ConnectedSource::new(producer),
                rescale_interp,
                snapshot.aspect_ratio,
                deinterlace,
                test_card,
            ))
        } else if snapshot.put_mode {
            let sink = self.sink.clone();
            let is_stopped: Arc<dyn Fn() -> bool + Send + Sync> = Arc::new(move || sink.is_stopped());
            Arc::new(EnrichingSource::new(
                PushSource::new(self.push_slot.clone(), is_stopped),
                rescale_interp,
                snapshot.aspect_ratio,
                deinterlace,
                test_card,
            ))
        } else {
            // Neither a producer is connected nor push mode is enabled:
            // there is nothing to read ahead of, so every acquire returns
            // None immediately rather than blocking on the push slot.
            Arc::new(EnrichingSource::new(
                IdleSource,
                rescale_interp,
                snapshot.aspect_ratio,
                deinterlace,
                test_card,
            ))
        }
    }

    fn worker_config(&self, snapshot: &ConsumerProperties) -> WorkerConfig {
        WorkerConfig {
            width: snapshot.width,
            height: snapshot.height,
            format: self.format,
            video_off: snapshot.video_off,
            audio_off: snapshot.audio_off,
            fps: snapshot.fps,
            frequency: snapshot.frequency,
            channels: snapshot.channels,
        }
    }

    /// Lazily spawns the read-ahead worker the first time it's needed,
    /// mirroring the original's `rt_frame` which starts read-ahead on demand
    /// rather than eagerly at `start`. Returns the queue feeding it.
    fn spawn_worker_if_needed(&self) -> Arc<PresentationQueue> {
        let mut worker_guard = self.worker.lock().unwrap();
        if worker_guard.is_some() {
            return self.queue.lock().unwrap().clone().expect("queue exists while worker runs");
        }

        let snapshot = self.properties.lock().unwrap().clone();
        let queue = Arc::new(PresentationQueue::new(snapshot.queue_capacity()));
        *self.queue.lock().unwrap() = Some(queue.clone());

        let source = self
            .active_source
            .lock()
            .unwrap()
            .clone()
            .expect("start() builds the source before realtime_frame can run");
        let config = self.worker_config(&snapshot);
        let worker = ReadAheadWorker::spawn(source, queue.clone(), self.ahead.clone(), config);
        *worker_guard = Some(worker);
        queue
    }

    /// The sink's one call into the core per frame. Real-time mode waits on
    /// the presentation queue (starting the worker on first use); direct mode
    /// calls straight through the frame source and force-marks the result
    /// rendered, since there's no read-ahead thread doing that for us. Every
    /// frame handed back here fires `consumer-frame-show` on its way out.
    pub fn realtime_frame(&self) -> Option<Frame> {
        let frame = if self.real_time.load(Ordering::SeqCst) {
            let queue = self.spawn_worker_if_needed();
            let prefill_size = self.properties.lock().unwrap().prefill_size() as usize;
            let ahead = self.ahead.clone();
            queue.realtime_pop(prefill_size, &move || ahead.load(Ordering::SeqCst))?
        } else {
            let source = self.active_source.lock().unwrap().clone()?;
            let mut frame = source.acquire()?;
            frame.rendered = true;
            frame
        };
        self.events.fire_frame_show(&frame);
        Some(frame)
    }

    /// Drop everything queued ahead without tearing down the worker.
    pub fn purge(&self) {
        if let Some(queue) = self.queue.lock().unwrap().as_ref() {
            queue.purge();
        }
    }

    /// Tear down the current lifecycle: stop the sink, stop the read-ahead
    /// worker if it's running, detach the test-card producer, run the `post`
    /// hook, and clear the push slot so a stale frame can't survive into the
    /// next `start`.
    pub fn stop(&self) {
        self.sink.stop();

        if self.ahead.load(Ordering::SeqCst) {
            self.read_ahead_stop();
        }

        *self.test_card_producer.lock().unwrap() = None;

        let post = self.properties.lock().unwrap().post.clone();
        if let Some(cmd) = post {
            run_shell_hook(&cmd);
        }

        self.push_slot.clear_and_notify();
        self.properties.lock().unwrap().running = false;
    }

    fn read_ahead_stop(&self) {
        self.ahead.store(false, Ordering::SeqCst);
        if let Some(queue) = self.queue.lock().unwrap().as_ref() {
            queue.notify_all();
        }
        self.push_slot.notify_all();
        if let Some(worker) = self.worker.lock().unwrap().take() {
            worker.join();
        }
        if let Some(queue) = self.queue.lock().unwrap().take() {
            queue.drain();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.sink.is_stopped()
    }

    /// Invoked by the sink from its own thread when presentation ends on its
    /// own (end of stream, render error). Fires `consumer-stopped` exactly
    /// once per lifecycle even if called more than once.
    pub fn stopped(&self) {
        self.properties.lock().unwrap().running = false;
        self.events.fire_stopped_once();
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.push_slot.clear_and_notify();
        self.sink.close();
    }
}

/// Runs an `ante`/`post` hook as a shell command. The exit status isn't
/// surfaced anywhere; a failing hook doesn't block start/stop.
fn run_shell_hook(command: &str) {
    eprintln!("[consumer] running hook: {command}");
    if let Err(err) = std::process::Command::new("sh").arg("-c").arg(command).status() {
        eprintln!("[consumer] hook failed to spawn: {err}");
    }
}
