//! Host-side test doubles: a recording managed runtime, a threaded pipeline
//! and native windows that journal their release.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use android_launch_core::{
    AbiVersion, Bridge, BridgeConfig, BridgeContext, BridgeError, BridgeResult, DurableRef,
    ManagedRuntime, NativeWindowRef, OwnerSlot, Pipeline, PipelineEvent, PipelineEvents,
    PipelineFactory, PipelineProperty, RawHandle, Sample, Upcall, UpcallArg,
};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

pub type TestBridge = Bridge<MockPipeline, MockRuntime>;

/// Ordered record of everything the pipeline, windows and owners saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Play,
    Pause,
    Stop,
    Property(&'static str, String),
    WindowSet(usize),
    WindowReleased(usize),
    Destroyed,
    OwnerReleased(u32),
}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Entry>>>);

impl Journal {
    pub fn push(&self, entry: Entry) {
        self.0.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.0.lock().clone()
    }

    pub fn position(&self, entry: &Entry) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &Entry) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

// =========================================================================
// Managed runtime
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockEnv {
    pub thread: ThreadId,
}

pub struct MockObject {
    pub id: u32,
    journal: Journal,
}

impl Drop for MockObject {
    fn drop(&mut self) {
        self.journal.push(Entry::OwnerReleased(self.id));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Str(String),
    Int(i32),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub env_thread: ThreadId,
    pub calling_thread: ThreadId,
    pub owner: u32,
    pub method: &'static str,
    pub args: Vec<Arg>,
}

#[derive(Default)]
pub struct MockRuntime {
    pub attached: Mutex<Vec<ThreadId>>,
    pub detached: Mutex<Vec<ThreadId>>,
    pub calls: Mutex<Vec<Call>>,
    pub refuse_attach: AtomicBool,
    fault_on: Mutex<Option<&'static str>>,
    pending_faults: Mutex<HashSet<ThreadId>>,
    on_call: Mutex<Option<Box<dyn Fn(&'static str) + Send>>>,
}

impl MockRuntime {
    /// Makes every call to `method` raise a managed fault.
    pub fn fail_calls_to(&self, method: Option<&'static str>) {
        *self.fault_on.lock() = method;
    }

    /// Runs `hook` inside every upcall, the way an owner reacts to a
    /// callback by issuing commands.
    pub fn set_on_call(&self, hook: impl Fn(&'static str) + Send + 'static) {
        *self.on_call.lock() = Some(Box::new(hook));
    }

    pub fn calls_to(&self, method: &str) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }
}

impl ManagedRuntime for MockRuntime {
    type Env = MockEnv;
    type Object = MockObject;
    type Method = &'static str;

    fn attach_current_thread(&self, version: AbiVersion) -> Result<MockEnv, BridgeError> {
        assert_eq!(version, AbiVersion::V1_4);
        if self.refuse_attach.load(Ordering::SeqCst) {
            return Err(BridgeError::AttachFailed("JNI_ERR".into()));
        }
        let thread = thread::current().id();
        self.attached.lock().push(thread);
        Ok(MockEnv { thread })
    }

    fn detach_current_thread(&self, env: &MockEnv) {
        self.detached.lock().push(env.thread);
    }

    fn call_void(
        &self,
        env: &MockEnv,
        target: &MockObject,
        method: &'static str,
        args: &[UpcallArg<'_>],
    ) -> Result<(), BridgeError> {
        self.calls.lock().push(Call {
            env_thread: env.thread,
            calling_thread: thread::current().id(),
            owner: target.id,
            method,
            args: args
                .iter()
                .map(|arg| match arg {
                    UpcallArg::Str(s) => Arg::Str((*s).to_string()),
                    UpcallArg::Int(i) => Arg::Int(*i),
                })
                .collect(),
        });
        if let Some(hook) = self.on_call.lock().as_ref() {
            hook(method);
        }
        if *self.fault_on.lock() == Some(method) {
            self.pending_faults.lock().insert(env.thread);
            return Err(BridgeError::ManagedCall("java.lang.IllegalStateException".into()));
        }
        Ok(())
    }

    fn clear_pending_fault(&self, env: &MockEnv) -> bool {
        self.pending_faults.lock().remove(&env.thread)
    }
}

/// Method lookup that knows every upcall.
pub fn lookup_all(name: &str, _signature: &str) -> Option<&'static str> {
    Upcall::ALL.iter().map(|u| u.name()).find(|n| *n == name)
}

// =========================================================================
// Pipeline
// =========================================================================

enum Command {
    Emit(PipelineEvent, Sender<()>),
    Shutdown,
}

/// Test-side handle for pushing events through a pipeline's worker thread.
#[derive(Clone)]
pub struct Emitter {
    tx: Sender<Command>,
    pub worker: ThreadId,
}

impl Emitter {
    /// Delivers `event` on the worker and waits until the callback returned.
    /// `false` once the pipeline is destroyed.
    pub fn emit(&self, event: PipelineEvent) -> bool {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(Command::Emit(event, ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv().is_ok()
    }
}

pub struct MockPipeline {
    journal: Journal,
    tx: Sender<Command>,
    worker: Option<JoinHandle<()>>,
    sample: Option<Sample>,
    events: Arc<dyn PipelineEvents>,
    ready_on_play: bool,
}

fn run_worker(rx: Receiver<Command>, events: Arc<dyn PipelineEvents>) {
    for command in rx {
        match command {
            Command::Emit(event, ack) => {
                event.deliver(events.as_ref());
                let _ = ack.send(());
            }
            Command::Shutdown => break,
        }
    }
}

impl Pipeline for MockPipeline {
    type Window = MockWindow;

    fn play(&mut self) {
        self.journal.push(Entry::Play);
        if self.ready_on_play {
            self.events.on_ready();
        }
    }

    fn pause(&mut self) {
        self.journal.push(Entry::Pause);
    }

    fn stop(&mut self) {
        self.journal.push(Entry::Stop);
    }

    fn set_window_handle(&mut self, handle: usize) {
        self.journal.push(Entry::WindowSet(handle));
    }

    fn set_property(&mut self, property: PipelineProperty<'_>) {
        let value = match property {
            PipelineProperty::Uri(v) | PipelineProperty::Username(v) | PipelineProperty::Password(v) => {
                v.to_string()
            }
            PipelineProperty::TcpTimeout(t) => t.to_string(),
        };
        self.journal.push(Entry::Property(property.name(), value));
    }

    fn current_sample(&mut self) -> Option<Sample> {
        self.sample.clone()
    }

    fn destroy(mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            worker.join().expect("pipeline worker panicked");
        }
        self.journal.push(Entry::Destroyed);
    }
}

#[derive(Default)]
pub struct MockFactory {
    pub journal: Journal,
    pub fail: AtomicBool,
    pub sample: Mutex<Option<Sample>>,
    /// Pipelines report ready from inside `play`, on the calling thread.
    pub ready_on_play: AtomicBool,
    emitters: Mutex<Vec<Emitter>>,
}

impl MockFactory {
    pub fn last_emitter(&self) -> Emitter {
        self.emitters.lock().last().cloned().expect("no pipeline created")
    }

    pub fn created(&self) -> usize {
        self.emitters.lock().len()
    }

    /// Durable reference to a fresh owner that journals its release.
    pub fn owner(&self, id: u32) -> DurableRef<MockObject> {
        DurableRef::new(MockObject {
            id,
            journal: self.journal.clone(),
        })
    }

    pub fn window(&self, id: usize) -> MockWindow {
        MockWindow {
            id,
            journal: self.journal.clone(),
        }
    }
}

impl PipelineFactory for MockFactory {
    type Pipeline = MockPipeline;

    fn create(&self, events: Arc<dyn PipelineEvents>) -> BridgeResult<MockPipeline> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BridgeError::Pipeline("gst_parse_launch failed".into()));
        }
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = thread::Builder::new()
            .name("mock-pipeline".into())
            .spawn({
                let events = Arc::clone(&events);
                move || run_worker(rx, events)
            })
            .expect("spawn pipeline worker");
        self.emitters.lock().push(Emitter {
            tx: tx.clone(),
            worker: worker.thread().id(),
        });
        Ok(MockPipeline {
            journal: self.journal.clone(),
            tx,
            worker: Some(worker),
            sample: self.sample.lock().clone(),
            events,
            ready_on_play: self.ready_on_play.load(Ordering::SeqCst),
        })
    }
}

// =========================================================================
// Windows and owner storage
// =========================================================================

pub struct MockWindow {
    pub id: usize,
    journal: Journal,
}

impl NativeWindowRef for MockWindow {
    fn raw_handle(&self) -> usize {
        self.id
    }
}

impl Drop for MockWindow {
    fn drop(&mut self) {
        self.journal.push(Entry::WindowReleased(self.id));
    }
}

/// The owner's `long` handle field.
#[derive(Debug, Default)]
pub struct TestSlot(pub RawHandle);

impl OwnerSlot for TestSlot {
    fn load(&mut self) -> BridgeResult<RawHandle> {
        Ok(self.0)
    }

    fn store(&mut self, handle: RawHandle) -> BridgeResult<()> {
        self.0 = handle;
        Ok(())
    }
}

// =========================================================================
// Fixture
// =========================================================================

pub struct Fixture {
    pub runtime: Arc<MockRuntime>,
    pub context: Arc<BridgeContext<MockRuntime>>,
    pub factory: MockFactory,
    pub slot: TestSlot,
}

impl Fixture {
    /// Context with class init done; no bridge yet.
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        let runtime = Arc::new(MockRuntime::default());
        let context = BridgeContext::new(Arc::clone(&runtime), config);
        context.class_init(lookup_all).expect("class init");
        Self {
            runtime,
            context,
            factory: MockFactory::default(),
            slot: TestSlot::default(),
        }
    }

    pub fn owner(&self, id: u32) -> DurableRef<MockObject> {
        self.factory.owner(id)
    }

    pub fn init(&mut self, owner_id: u32) {
        let owner = self.owner(owner_id);
        TestBridge::init(&self.context, &self.factory, owner, &mut self.slot).expect("init");
    }

    pub fn journal(&self) -> &Journal {
        &self.factory.journal
    }
}
