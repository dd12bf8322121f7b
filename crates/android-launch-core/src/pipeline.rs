//! Interface to the external media pipeline.
//!
//! The pipeline is opaque: the bridge creates it, forwards commands and
//! settings, hands it a render target and receives its events. Everything
//! about decoding and transport lives behind [`Pipeline`].

use std::sync::Arc;

use crate::error::BridgeResult;
use crate::surface::NativeWindowRef;

/// Receiver of pipeline events. Called on the pipeline's worker threads.
pub trait PipelineEvents: Send + Sync {
    fn on_message(&self, message: &str);
    /// `code` is pipeline-defined and passed through unexamined.
    fn on_error(&self, message: &str, code: i32);
    fn on_position(&self, position: i32, duration: i32);
    fn on_size_changed(&self, width: i32, height: i32);
    fn on_ready(&self);
    fn on_loaded(&self);
}

/// One pipeline event, for pipelines that queue events before delivering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Message(String),
    Error { message: String, code: i32 },
    Position { position: i32, duration: i32 },
    SizeChanged { width: i32, height: i32 },
    Ready,
    Loaded,
}

impl PipelineEvent {
    pub fn deliver(&self, events: &dyn PipelineEvents) {
        match self {
            PipelineEvent::Message(message) => events.on_message(message),
            PipelineEvent::Error { message, code } => events.on_error(message, *code),
            PipelineEvent::Position { position, duration } => {
                events.on_position(*position, *duration)
            }
            PipelineEvent::SizeChanged { width, height } => {
                events.on_size_changed(*width, *height)
            }
            PipelineEvent::Ready => events.on_ready(),
            PipelineEvent::Loaded => events.on_loaded(),
        }
    }
}

/// A setting forwarded to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineProperty<'a> {
    Uri(&'a str),
    Username(&'a str),
    Password(&'a str),
    TcpTimeout(i32),
}

impl PipelineProperty<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineProperty::Uri(_) => "uri",
            PipelineProperty::Username(_) => "username",
            PipelineProperty::Password(_) => "password",
            PipelineProperty::TcpTimeout(_) => "tcp-timeout",
        }
    }
}

/// A decoded frame pulled from the pipeline's sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Caps of the frame, as a string.
    pub caps: String,
    pub data: Vec<u8>,
}

/// A live pipeline instance, exclusively owned by one bridge.
pub trait Pipeline: Send + 'static {
    /// Render target type the pipeline accepts.
    type Window: NativeWindowRef;

    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);

    /// Points the pipeline at a native window. `0` clears it.
    fn set_window_handle(&mut self, handle: usize);

    fn set_property(&mut self, property: PipelineProperty<'_>);

    /// Current decoded frame, if the sink holds one.
    fn current_sample(&mut self) -> Option<Sample>;

    /// Tears the pipeline down.
    ///
    /// Must not return while any event callback is still running, and no
    /// callback may start afterwards.
    fn destroy(self)
    where
        Self: Sized;
}

/// Builds pipelines wired to an event receiver.
pub trait PipelineFactory {
    type Pipeline: Pipeline;

    fn create(&self, events: Arc<dyn PipelineEvents>) -> BridgeResult<Self::Pipeline>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl PipelineEvents for Collect {
        fn on_message(&self, message: &str) {
            self.0.lock().push(format!("message:{message}"));
        }
        fn on_error(&self, message: &str, code: i32) {
            self.0.lock().push(format!("error:{message}:{code}"));
        }
        fn on_position(&self, position: i32, duration: i32) {
            self.0.lock().push(format!("position:{position}/{duration}"));
        }
        fn on_size_changed(&self, width: i32, height: i32) {
            self.0.lock().push(format!("size:{width}x{height}"));
        }
        fn on_ready(&self) {
            self.0.lock().push("ready".into());
        }
        fn on_loaded(&self) {
            self.0.lock().push("loaded".into());
        }
    }

    #[test]
    fn events_deliver_to_matching_callbacks() {
        let sink = Collect::default();
        for event in [
            PipelineEvent::Message("State changed to PLAYING".into()),
            PipelineEvent::Error { message: "connection refused".into(), code: 7 },
            PipelineEvent::Position { position: 1500, duration: -1 },
            PipelineEvent::SizeChanged { width: 1280, height: 720 },
            PipelineEvent::Ready,
            PipelineEvent::Loaded,
        ] {
            event.deliver(&sink);
        }
        assert_eq!(
            *sink.0.lock(),
            vec![
                "message:State changed to PLAYING",
                "error:connection refused:7",
                "position:1500/-1",
                "size:1280x720",
                "ready",
                "loaded",
            ]
        );
    }

    #[test]
    fn property_names() {
        assert_eq!(PipelineProperty::Uri("rtsp://a").name(), "uri");
        assert_eq!(PipelineProperty::TcpTimeout(5).name(), "tcp-timeout");
    }
}
