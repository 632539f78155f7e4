//! Recognition pipeline
//!
//! Frames flow producer → [`FrameScheduler`] → [`RecognitionDispatcher`] →
//! [`CompletionSink`]. The scheduler keeps one recognition in flight and only
//! the latest waiting frame; the dispatcher owns each frame until it is released.

pub mod dispatcher;
pub mod scheduler;

pub use dispatcher::{CompletionSink, DispatchOutcome, Recognition, RecognitionDispatcher};
pub use scheduler::{Admission, FrameScheduler, PipelineState, SchedulerStats};
