//! Recognition dispatch
//!
//! One call to [`RecognitionDispatcher::submit`] takes ownership of a frame,
//! runs it through encode → recognize → focus band → digits, hands the
//! result to the completion sink and releases the frame. The frame is
//! released on every exit path, including when the future is dropped.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::capture::frame::Frame;
use crate::vision::extract::{extract, filter_digits, NumericAmount};
use crate::vision::region::region_of_reference;
use crate::vision::{codec, RecognizerInput, Rotation, TextRecognizer};

/// Amount recognized from one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    /// Frame the amount was read from
    pub frame_id: u64,
    /// Text of the lines inside the focus band, newline-terminated
    pub text: String,
    /// Digits kept from `text`
    pub digits: String,
    /// Parsed amount, zero when `digits` did not parse
    pub amount: NumericAmount,
}

/// Receiver of completed recognitions.
///
/// The platform layer binds this to its own event loop; the dispatcher calls
/// it from whatever thread the recognition completed on.
pub trait CompletionSink: Send + Sync {
    fn deliver(&self, recognition: Recognition);
}

impl<F> CompletionSink for F
where
    F: Fn(Recognition) + Send + Sync,
{
    fn deliver(&self, recognition: Recognition) {
        self(recognition)
    }
}

/// How a dispatched frame ended
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Result handed to the completion sink
    Delivered(Recognition),
    /// Recognized after shutdown; result dropped
    Discarded(Recognition),
    /// Frame could not be converted (bad planes, rotation, codec)
    Malformed,
    /// Recognition service failed
    Failed,
}

/// Submits frames to the recognition service and routes the results
pub struct RecognitionDispatcher {
    recognizer: Arc<dyn TextRecognizer>,
    sink: Arc<dyn CompletionSink>,
    cancel: CancellationToken,
}

impl RecognitionDispatcher {
    /// Create a dispatcher delivering into `sink`
    pub fn new(recognizer: Arc<dyn TextRecognizer>, sink: Arc<dyn CompletionSink>) -> Self {
        Self {
            recognizer,
            sink,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that, once cancelled, makes every later completion discard its result
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Process one frame to completion, then release it
    pub async fn submit(&self, frame: Frame) -> DispatchOutcome {
        let outcome = self.process(&frame).await;
        frame.release();
        outcome
    }

    async fn process(&self, frame: &Frame) -> DispatchOutcome {
        let frame_id = frame.id();

        let rotation = match Rotation::from_degrees(frame.rotation_degrees()) {
            Ok(rotation) => rotation,
            Err(e) => {
                warn!("Dropping frame {}: {}", frame_id, e);
                return DispatchOutcome::Malformed;
            }
        };

        let image = match codec::encode(frame) {
            Ok(image) => image,
            Err(e) => {
                warn!("Dropping frame {}: {}", frame_id, e);
                return DispatchOutcome::Malformed;
            }
        };

        // Bitmap export runs beside recognition
        let bitmap_source = image.clone();
        let bitmap_task = tokio::task::spawn_blocking(move || codec::decode(&bitmap_source));
        let input = RecognizerInput {
            frame_id,
            image,
            rotation,
        };
        let (recognized, bitmap) = tokio::join!(self.recognizer.recognize(input), bitmap_task);

        let recognized = match recognized {
            Ok(text) => text,
            Err(e) => {
                warn!("Text recognition failed for frame {}: {}", frame_id, e);
                return DispatchOutcome::Failed;
            }
        };

        let bitmap = match bitmap {
            Ok(Ok(bitmap)) => bitmap,
            Ok(Err(e)) => {
                warn!("Bitmap export failed for frame {}: {}", frame_id, e);
                return DispatchOutcome::Malformed;
            }
            Err(e) => {
                warn!("Bitmap export task for frame {} did not finish: {}", frame_id, e);
                return DispatchOutcome::Malformed;
            }
        };

        let region = region_of_reference(bitmap.width(), bitmap.height());
        let text = extract(&recognized, &region);
        let digits = filter_digits(&text);
        debug!(
            "Numbers from OCR (frame {}, {:?} after capture): {:?}",
            frame_id,
            frame.timestamp().elapsed(),
            digits
        );

        let recognition = Recognition {
            frame_id,
            amount: NumericAmount::from_digits_or_zero(&digits),
            text,
            digits,
        };

        if self.cancel.is_cancelled() {
            debug!("Pipeline shut down, discarding result of frame {}", frame_id);
            return DispatchOutcome::Discarded(recognition);
        }

        self.sink.deliver(recognition.clone());
        DispatchOutcome::Delivered(recognition)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::capture::frame::tests::counted_frame;
    use crate::capture::frame::Plane;
    use crate::error::RecognitionError;
    use crate::vision::{Rect, RecognizedText, TextBlock, TextLine};
    use async_trait::async_trait;
    use crossbeam_channel::{unbounded, Receiver};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Recognizer returning a fixed answer and recording what it was asked
    pub(crate) struct ScriptedRecognizer {
        pub answer: Result<RecognizedText, String>,
        pub seen: Mutex<Vec<(u64, u32)>>,
    }

    impl ScriptedRecognizer {
        pub(crate) fn ok(text: RecognizedText) -> Self {
            Self {
                answer: Ok(text),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                answer: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextRecognizer for ScriptedRecognizer {
        async fn recognize(&self, input: RecognizerInput) -> Result<RecognizedText, RecognitionError> {
            self.seen.lock().push((input.frame_id, input.rotation.degrees()));
            self.answer.clone().map_err(RecognitionError::Service)
        }
    }

    pub(crate) fn line(text: &str, bounds: Rect) -> TextLine {
        TextLine {
            text: text.to_string(),
            bounding_box: Some(bounds),
        }
    }

    /// Dispatcher wired to a channel sink
    pub(crate) fn channel_dispatcher(
        recognizer: Arc<dyn TextRecognizer>,
    ) -> (RecognitionDispatcher, Receiver<Recognition>) {
        let (tx, rx) = unbounded();
        let sink = move |recognition: Recognition| {
            let _ = tx.send(recognition);
        };
        (RecognitionDispatcher::new(recognizer, Arc::new(sink)), rx)
    }

    #[tokio::test]
    async fn test_submit_filters_lines_by_focus_band() {
        // 100x200 frame: focus band is (10, 100) - (90, 170)
        let text = RecognizedText {
            blocks: vec![TextBlock {
                lines: vec![
                    line("Menu 11", Rect::new(20, 20, 80, 40)),
                    line("Latte 95", Rect::new(20, 120, 80, 140)),
                    line("Tip 3", Rect::new(20, 180, 80, 195)),
                ],
            }],
        };
        let recognizer = Arc::new(ScriptedRecognizer::ok(text));
        let (dispatcher, rx) = channel_dispatcher(recognizer.clone());
        let released = Arc::new(AtomicUsize::new(0));

        let outcome = dispatcher.submit(counted_frame(3, 100, 200, &released)).await;

        let delivered = rx.try_recv().unwrap();
        assert_eq!(delivered.frame_id, 3);
        assert_eq!(delivered.text, "Latte 95\n");
        assert_eq!(delivered.digits, "95");
        assert_eq!(delivered.amount.value(), 95.0);
        assert_eq!(outcome, DispatchOutcome::Delivered(delivered));
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(*recognizer.seen.lock(), vec![(3, 0)]);
    }

    #[tokio::test]
    async fn test_submit_without_digits_delivers_zero() {
        let text = RecognizedText {
            blocks: vec![TextBlock {
                lines: vec![line("FREE", Rect::new(20, 120, 80, 140))],
            }],
        };
        let (dispatcher, rx) = channel_dispatcher(Arc::new(ScriptedRecognizer::ok(text)));
        let released = Arc::new(AtomicUsize::new(0));

        dispatcher.submit(counted_frame(1, 100, 200, &released)).await;

        let delivered = rx.try_recv().unwrap();
        assert_eq!(delivered.digits, "");
        assert_eq!(delivered.amount, NumericAmount::ZERO);
    }

    #[tokio::test]
    async fn test_submit_recognition_failure_releases_without_delivery() {
        let (dispatcher, rx) = channel_dispatcher(Arc::new(ScriptedRecognizer::failing("timeout")));
        let released = Arc::new(AtomicUsize::new(0));

        let outcome = dispatcher.submit(counted_frame(1, 32, 32, &released)).await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert!(rx.try_recv().is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_bad_rotation_is_malformed() {
        let recognizer = Arc::new(ScriptedRecognizer::ok(RecognizedText::default()));
        let (dispatcher, rx) = channel_dispatcher(recognizer.clone());
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let image = image::RgbImage::new(8, 8);
        let frame = Frame::from_rgb(9, &image, 45).with_release(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = dispatcher.submit(frame).await;

        assert_eq!(outcome, DispatchOutcome::Malformed);
        assert!(recognizer.seen.lock().is_empty());
        assert!(rx.try_recv().is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_short_plane_is_malformed() {
        let recognizer = Arc::new(ScriptedRecognizer::ok(RecognizedText::default()));
        let (dispatcher, _rx) = channel_dispatcher(recognizer.clone());
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let frame = Frame::new(
            4,
            16,
            16,
            0,
            Plane::new(vec![0; 16], 16, 1),
            Plane::new(vec![0; 64], 8, 1),
            Plane::new(vec![0; 64], 8, 1),
        )
        .with_release(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(dispatcher.submit(frame).await, DispatchOutcome::Malformed);
        assert!(recognizer.seen.lock().is_empty());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_after_cancel_discards_but_releases() {
        let text = RecognizedText {
            blocks: vec![TextBlock {
                lines: vec![line("7", Rect::new(20, 120, 80, 140))],
            }],
        };
        let (dispatcher, rx) = channel_dispatcher(Arc::new(ScriptedRecognizer::ok(text)));
        let released = Arc::new(AtomicUsize::new(0));

        dispatcher.cancellation_token().cancel();
        let outcome = dispatcher.submit(counted_frame(2, 100, 200, &released)).await;

        assert!(matches!(outcome, DispatchOutcome::Discarded(ref r) if r.digits == "7"));
        assert!(rx.try_recv().is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
