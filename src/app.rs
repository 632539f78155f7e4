//! Application Coordinator
//!
//! Wires the camera feed, the frame scheduler and the rate service together
//! and runs the UI loop. Every mutation of the conversion session happens on
//! the thread that calls [`PriceLensApp::run`]; recognitions, rate responses
//! and user commands reach it as [`UiEvent`]s over one channel.

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::capture::CameraFeed;
use crate::config::AppConfig;
use crate::controls::{spawn_stdin_controls, ControlCommand};
use crate::pipeline::{FrameScheduler, PipelineState, Recognition, RecognitionDispatcher};
use crate::rates::RateProvider;
use crate::shared::{ConversionSession, CurrencyPair, RateRequest, UiEvent};
use crate::vision::TextRecognizer;

/// Main application coordinator
pub struct PriceLensApp {
    config: AppConfig,
    /// Conversion state, owned by the UI loop
    session: ConversionSession,
    scheduler: Arc<FrameScheduler>,
    rates: Arc<dyn RateProvider>,
    /// Runtime rate fetches run on
    runtime: Runtime,
    events_tx: Sender<UiEvent>,
    events_rx: Receiver<UiEvent>,
    feed: Option<CameraFeed>,
    controls_handle: Option<JoinHandle<()>>,
}

impl PriceLensApp {
    /// Create a new application coordinator
    pub fn new(
        config: AppConfig,
        recognizer: Arc<dyn TextRecognizer>,
        rates: Arc<dyn RateProvider>,
    ) -> Result<Self> {
        let (events_tx, events_rx) = unbounded();

        let sink_tx = events_tx.clone();
        let sink = move |recognition: Recognition| {
            let _ = sink_tx.send(UiEvent::AmountRecognized(recognition));
        };
        let dispatcher = RecognitionDispatcher::new(recognizer, Arc::new(sink));
        let scheduler = Arc::new(FrameScheduler::new(dispatcher));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("rate-fetch")
            .enable_all()
            .build()
            .context("Failed to create rate runtime")?;

        let session = ConversionSession::new(
            CurrencyPair::new(config.currency.from.clone(), config.currency.to.clone()),
            config.currency.supported.clone(),
        );

        Ok(Self {
            config,
            session,
            scheduler,
            rates,
            runtime,
            events_tx,
            events_rx,
            feed: None,
            controls_handle: None,
        })
    }

    /// Scheduler frames are offered to
    #[cfg(test)]
    pub fn scheduler(&self) -> Arc<FrameScheduler> {
        self.scheduler.clone()
    }

    /// Current conversion state
    pub fn session(&self) -> &ConversionSession {
        &self.session
    }

    /// Start the pipeline, the camera feed and the control thread
    pub fn start(&mut self) -> Result<()> {
        self.scheduler.start()?;

        match self.config.capture.to_capture_config() {
            Some(capture) => {
                let scheduler = self.scheduler.clone();
                let feed = CameraFeed::start(capture, move |frame| {
                    scheduler.offer(frame);
                })?;
                self.feed = Some(feed);
            }
            None => warn!("No frames directory configured, camera feed disabled"),
        }

        self.controls_handle = Some(spawn_stdin_controls(self.events_tx.clone())?);

        let request = self.session.refresh();
        self.fetch_rates(request);

        info!("Pipeline started, converting {}", self.session.pair());
        Ok(())
    }

    /// Run the UI loop until quit or end of control input
    pub fn run(&mut self) -> Result<()> {
        while let Ok(event) = self.events_rx.recv() {
            if !self.handle_event(event) {
                break;
            }
        }
        self.shutdown();
        Ok(())
    }

    /// Apply one event. Returns false when the loop should stop.
    fn handle_event(&mut self, event: UiEvent) -> bool {
        match event {
            UiEvent::AmountRecognized(recognition) => {
                debug!("Frame {} read {:?}", recognition.frame_id, recognition.digits);
                if let Some(request) = self.session.on_amount(recognition.amount) {
                    self.fetch_rates(request);
                }
            }
            UiEvent::Control(command) => return self.handle_command(command),
            UiEvent::RatesFetched(request, rates) => {
                if self.session.on_rates(&request, &rates) {
                    if let Some(line) = self.session.display() {
                        info!("{}", line);
                        println!("{}", line);
                    }
                }
            }
            UiEvent::RateFetchFailed(request, error) => {
                self.session.on_rate_failure(&request, &error);
            }
            UiEvent::Shutdown => {
                info!("Control input closed");
                return false;
            }
        }
        true
    }

    fn handle_command(&mut self, command: ControlCommand) -> bool {
        match command {
            ControlCommand::Pause => {
                self.scheduler.pause();
                self.session.set_paused(true);
            }
            ControlCommand::Resume => {
                self.scheduler.resume();
                self.session.set_paused(false);
            }
            ControlCommand::TogglePause => {
                let state = self.scheduler.toggle_pause();
                self.session.set_paused(state == PipelineState::Paused);
            }
            ControlCommand::Swap => {
                let request = self.session.swap();
                self.fetch_rates(request);
            }
            ControlCommand::From(code) => match self.session.select_from(&code) {
                Ok(request) => self.fetch_rates(request),
                Err(e) => warn!("{}", e),
            },
            ControlCommand::To(code) => match self.session.select_to(&code) {
                Ok(request) => self.fetch_rates(request),
                Err(e) => warn!("{}", e),
            },
            ControlCommand::Status => {
                let stats = self.scheduler.stats();
                println!("{}", self.session.status());
                println!(
                    "frames: {} delivered, {} dispatched, {} replaced, {} dropped while paused, {} rejected",
                    stats.delivered, stats.dispatched, stats.replaced, stats.dropped_paused, stats.rejected
                );
            }
            ControlCommand::Quit => return false,
        }
        true
    }

    /// Fetch rates off the UI loop; the result comes back as an event
    fn fetch_rates(&self, request: RateRequest) {
        let rates = self.rates.clone();
        let events = self.events_tx.clone();

        self.runtime.spawn(async move {
            let result = rates.fetch(&request.pair.from).await;
            let event = match result {
                Ok(fetched) => UiEvent::RatesFetched(request, fetched),
                Err(e) => UiEvent::RateFetchFailed(request, e.to_string()),
            };
            let _ = events.send(event);
        });
    }

    /// Stop the feed and the pipeline. In-flight work is not awaited.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();

        if let Some(mut feed) = self.feed.take() {
            feed.stop();
        }

        // The control thread blocks on stdin and exits with the process
        if let Some(handle) = self.controls_handle.take() {
            if !handle.is_finished() {
                debug!("Leaving control input thread detached");
            }
        }
    }
}

impl Drop for PriceLensApp {
    fn drop(&mut self) {
        self.shutdown();
    }
}
