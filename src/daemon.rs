//! Daemon - the assistant's app loop
//!
//! Speaks the welcome prompt, keeps the voice command router listening for
//! the whole lifetime and starts or tears down the screen pipelines as
//! commands switch screens.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::app::{Screen, ScreenRouter};
use crate::db::DbPool;
use crate::detection::{DetectionPipeline, Detector, FrameSource};
use crate::navigation::{
    DirectionsProvider, Geocoder, LocationSource, NavigationSession, NavigationSnapshot,
    SessionInput, messages,
};
use crate::permissions::{Permission, PermissionAction, PermissionState, ensure_granted};
use crate::preferences::UserConfigStore;
use crate::speech::{SpeechQueue, SpeechRecognizer, SpeechSynthesizer, tags};
use crate::voice::{BackoffPolicy, ListenMode, RouterEvent, RouterSettings, VoiceCommandRouter};
use crate::{Config, Result};

/// First-launch welcome
pub const WELCOME_FIRST_LAUNCH: &str =
    "Welcome to Sense8. Would you like to start 'navigation' or 'object detection'?";

/// Welcome on later launches
pub const WELCOME_BACK: &str = "Welcome back. Say 'navigation' or 'object detection'.";

/// Spoken when no detector is configured
pub const DETECTION_UNAVAILABLE: &str = "Object detection is unavailable.";

/// Spoken when the maps backends are not configured
pub const NAVIGATION_UNAVAILABLE: &str = "Navigation is unavailable.";

/// Router event buffer
const EVENT_BUFFER: usize = 16;

/// Session input buffer
const SESSION_BUFFER: usize = 32;

/// Platform collaborators the daemon drives
///
/// Optional backends that are missing make their screen report itself
/// unavailable instead of failing startup.
pub struct Backends {
    pub recognizer: Box<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub detector: Option<Arc<dyn Detector>>,
    pub frames: Option<Arc<dyn FrameSource>>,
    pub location: Option<Arc<dyn LocationSource>>,
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub directions: Option<Arc<dyn DirectionsProvider>>,
}

/// Pipelines owned by the screen being shown
enum ActiveScreen {
    Idle,
    Detection(DetectionPipeline),
    Navigation(NavigationPipeline),
}

struct NavigationPipeline {
    inputs: mpsc::Sender<SessionInput>,
    session: JoinHandle<NavigationSnapshot>,
    location: Option<JoinHandle<()>>,
    forward: Option<JoinHandle<()>>,
    snapshot: watch::Receiver<NavigationSnapshot>,
}

impl NavigationPipeline {
    fn teardown(self) {
        if let Some(location) = self.location {
            location.abort();
        }
        if let Some(forward) = self.forward {
            forward.abort();
        }
        self.session.abort();
        tracing::info!(
            step = self.snapshot.borrow().current_step_index,
            "navigation pipeline stopped"
        );
    }
}

/// The Sense8 daemon
pub struct Daemon {
    config: Config,
    preferences: UserConfigStore,
    backends: Backends,
    screen: watch::Sender<Screen>,
}

impl Daemon {
    /// Create a daemon over an initialized database
    ///
    /// # Errors
    ///
    /// Returns error if the preference store cannot be read
    pub fn new(config: Config, db: DbPool, backends: Backends) -> Result<Self> {
        let preferences = UserConfigStore::new(db)?;
        let (screen, _rx) = watch::channel(Screen::Waiting);
        Ok(Self {
            config,
            preferences,
            backends,
            screen,
        })
    }

    /// Observe screen changes
    #[must_use]
    pub fn subscribe_screen(&self) -> watch::Receiver<Screen> {
        self.screen.subscribe()
    }

    /// Run until `shutdown` turns true
    ///
    /// # Errors
    ///
    /// Never fails once started; the signature leaves room for fatal
    /// backend errors.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let Self {
            config,
            preferences,
            backends,
            screen,
        } = self;
        let Backends {
            recognizer,
            synthesizer,
            detector,
            frames,
            location,
            geocoder,
            directions,
        } = backends;

        let (speech, speech_task) = SpeechQueue::spawn(synthesizer);

        if preferences.read_user_config() {
            speech.flush(WELCOME_BACK, tags::WELCOME);
        } else {
            speech.flush(WELCOME_FIRST_LAUNCH, tags::WELCOME);
            if let Err(e) = preferences.write_user_config() {
                tracing::warn!(error = %e, "failed to record first launch");
            }
        }

        let (mode_tx, mode_rx) = watch::channel(ListenMode::Commands);
        let (events_tx, mut events) = mpsc::channel(EVENT_BUFFER);
        let settings = RouterSettings {
            reprompt_delay: Duration::from_millis(config.voice.reprompt_delay_ms),
            backoff: BackoffPolicy::default(),
        };
        let router = tokio::spawn(
            VoiceCommandRouter::new(recognizer, speech.clone(), settings, mode_rx, events_tx)
                .run(shutdown.clone()),
        );

        let launcher = Launcher {
            config,
            speech: speech.clone(),
            detector,
            frames,
            location,
            geocoder,
            directions,
        };
        let mut screens = ScreenRouter::new();
        let mut active = ActiveScreen::Idle;
        tracing::info!("sense8 running");

        loop {
            let event = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("shutdown requested");
                        break;
                    }
                    continue;
                }
                event = events.recv() => event,
            };
            let Some(event) = event else {
                tracing::warn!("voice command router ended");
                break;
            };

            match event {
                RouterEvent::Command(command) => {
                    let Some(next) = ScreenRouter::target(&command) else {
                        continue;
                    };
                    if screens.enter(next) {
                        teardown(std::mem::replace(&mut active, ActiveScreen::Idle)).await;
                        screen.send_replace(next);
                        mode_tx.send_replace(ListenMode::Commands);
                    } else if !matches!(active, ActiveScreen::Idle) {
                        tracing::debug!(screen = %next, "screen already running");
                        continue;
                    }
                    // Entering again retries a screen whose permission or
                    // backend was missing
                    active = launcher.start(next, &mode_tx);
                }
                RouterEvent::Utterance(text) => {
                    if let ActiveScreen::Navigation(nav) = &active {
                        if nav.inputs.send(SessionInput::Destination(text)).await.is_err() {
                            tracing::warn!("navigation session ended");
                        }
                    } else {
                        tracing::debug!(utterance = %text, "utterance outside navigation ignored");
                    }
                }
                RouterEvent::Unrecognized(text) => {
                    tracing::debug!(
                        utterance = %text,
                        screen = %screens.current(),
                        "no screen change"
                    );
                }
            }
        }

        teardown(active).await;
        drop(launcher);
        drop(events);
        if let Err(e) = router.await {
            tracing::warn!(error = %e, "voice command router task failed");
        }
        drop(speech);
        speech_task.abort();
        tracing::info!("sense8 stopped");
        Ok(())
    }
}

/// Starts screen pipelines once their permission and backends are present
struct Launcher {
    config: Config,
    speech: SpeechQueue,
    detector: Option<Arc<dyn Detector>>,
    frames: Option<Arc<dyn FrameSource>>,
    location: Option<Arc<dyn LocationSource>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    directions: Option<Arc<dyn DirectionsProvider>>,
}

impl Launcher {
    /// Start `screen`'s pipeline, or speak why it cannot start
    fn start(&self, screen: Screen, mode: &watch::Sender<ListenMode>) -> ActiveScreen {
        if let Some(permission) = screen.required_permission() {
            let state = match permission {
                Permission::Camera => self.config.permissions.camera,
                Permission::Location => self.config.permissions.location,
            };
            if !announce_permission(&self.speech, permission, state) {
                return ActiveScreen::Idle;
            }
        }

        match screen {
            Screen::Waiting => ActiveScreen::Idle,
            Screen::ObjectDetection => {
                let Some(detector) = &self.detector else {
                    self.speech.flush(DETECTION_UNAVAILABLE, tags::UNAVAILABLE);
                    return ActiveScreen::Idle;
                };
                ActiveScreen::Detection(DetectionPipeline::start(
                    Arc::clone(detector),
                    self.frames.as_deref(),
                    self.config.detection.confidence_threshold,
                    self.speech.clone(),
                ))
            }
            Screen::Navigation => {
                let (Some(geocoder), Some(directions)) = (&self.geocoder, &self.directions) else {
                    self.speech.flush(NAVIGATION_UNAVAILABLE, tags::UNAVAILABLE);
                    return ActiveScreen::Idle;
                };
                self.speech.flush(messages::PROMPT_DESTINATION, tags::DESTINATION_PROMPT);
                mode.send_replace(ListenMode::FreeForm);
                ActiveScreen::Navigation(start_navigation(
                    &self.config,
                    Arc::clone(geocoder),
                    Arc::clone(directions),
                    self.location.as_deref(),
                    self.speech.clone(),
                ))
            }
        }
    }
}

async fn teardown(active: ActiveScreen) {
    match active {
        ActiveScreen::Idle => {}
        ActiveScreen::Detection(pipeline) => pipeline.teardown().await,
        ActiveScreen::Navigation(pipeline) => pipeline.teardown(),
    }
}

/// Speak what the user must do for a missing permission
///
/// Returns `true` if the permission is granted.
fn announce_permission(
    speech: &SpeechQueue,
    permission: Permission,
    state: PermissionState,
) -> bool {
    if ensure_granted(permission, state).is_ok() {
        return true;
    }
    let text = match state.required_action() {
        PermissionAction::None => return true,
        PermissionAction::Request => {
            format!("The {permission} permission is required. Please grant it to continue.")
        }
        PermissionAction::OpenSettings => {
            format!("The {permission} permission was denied. Please enable it in settings.")
        }
    };
    speech.flush(text, tags::PERMISSION);
    false
}

fn start_navigation(
    config: &Config,
    geocoder: Arc<dyn Geocoder>,
    directions: Arc<dyn DirectionsProvider>,
    location: Option<&dyn LocationSource>,
    speech: SpeechQueue,
) -> NavigationPipeline {
    let session = NavigationSession::new(
        geocoder,
        directions,
        speech,
        config.navigation.arrival_radius_m,
    );
    let snapshot = session.subscribe();
    let (inputs, inputs_rx) = mpsc::channel(SESSION_BUFFER);
    let session = tokio::spawn(session.run(inputs_rx));

    let (location, forward) = match location {
        Some(source) => {
            let (fix_tx, mut fix_rx) = mpsc::channel(SESSION_BUFFER);
            let subscription = source.subscribe(fix_tx);
            let inputs = inputs.clone();
            let forward = tokio::spawn(async move {
                while let Some(fix) = fix_rx.recv().await {
                    if inputs.send(SessionInput::Location(fix)).await.is_err() {
                        break;
                    }
                }
            });
            (Some(subscription), Some(forward))
        }
        None => {
            tracing::warn!("no location source; routes will not advance");
            (None, None)
        }
    };

    tracing::info!(
        radius_m = config.navigation.arrival_radius_m,
        "navigation pipeline started"
    );

    NavigationPipeline {
        inputs,
        session,
        location,
        forward,
        snapshot,
    }
}
