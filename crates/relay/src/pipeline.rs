//! End-to-end relay pipeline.
//!
//! Runs one invocation per trigger event: the event is parsed into an
//! [`EnvelopeContext`], handed through [`AddressResolver`],
//! [`MessageFetcher`] and [`HeaderTransformer`] and finally consumed by the
//! [`Dispatcher`]. Fatal failures are returned as [`RelayError`], aborts
//! complete successfully with [`RelayOutcome::Aborted`].

use std::{fmt::Display, sync::Arc};

use tracing::{error, info};

use crate::{
    parse_event, parse_event_json, run_stages, AddressResolver, ConfigError, DirectoryLookup,
    Dispatcher, EnvelopeContext, HeaderTransformer, MessageFetcher, Notifier, ObjectStore,
    RelayConfig, RelayOutcome, Stage, StorageError, Transport, TransportError, TriggerEvent,
};

/// Result type for pipeline operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Fatal errors ending a relay invocation.
#[derive(Debug)]
pub enum RelayError {
    /// The trigger event does not describe exactly one received message.
    InvalidEvent(String),
    /// Reading the inbound message or archiving the relayed copy failed.
    Storage(StorageError),
    /// The outbound transmission failed.
    Transport(TransportError),
}

impl Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::InvalidEvent(msg) => write!(f, "Invalid event: {msg}"),
            RelayError::Storage(e) => write!(f, "Storage failure: {e}"),
            RelayError::Transport(e) => write!(f, "Transport failure: {e}"),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::InvalidEvent(_) => None,
            RelayError::Storage(e) => Some(e),
            RelayError::Transport(e) => Some(e),
        }
    }
}

impl From<StorageError> for RelayError {
    fn from(e: StorageError) -> Self {
        RelayError::Storage(e)
    }
}

impl From<TransportError> for RelayError {
    fn from(e: TransportError) -> Self {
        RelayError::Transport(e)
    }
}

/// External collaborators the pipeline talks to.
///
/// The directory and the notifier are optional: without a directory,
/// domain keys resolve to their configured destinations, and without a
/// notifier no notification is sent.
pub struct Collaborators {
    pub store: Arc<dyn ObjectStore>,
    pub transport: Arc<dyn Transport>,
    pub directory: Option<Arc<dyn DirectoryLookup>>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl Collaborators {
    pub fn new(store: Arc<dyn ObjectStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            transport,
            directory: None,
            notifier: None,
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn DirectoryLookup>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

/// Relay pipeline built once per process and run once per trigger event.
///
/// Invocations share no mutable state, so a single pipeline may serve
/// concurrent events.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    dispatcher: Dispatcher,
}

impl Pipeline {
    /// Creates a new [`Pipeline`], failing when the configured abort-subject
    /// pattern does not compile.
    pub fn new(config: &RelayConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        let Collaborators {
            store,
            transport,
            directory,
            notifier,
        } = collaborators;

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(AddressResolver::from_config(config, directory)),
            Box::new(MessageFetcher::from_config(config, store.clone())),
            Box::new(HeaderTransformer::from_config(config)?),
        ];
        let dispatcher = Dispatcher::new(config, transport, store, notifier);

        info!(
            stages = %stages.iter().map(|s| s.name()).collect::<Vec<_>>().join(", "),
            "Relay pipeline initialized"
        );

        Ok(Self { stages, dispatcher })
    }

    /// Runs the pipeline for a decoded trigger event.
    pub async fn run(&self, event: &TriggerEvent) -> RelayResult<RelayOutcome> {
        let envelope = parse_event(event)?;
        self.run_envelope(envelope).await
    }

    /// Runs the pipeline for a JSON trigger payload.
    pub async fn run_json(&self, payload: &str) -> RelayResult<RelayOutcome> {
        let envelope = parse_event_json(payload)?;
        self.run_envelope(envelope).await
    }

    async fn run_envelope(&self, envelope: EnvelopeContext) -> RelayResult<RelayOutcome> {
        let message_id = envelope.message_id().to_string();

        let result = match run_stages(&self.stages, envelope).await {
            Ok(flow) => self.dispatcher.dispatch(flow).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(outcome) => info!(
                message_id = %message_id,
                outcome = ?outcome,
                "Process finished successfully"
            ),
            Err(e) => error!(message_id = %message_id, error = %e, "Step returned error"),
        }
        result
    }
}
