//! Sequential pipeline stages.
//!
//! A stage takes ownership of the [`EnvelopeContext`], updates it and hands
//! it back as a [`Flow`]. Once a stage returns [`Flow::Abort`], the
//! remaining stages are skipped and the context is passed through as is.
//! Concrete stages live in the [`stages`](crate::stages) module.

use std::{future::Future, pin::Pin};

use tracing::debug;

use crate::{EnvelopeContext, Flow, RelayResult};

/// Boxed future type for stage operations, enabling async stages.
pub type StageFuture<'a> = Pin<Box<dyn Future<Output = RelayResult<Flow>> + Send + 'a>>;

/// Trait for the stages run between event parsing and dispatch.
pub trait Stage: Send + Sync {
    /// Runs the stage, returning the updated context.
    fn run<'a>(&'a self, envelope: EnvelopeContext) -> StageFuture<'a>;

    /// Returns the name of this stage.
    fn name(&self) -> &str;
}

/// Applies a list of stages to a context in order.
///
/// Stages are skipped once the flow is aborted, and any stage error
/// stops the run immediately.
pub async fn run_stages(stages: &[Box<dyn Stage>], envelope: EnvelopeContext) -> RelayResult<Flow> {
    let mut flow = Flow::from_envelope(envelope);
    for stage in stages {
        flow = match flow {
            Flow::Continue(envelope) => {
                debug!(
                    stage = stage.name(),
                    message_id = %envelope.message_id(),
                    "Running stage"
                );
                stage.run(envelope).await?
            }
            Flow::Abort(envelope) => {
                debug!(
                    stage = stage.name(),
                    message_id = %envelope.message_id(),
                    "Skipping stage after abort"
                );
                Flow::Abort(envelope)
            }
        };
    }
    Ok(flow)
}
