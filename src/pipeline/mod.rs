//! Pipeline orchestration
//!
//! Two batch stages run in order on a single logical thread. The event
//! stage depends on the catalog stage's persisted output, so stage 1
//! must fully complete before stage 2 starts; a failed stage aborts
//! the run, and a rerun fully overwrites all outputs.

pub mod catalog;
pub mod events;

use crate::error::Result;
use crate::session::EtlSession;
use tracing::info;

/// Run the full pipeline: catalog stage, then event stage
pub async fn run(session: &EtlSession) -> Result<()> {
    info!("starting catalog stage");
    catalog::run(session).await?;

    info!("starting event stage");
    events::run(session).await?;

    info!("pipeline complete");
    Ok(())
}
