//! Channel export: strategies, orchestration and the push-channel protocol.

pub mod flat;
pub mod forum;
pub mod model;
pub mod orchestrator;
pub mod reporter;

#[cfg(test)]
pub(crate) mod test_support;

pub use flat::{Batch, FlatChannelExport, fetch_batch};
pub use forum::{ForumExport, ForumPost};
pub use model::{ClientCommand, CompleteData, ExportRequest, ProgressData, ServerMessage};
pub use orchestrator::{ExportContext, ExportStrategy, ExportTotals, Exporter, strategy_for};
pub use reporter::ExportReporter;
