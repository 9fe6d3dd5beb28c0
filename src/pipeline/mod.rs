//! Query Pipeline (Component F) — SELECT, MUTATION, DDL, and BATCH request
//! handling, each wiring together the Router, Shard Coordinator, Cache
//! Store, and Split Orchestrator overlay.

mod batch;
mod ddl;
mod events;
mod mutation;
mod select;

pub use batch::{execute as run_batch, BatchItem, BatchOutcome};
pub use ddl::{execute as run_ddl, DdlOutcome};
pub use events::InvalidationEvent;
pub use mutation::{execute as run_mutation, MutationOutcome};
pub use select::{execute as run_select, SelectOutcome};
