// Oracle module - THE CONSENSUS
// Index assignment, request routing and response aggregation

mod engine;
mod index;
mod registry;
mod request;

pub use engine::{OracleEngine, OracleError, ResponseOutcome, StatusTicket, TicketKind};
pub use index::{
    routing_index, EntropyIndexSource, IndexSource, OracleIndexes, ScriptedIndexSource,
    SeededIndexSource,
};
pub use registry::{Oracle, OracleRegistry};
pub use request::{RequestKey, RequestState, StatusRequest};
