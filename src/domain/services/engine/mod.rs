//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Asynchronous serving layer over the matching core. Every instrument gets one worker task
// owning its InstrumentEngine; the service routes requests to workers by instrument id and
// broadcasts engine events to any subscribers.
//
// | Component        | Description                                                  |
// |------------------|--------------------------------------------------------------|
// | InstrumentWorker | Task processing one instrument's commands sequentially.     |
// | WorkerClient     | Mailbox handle used by the service.                          |
// | EngineService    | Public async API: submit, cancel, book, sweep, registry.     |
// | EngineEvent      | Broadcast notifications (fire-and-forget).                   |
//--------------------------------------------------------------------------------------------------

pub mod service;
pub mod worker;

pub use service::{EngineEvent, EngineService};
pub use worker::{InstrumentWorker, WorkerClient};
