//! Runtime support for running protocol decoders

pub mod control;
pub mod errors;
pub mod node;
pub mod sample;
pub mod scheduler;

pub use control::{CancelToken, DecodeContext, ProgressReporter};
pub use errors::{DecodeError, DecodeResult};
pub use node::ProtocolDecoder;
pub use sample::Sample;
pub use scheduler::Scheduler;
