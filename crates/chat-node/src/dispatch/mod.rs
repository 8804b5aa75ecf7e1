//! Message dispatch: handler registry and the ordered handler queue

mod dispatcher;
mod registry;

pub use dispatcher::Dispatcher;
pub use registry::{Accepts, HandlerRegistry, MessageHandler, Origin, Reply};
