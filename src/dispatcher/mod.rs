//! Handler dispatch: per-handler worker pools, bounded queues, and the
//! request/reply channel protocol between the connection layer and handlers.

mod core;

pub use core::{
    Dispatcher, HandlerRequest, HandlerResponse, HeaderVec, MAX_INLINE_HEADERS,
};
