//! Authenticated outbound client composition: manager, handles, and the
//! interceptor chain.

pub mod handle;
pub mod interceptor;
pub mod manager;

// Re-export frequently used items from each module
pub use handle::{ClientHandle, OutboundRequest};
pub use interceptor::{
    CORRELATION_ID_HEADER, FilterMode, Interceptor, Next, RequestLogging, StatusTranslation,
    standard_chain,
};
pub use manager::ClientManager;
