//! Command implementations.

pub mod batch;
pub mod search;
pub mod sources;

pub use self::batch::execute_batch;
pub use self::search::execute_search;
pub use self::sources::execute_sources;

use tokio_util::sync::CancellationToken;

/// A token cancelled on Ctrl-C.
pub(crate) fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling in-flight searches");
            trigger.cancel();
        }
    });
    token
}
