//! Application state shared by every handler.

use stowage_storage::Storage;

/// State extracted by the handlers.
///
/// Handlers ask for the individual services through
/// [`State`](axum::extract::State); the `FromRef` impls below pull them out
/// of this struct.
#[derive(Debug, Clone)]
pub struct ServiceState {
    storage: Storage,
}

impl ServiceState {
    /// Wrap an already configured storage facade.
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Storage facade every object route goes through.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

impl_di!(storage: Storage);
