//! Cart reconciliation.
//!
//! - `local`: the guest cart in client-side storage
//! - `reconciler`: routing between the server cart and the guest cart
//! - `queue`: serializes mutating operations
//! - `service`: the cloneable handle consumers hold

mod local;
mod queue;
mod reconciler;
mod service;
mod state;

pub use local::LocalCartStore;
pub use queue::{OperationQueue, QueueTurn};
pub use reconciler::{CartReconciler, SyncReport};
pub use service::CartService;
pub use state::{CartSnapshot, CartSource};
