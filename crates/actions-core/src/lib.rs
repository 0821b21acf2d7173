pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod io;
pub mod notify;
pub mod paths;
pub mod registry;
pub mod store;
pub mod sync;
pub mod token;
pub mod types;

pub use catalog::HandlerCatalog;
pub use dispatch::{Dispatcher, Invocation};
pub use error::{ActionsError, Result};
pub use registry::{ActionDraft, Registry};
pub use sync::{SyncReport, Synchronizer};
pub use types::{ActionId, ActionInstance, Context, Outcome, Results};
