// Session store adapter around the weave-core reducer

pub mod actor;
pub mod error;
pub mod manager;
pub mod preferences;
pub mod session_id;

pub use actor::{SessionHandle, SessionSnapshot, SessionUpdate, spawn_session};
pub use error::{PreferencesError, SessionError};
pub use manager::{SessionManager, SessionManagerConfig};
pub use preferences::StorePreferences;
pub use session_id::SessionId;
