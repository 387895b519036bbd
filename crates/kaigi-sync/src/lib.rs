pub mod aggregator;
pub mod editor;
pub mod error;
pub mod feed;
pub mod memory;
pub mod presence;
pub mod store;
pub mod timer;

pub use aggregator::{MeetingSession, MeetingState};
pub use editor::{FieldEditor, QUIET_PERIOD};
pub use error::SyncError;
pub use feed::{ChangeEvent, ChangeFeed, ChangeKind, Subscription};
pub use memory::MemoryBackend;
pub use presence::{PresenceChannel, PresenceHandle, PresenceHub};
pub use store::{row_id, RowStore, StoreError};
pub use timer::SharedTimer;
