pub mod activity;
pub mod attachment;
pub mod correspondence;
pub mod correspondence_status;
pub mod memory;
pub mod registry;
pub mod retry;
pub mod search;
pub mod session;
pub mod storage;
pub mod store;
pub mod validation;

pub use activity::{ActivityLogEntry, NewActivity};
pub use attachment::Attachment;
pub use correspondence::{CorrespondenceRecord, NewCorrespondence, StatusChange};
pub use correspondence_status::CorrespondenceStatus;
pub use search::{SearchQuery, SortKey, StatusFilter};
pub use session::{AuthEvent, AuthState, Session, SessionUser, SignUpOutcome, SignUpProfile};
pub use store::{RecordStore, SessionStore, StoreError};
