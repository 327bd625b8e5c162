mod page;
mod session;

pub use page::{PageView, SessionPage};
pub use session::{FieldValue, SessionRecord, SPOOF_RECEIVED};
