//! Request extractors.

mod actor;

pub use actor::{actor_from_headers, USER_GROUPS_HEADER, USER_ID_HEADER};
