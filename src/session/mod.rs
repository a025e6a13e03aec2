//! In-memory session store with per-client isolation and idle expiry.
//!
//! Each session binds an unguessable id to the client that created it, the ingested table, and
//! a metadata map. Every access is checked against the owning client; a session that is missing,
//! removed, or owned by someone else is reported the same way ([`crate::SessionError::NotFound`]).
//!
//! Sessions leave the store in one of three ways: an owner-authorised [`SessionStore::delete`],
//! the periodic [`SessionStore::sweep`] (usually run by [`spawn_sweeper`]), or eviction when the
//! optional session cap is reached. Nothing is persisted; a restart forgets every session.

mod clock;
mod record;
mod store;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use record::{Metadata, SessionRecord, SessionUpdate};
pub use store::{SessionStore, SweepReport};
pub use sweeper::{spawn_sweeper, SweeperHandle};
