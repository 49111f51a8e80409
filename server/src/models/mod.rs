pub mod event;
pub mod user;

pub use event::{Event, EventPatch, NewEvent};
pub use user::DashboardUser;
