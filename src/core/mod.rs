pub mod api_error;
pub mod availability;
pub mod booking;
pub mod cache;
pub mod client;
pub mod session;
pub mod submission;

pub use crate::domain::model::{Host, Office, Slot};
pub use crate::domain::ports::{BookingApi, SessionStore};
pub use crate::utils::error::Result;
