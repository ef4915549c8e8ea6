pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use app::commands::CommandRunner;
#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use crate::config::{cli::FileSessionStore, Settings};
pub use crate::core::{
    booking::{BookingForm, BookingReceipt, BookingWorkflow},
    cache::QueryCache,
    client::HttpBookingApi,
    session::{Session, SessionManager, SessionSealer},
};
pub use utils::error::{BookingError, Result};
