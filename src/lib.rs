pub mod config;
pub mod error;
pub mod fallback;
pub mod guards;
pub mod http;
pub mod logging;
pub mod models;
pub mod notify;
pub mod responses;
pub mod services;
pub mod session;
pub mod state;
pub mod storage;
pub mod token_store;
pub mod utils;

pub use error::{ApiError, ErrorKind};
pub use state::ClientState;
