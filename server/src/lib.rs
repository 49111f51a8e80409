pub mod backend;
pub mod config;
pub mod detail;
pub mod forms;
pub mod handlers;
pub mod list;
pub mod models;
pub mod richtext;
pub mod routes;
pub mod session;
pub mod state;
pub mod table;
pub mod users;
pub mod utils;

pub use state::AppState;
