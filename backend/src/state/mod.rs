// State management module
// Holds the stores and services shared by every request handler

pub mod app_state;

pub use app_state::AppState;
