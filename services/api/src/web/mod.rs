pub mod answers;
pub mod auth;
pub mod doubts;
pub mod extract;
pub mod leaderboard;
pub mod middleware;
pub mod notifications;
pub mod notifier;
pub mod protocol;
pub mod response;
pub mod rest;
pub mod router;
pub mod state;
pub mod tags;
pub mod users;
pub mod views;
pub mod ws_handler;

// Re-export what the binaries and tests need to assemble the server.
pub use middleware::require_auth;
pub use router::build_router;
pub use state::AppState;
pub use ws_handler::ws_handler;
