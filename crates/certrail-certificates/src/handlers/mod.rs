pub(crate) mod challenge_handler;
pub(crate) mod types;

pub use challenge_handler::configure_routes;
pub use types::{create_challenge_app_state, ChallengeAppState};
