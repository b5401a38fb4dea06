use crate::certificates::ChallengeCoordinator;
use certrail_kv::KvStore;
use std::sync::Arc;

pub struct ChallengeAppState {
    pub challenges: ChallengeCoordinator,
}

pub fn create_challenge_app_state(store: Arc<dyn KvStore>) -> Arc<ChallengeAppState> {
    Arc::new(ChallengeAppState {
        challenges: ChallengeCoordinator::new(store),
    })
}
