use core_types::User;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Mutex;

/// The single random source used for reviewer selection.
///
/// One generator is shared by every request; the lock is only held for the
/// duration of a shuffle or a pick, never across an await point.
#[derive(Debug)]
pub struct ReviewerPicker {
    rng: Mutex<StdRng>,
}

impl ReviewerPicker {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// A reproducible picker for tests and simulations.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Returns up to `limit` candidates drawn uniformly without replacement.
    ///
    /// The whole pool is shuffled before truncating, so the storage order of
    /// the candidates has no influence on who gets picked.
    pub fn pick_reviewers(&self, mut candidates: Vec<User>, limit: usize) -> Vec<User> {
        {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            candidates.shuffle(&mut *rng);
        }
        candidates.truncate(limit);
        candidates
    }

    /// Picks one candidate uniformly, or `None` from an empty pool.
    pub fn pick_one<'a>(&self, candidates: &'a [User]) -> Option<&'a User> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        candidates.choose(&mut *rng)
    }
}

impl Default for ReviewerPicker {
    fn default() -> Self {
        Self::from_entropy()
    }
}
