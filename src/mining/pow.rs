//! Resumable proof-of-work search
//!
//! The search walks nonces 0, 1, 2, ... in bounded steps so a caller can
//! check for cancellation between steps without losing its place.

use crate::core::Block;

/// Outcome of one bounded search step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStep {
    /// The block with a nonce that meets the difficulty
    Found(Block),
    /// Budget used up; the search resumes at `next`
    Pending { next: u64 },
    /// Every `u64` nonce has been tried
    Exhausted,
}

/// Nonce search over a block header
#[derive(Debug, Clone)]
pub struct NonceSearch {
    block: Block,
    difficulty: u32,
    next: Option<u64>,
    attempts: u64,
}

impl NonceSearch {
    pub fn new(block: Block, difficulty: u32) -> Self {
        Self::resume(block, difficulty, 0)
    }

    /// Continue a search from a known nonce
    pub fn resume(block: Block, difficulty: u32, next: u64) -> Self {
        Self {
            block,
            difficulty,
            next: Some(next),
            attempts: 0,
        }
    }

    /// Try at most `budget` nonces
    pub fn step(&mut self, budget: u64) -> SearchStep {
        for _ in 0..budget {
            let Some(nonce) = self.next else {
                return SearchStep::Exhausted;
            };
            self.block.set_nonce(nonce);
            self.attempts += 1;
            self.next = nonce.checked_add(1);

            if self.block.is_valid_pow(self.difficulty) {
                return SearchStep::Found(self.block.clone());
            }
        }

        match self.next {
            Some(next) => SearchStep::Pending { next },
            None => SearchStep::Exhausted,
        }
    }

    /// Hashes computed so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn next_nonce(&self) -> Option<u64> {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use chrono::Utc;

    fn candidate() -> Block {
        let coinbase = Transaction::coinbase("miner", 50);
        Block::new(None, Block::commitment_root(&coinbase, &[]), Utc::now())
    }

    fn run_to_completion(search: &mut NonceSearch, budget: u64) -> Block {
        loop {
            match search.step(budget) {
                SearchStep::Found(block) => return block,
                SearchStep::Pending { .. } => continue,
                SearchStep::Exhausted => panic!("nonce space exhausted"),
            }
        }
    }

    #[test]
    fn test_finds_valid_nonce() {
        let mut search = NonceSearch::new(candidate(), 1);
        let block = run_to_completion(&mut search, 1_000);

        assert!(block.is_valid_pow(1));
        assert!(block.verify_hash());
        assert_eq!(search.attempts(), block.nonce + 1);
    }

    #[test]
    fn test_step_is_resumable() {
        let block = candidate();

        let mut whole = NonceSearch::new(block.clone(), 1);
        let expected = run_to_completion(&mut whole, u64::MAX);

        let mut stepped = NonceSearch::new(block, 1);
        let mut previous_next = 0;
        let found = loop {
            match stepped.step(3) {
                SearchStep::Found(block) => break block,
                SearchStep::Pending { next } => {
                    assert_eq!(next, previous_next + 3);
                    previous_next = next;
                }
                SearchStep::Exhausted => panic!("nonce space exhausted"),
            }
        };

        assert_eq!(found, expected);
        assert_eq!(stepped.attempts(), whole.attempts());
    }

    #[test]
    fn test_exhausts_at_end_of_nonce_space() {
        // 32 leading zero bytes is unreachable
        let mut search = NonceSearch::resume(candidate(), 32, u64::MAX - 1);

        assert_eq!(search.step(1), SearchStep::Pending { next: u64::MAX });
        assert_eq!(search.step(10), SearchStep::Exhausted);
        assert_eq!(search.attempts(), 2);
        assert_eq!(search.next_nonce(), None);
        assert_eq!(search.step(10), SearchStep::Exhausted);
    }
}
