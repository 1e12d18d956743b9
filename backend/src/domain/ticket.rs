//! Confirmation ticket identifiers.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

const REQUIRED_LETTERS: [char; 3] = ['S', 'C', 'Z'];
const RANDOM_DIGITS: usize = 6;

/// A nine-character ticket identifier: the letters `S`, `C`, `Z` and six
/// random digits, shuffled into one randomised ordering.
///
/// Not cryptographically significant, and no uniqueness check is performed
/// against previously issued tickets; the id is attached to exactly one
/// booking inside the confirmation transaction, which is the only place it
/// is produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Generate a fresh ticket id.
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let mut chars: Vec<char> = REQUIRED_LETTERS.to_vec();
        for _ in 0..RANDOM_DIGITS {
            chars.push(char::from(b'0' + rng.gen_range(0..10)));
        }
        chars.shuffle(rng);
        Self(chars.into_iter().collect())
    }

    /// Reconstruct a ticket id from its stored form.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The ticket id as shown on the confirmation email.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use rstest::rstest;

    #[rstest]
    fn generated_ids_have_the_fixed_shape() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..100 {
            let ticket = TicketId::generate(&mut rng);
            let id = ticket.as_str();
            assert_eq!(id.chars().count(), 9);
            for letter in REQUIRED_LETTERS {
                assert_eq!(
                    id.chars().filter(|c| *c == letter).count(),
                    1,
                    "{letter} appears exactly once in {id}"
                );
            }
            assert_eq!(id.chars().filter(char::is_ascii_digit).count(), 6);
        }
    }

    #[rstest]
    fn generation_is_seed_deterministic() {
        let a = TicketId::generate(&mut SmallRng::seed_from_u64(42));
        let b = TicketId::generate(&mut SmallRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[rstest]
    fn ordering_is_shuffled_across_draws() {
        let mut rng = SmallRng::seed_from_u64(7);
        let ids: Vec<String> = (0..20)
            .map(|_| TicketId::generate(&mut rng).as_str().to_owned())
            .collect();
        let letter_positions: std::collections::HashSet<usize> = ids
            .iter()
            .filter_map(|id| id.find('S'))
            .collect();
        assert!(
            letter_positions.len() > 1,
            "letters land in varying positions"
        );
    }
}
