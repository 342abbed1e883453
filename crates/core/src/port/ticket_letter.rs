// Ticket Letter Port (for deterministic testing)

use rand::Rng;

const LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Supplies the decorative letter prefixed to every ticket
pub trait TicketLetterProvider: Send + Sync {
    /// Pick a letter in `A..=Z`
    fn next_letter(&self) -> char;
}

/// Uniformly random letter (production)
pub struct RandomLetterProvider;

impl TicketLetterProvider for RandomLetterProvider {
    fn next_letter(&self) -> char {
        let idx = rand::thread_rng().gen_range(0..LETTERS.len());
        LETTERS[idx] as char
    }
}

/// Always the same letter (tests)
pub struct FixedLetterProvider(pub char);

impl TicketLetterProvider for FixedLetterProvider {
    fn next_letter(&self) -> char {
        self.0
    }
}
