// Ticket Domain Model

use super::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum width of the numeric part of a ticket label
pub const TICKET_NUMBER_WIDTH: usize = 3;

/// Human-readable ticket, rendered as e.g. `A007`
///
/// Only `sequence` carries meaning. The letter is decorative and may repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket {
    letter: char,
    sequence: u64,
}

impl Ticket {
    pub fn new(letter: char, sequence: u64) -> Self {
        Self { letter, sequence }
    }

    pub fn letter(&self) -> char {
        self.letter
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:0width$}",
            self.letter,
            self.sequence,
            width = TICKET_NUMBER_WIDTH
        )
    }
}

impl From<Ticket> for String {
    fn from(ticket: Ticket) -> Self {
        ticket.to_string()
    }
}

impl FromStr for Ticket {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let letter = chars
            .next()
            .filter(char::is_ascii_uppercase)
            .ok_or_else(|| DomainError::InvalidTicket(s.to_string()))?;

        let digits = chars.as_str();
        if digits.len() < TICKET_NUMBER_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::InvalidTicket(s.to_string()));
        }

        let sequence = digits
            .parse()
            .map_err(|_| DomainError::InvalidTicket(s.to_string()))?;

        Ok(Self { letter, sequence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_pads_to_three_digits() {
        assert_eq!(Ticket::new('A', 7).to_string(), "A007");
        assert_eq!(Ticket::new('Z', 42).to_string(), "Z042");
        assert_eq!(Ticket::new('K', 999).to_string(), "K999");
    }

    #[test]
    fn test_display_grows_past_three_digits() {
        assert_eq!(Ticket::new('B', 1000).to_string(), "B1000");
        assert_eq!(Ticket::new('B', 123456).to_string(), "B123456");
    }

    #[test]
    fn test_parse_label() {
        let ticket: Ticket = "A007".parse().unwrap();
        assert_eq!(ticket.letter(), 'A');
        assert_eq!(ticket.sequence(), 7);

        let ticket: Ticket = "Q1234".parse().unwrap();
        assert_eq!(ticket.sequence(), 1234);
    }

    #[test]
    fn test_parse_rejects_bad_labels() {
        for label in ["", "A", "A07", "a007", "7007", "A0x7", "AB007"] {
            assert!(
                label.parse::<Ticket>().is_err(),
                "expected {:?} to be rejected",
                label
            );
        }
    }
}
