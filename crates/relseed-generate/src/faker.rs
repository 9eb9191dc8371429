use std::collections::HashSet;

use fake::Fake;
use rand::{Rng, RngCore};

/// Kinds of atomic values the synthesizer asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicKind {
    Word,
    /// Two capitalized words.
    Label,
    Sentence,
    /// Unique within a provider.
    Email,
    Phone,
    City,
    Company,
    /// Upper-case alphanumeric code.
    Code,
}

/// Source of plausible atomic values.
pub trait AtomicProvider: Send {
    fn generate(&mut self, kind: AtomicKind, rng: &mut dyn RngCore) -> String;
}

const UNIQUE_ATTEMPTS: u32 = 16;

/// [`AtomicProvider`] backed by the `fake` crate.
#[derive(Debug, Default)]
pub struct FakerProvider {
    issued_emails: HashSet<String>,
}

impl FakerProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn unique_email(&mut self, rng: &mut dyn RngCore) -> String {
        for _ in 0..UNIQUE_ATTEMPTS {
            let email: String = fake::faker::internet::en::SafeEmail().fake_with_rng(rng);
            if self.issued_emails.insert(email.clone()) {
                return email;
            }
        }

        let email: String = fake::faker::internet::en::SafeEmail().fake_with_rng(rng);
        let (local, domain) = email.split_once('@').unwrap_or((email.as_str(), "example.com"));
        let email = format!("{local}.{}@{domain}", self.issued_emails.len());
        self.issued_emails.insert(email.clone());
        email
    }
}

impl AtomicProvider for FakerProvider {
    fn generate(&mut self, kind: AtomicKind, rng: &mut dyn RngCore) -> String {
        match kind {
            AtomicKind::Word => fake::faker::lorem::en::Word().fake_with_rng(rng),
            AtomicKind::Label => {
                let words: Vec<String> = fake::faker::lorem::en::Words(2..3).fake_with_rng(rng);
                words
                    .iter()
                    .map(|word| capitalize(word))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            AtomicKind::Sentence => fake::faker::lorem::en::Sentence(4..8).fake_with_rng(rng),
            AtomicKind::Email => self.unique_email(rng),
            AtomicKind::Phone => fake::faker::phone_number::en::PhoneNumber().fake_with_rng(rng),
            AtomicKind::City => fake::faker::address::en::CityName().fake_with_rng(rng),
            AtomicKind::Company => fake::faker::company::en::CompanyName().fake_with_rng(rng),
            AtomicKind::Code => {
                const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
                (0..8)
                    .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
                    .collect()
            }
        }
    }
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn emails_are_unique_within_a_provider() {
        let mut provider = FakerProvider::new();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let emails: HashSet<String> = (0..200)
            .map(|_| provider.generate(AtomicKind::Email, &mut rng))
            .collect();
        assert_eq!(emails.len(), 200);
        assert!(emails.iter().all(|email| email.contains('@')));
    }

    #[test]
    fn labels_and_codes_have_expected_shape() {
        let mut provider = FakerProvider::new();
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let label = provider.generate(AtomicKind::Label, &mut rng);
        assert_eq!(label.split(' ').count(), 2);
        assert!(label.chars().next().is_some_and(char::is_uppercase));

        let code = provider.generate(AtomicKind::Code, &mut rng);
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn capitalize_handles_empty_input() {
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("door"), "Door");
    }
}
