//! Built-in curated question set
//!
//! Served sequentially by question index so a run never depends on the
//! network for this topic.

use super::source::{QuestionPayload, QuestionRequest, QuestionSource, SourceError};

struct Entry {
    prompt: &'static str,
    options: [&'static str; 4],
    correct: usize,
    explanation: &'static str,
}

const ANCIENT_GREECE: &[Entry] = &[
    Entry {
        prompt: "Which Spartan King led the 300 at the Battle of Thermopylae?",
        options: ["Leonidas I", "Agis IV", "Menelaus", "Lysander"],
        correct: 0,
        explanation: "King Leonidas I led the Greek coalition against the Persian Empire in 480 BC.",
    },
    Entry {
        prompt: "What was the rigorous state-sponsored education system for Spartan youth called?",
        options: ["The Academy", "The Agoge", "The Lyceum", "The Symposium"],
        correct: 1,
        explanation: "The Agoge was the mandatory training program for male Spartan citizens.",
    },
    Entry {
        prompt: "What was the name of the large round shield carried by a Spartan Hoplite?",
        options: ["Aspis (Hoplon)", "Scutum", "Targe", "Phalanx"],
        correct: 0,
        explanation: "The Aspis was the bronze-faced wooden shield that defined the Hoplite.",
    },
    Entry {
        prompt: "Sparta was the principal enemy of which city-state during the Peloponnesian War?",
        options: ["Thebes", "Corinth", "Athens", "Argos"],
        correct: 2,
        explanation: "The war was fought between the Delian League (Athens) and the Peloponnesian League (Sparta).",
    },
    Entry {
        prompt: "Who was the legendary lawgiver credited with reforming Spartan society?",
        options: ["Solon", "Pericles", "Lycurgus", "Draco"],
        correct: 2,
        explanation: "Lycurgus is credited with Sparta's military-oriented reforms.",
    },
    Entry {
        prompt: "What was the primary tactical formation used by the Spartan army?",
        options: ["The Phalanx", "The Testudo", "The Wedge", "Skirmishing"],
        correct: 0,
        explanation: "The Phalanx was a rectangular mass of heavy infantry armed with spears.",
    },
    Entry {
        prompt: "What did Spartan mothers tell their sons about their shields before battle?",
        options: ["Conquer or Die", "With it or on it", "For glory", "Return victorious"],
        correct: 1,
        explanation: "Come back with your shield, or on it.",
    },
    Entry {
        prompt: "Who were the subjugated serfs that supported the Spartan economy?",
        options: ["The Helots", "The Perioikoi", "The Metics", "The Hoplites"],
        correct: 0,
        explanation: "Helots were the unfree population of Laconia and Messenia.",
    },
    Entry {
        prompt: "How many kings did Sparta officially have at any given time?",
        options: ["One", "Two", "Three", "None (Council only)"],
        correct: 1,
        explanation: "Sparta had two kings, from the Agiad and Eurypontid families.",
    },
    Entry {
        prompt: "What was the Spartan secret police used to control the Helots called?",
        options: ["The Krypteia", "The Immortals", "The Ephors", "The Gerousia"],
        correct: 0,
        explanation: "The Krypteia monitored and terrorized the Helot population.",
    },
    Entry {
        prompt: "In 404 BC, Sparta defeated Athens, ending which major conflict?",
        options: ["The Persian War", "The Peloponnesian War", "The Trojan War", "The Corinthian War"],
        correct: 1,
        explanation: "The victory made Sparta the temporary hegemon of Greece.",
    },
    Entry {
        prompt: "What famous one-word reply did the Spartans send to Philip II of Macedon?",
        options: ["None", "If", "Try", "Never"],
        correct: 1,
        explanation: "Philip threatened what he would do if he entered Laconia; Sparta replied: 'If'.",
    },
];

/// Curated ancient-Greece question set
#[derive(Debug, Clone, Copy, Default)]
pub struct CuratedBank;

impl CuratedBank {
    /// Topics this bank answers without the remote source
    pub fn handles(topic: &str) -> bool {
        let topic = topic.to_lowercase();
        topic.contains("ancient greece") || topic.contains("sparta")
    }

    pub fn len(&self) -> usize {
        ANCIENT_GREECE.len()
    }

    pub fn is_empty(&self) -> bool {
        ANCIENT_GREECE.is_empty()
    }

    /// Question for a run index (wraps around)
    pub fn question(&self, index: u32) -> QuestionPayload {
        let entry = &ANCIENT_GREECE[index as usize % ANCIENT_GREECE.len()];
        QuestionPayload {
            prompt: entry.prompt.to_string(),
            options: entry.options.iter().map(|o| o.to_string()).collect(),
            correct_index: Some(entry.correct as i64),
            explanation: Some(entry.explanation.to_string()),
            difficulty_level: Some(1),
        }
    }
}

impl QuestionSource for CuratedBank {
    fn fetch(&mut self, request: &QuestionRequest) -> Result<QuestionPayload, SourceError> {
        Ok(self.question(request.question_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::Question;

    #[test]
    fn test_every_entry_validates() {
        let bank = CuratedBank;
        for i in 0..bank.len() as u32 {
            let q = Question::from_payload(bank.question(i), 4).unwrap();
            assert!(q.correct_index < 4);
        }
    }

    #[test]
    fn test_sequential_and_wrapping() {
        let bank = CuratedBank;
        assert_eq!(bank.question(0), bank.question(bank.len() as u32));
        assert_ne!(bank.question(0).prompt, bank.question(1).prompt);
    }

    #[test]
    fn test_topic_match() {
        assert!(CuratedBank::handles("Ancient Greece"));
        assert!(CuratedBank::handles("Sparta and Athens"));
        assert!(!CuratedBank::handles("Algebra"));
    }
}
