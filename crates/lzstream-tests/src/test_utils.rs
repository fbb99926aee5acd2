//! Unified test utilities for lzstream tests and benchmarks

use std::sync::{Arc, Mutex};

use lzstream_engine::{Delivery, DeliveryLoop};

/// Test data generation patterns
#[derive(Debug, Clone, Copy)]
pub enum TestDataPattern {
    /// All zeros, highly compressible
    Zeros,
    /// Deterministic pseudo-random bytes, incompressible
    Random,
    /// English-like prose
    Text,
}

const WORDS: &[&str] = &[
    "the", "of", "and", "to", "in", "a", "is", "that", "for", "it", "as", "was", "with", "be",
    "by", "on", "not", "he", "this", "are", "or", "his", "from", "at", "which", "but", "have",
    "an", "had", "they", "you", "were", "their", "one", "all", "we", "can", "her", "has", "there",
    "been", "if", "more", "when", "will", "would", "who", "so", "no", "stream", "river", "water",
    "morning", "evening", "through", "between", "house", "little", "world", "because", "people",
];

/// Generate `size` bytes with the given pattern
///
/// Output is deterministic so runs are reproducible.
pub fn generate_test_data(size: usize, pattern: TestDataPattern) -> Vec<u8> {
    match pattern {
        TestDataPattern::Zeros => vec![0u8; size],
        TestDataPattern::Random => {
            let mut state = 0x2545_f491_4f6c_dd1d_u64;
            (0..size)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    (state >> 32) as u8
                })
                .collect()
        }
        TestDataPattern::Text => english_text(size),
    }
}

/// English-like text of exactly `size` bytes
pub fn english_text(size: usize) -> Vec<u8> {
    let mut text = Vec::with_capacity(size + 16);
    let mut state = 0x9e37_79b9_7f4a_7c15_u64;
    let mut sentence_len = 0;

    while text.len() < size {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let word = WORDS[(state >> 33) as usize % WORDS.len()];

        if sentence_len == 0 {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                text.extend(first.to_uppercase().to_string().bytes());
                text.extend(chars.as_str().bytes());
            }
        } else {
            text.extend_from_slice(word.as_bytes());
        }
        sentence_len += 1;

        if sentence_len > 6 && (state >> 20) % 5 == 0 {
            text.extend_from_slice(b". ");
            sentence_len = 0;
        } else {
            text.push(b' ');
        }
    }

    text.truncate(size);
    text
}

/// Shared record of everything a stream delivered
pub type DeliveryLog = Arc<Mutex<Vec<Delivery>>>;

/// A handler that appends every delivery to the returned log
pub fn collecting_handler() -> (DeliveryLog, impl FnMut(Delivery) + Send + 'static) {
    let log = DeliveryLog::default();
    let sink = Arc::clone(&log);
    (log, move |delivery| {
        if let Ok(mut log) = sink.lock() {
            log.push(delivery);
        }
    })
}

/// Concatenated payload of every data delivery
pub fn collected_data(log: &DeliveryLog) -> Vec<u8> {
    log.lock()
        .map(|log| {
            log.iter()
                .filter_map(|delivery| match delivery {
                    Delivery::Data(chunk) => Some(&chunk[..]),
                    _ => None,
                })
                .flatten()
                .copied()
                .collect()
        })
        .unwrap_or_default()
}

/// The terminal delivery, if the stream has ended
pub fn terminal(log: &DeliveryLog) -> Option<Delivery> {
    log.lock()
        .ok()
        .and_then(|log| log.iter().find(|delivery| delivery.is_terminal()).cloned())
}

/// Drain `delivery_loop` until the stream recorded in `log` ends
pub fn wait_for_terminal(delivery_loop: &mut DeliveryLoop, log: &DeliveryLog) -> Delivery {
    loop {
        if let Some(delivery) = terminal(log) {
            return delivery;
        }
        delivery_loop.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_text_is_exact_and_deterministic() {
        let text = english_text(10_000);
        assert_eq!(text.len(), 10_000);
        assert_eq!(text, english_text(10_000));
        assert!(text.iter().all(|b| b.is_ascii()));
        assert!(text.windows(2).any(|w| w == b". "));
    }

    #[test]
    fn test_random_pattern_varies() {
        let data = generate_test_data(4096, TestDataPattern::Random);
        let distinct = data.iter().collect::<std::collections::HashSet<_>>().len();
        assert!(distinct > 200);
    }
}
