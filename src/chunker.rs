//! Chunked delivery of long replies. Discord caps messages at 2000
//! characters; replies are split into ordered segments and sent one at a
//! time so the receiving side reads them in order.

use crate::channels::Delivery;
use crate::error::MagpieError;

/// Split `text` into segments of at most `max_len` characters. Concatenating
/// the segments reproduces the input exactly; empty input yields no segments.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut chars = text.chars();
    loop {
        let segment: String = chars.by_ref().take(max_len).collect();
        if segment.is_empty() {
            break;
        }
        segments.push(segment);
    }
    segments
}

/// Send `text` through `dest` in order, one segment at a time. Each segment's
/// delivery completes before the next begins.
pub async fn deliver_chunked(
    dest: &dyn Delivery,
    text: &str,
    max_len: usize,
) -> Result<(), MagpieError> {
    for segment in chunk(text, max_len) {
        dest.send(&segment).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::testing::RecordingSink;

    #[test]
    fn empty_text_yields_no_segments() {
        assert!(chunk("", 2000).is_empty());
    }

    #[test]
    fn short_text_is_one_segment() {
        assert_eq!(chunk("hello", 2000), vec!["hello"]);
    }

    #[test]
    fn concatenation_reconstructs_input() {
        let text = "abcdefghij".repeat(123);
        let segments = chunk(&text, 100);
        assert_eq!(segments.concat(), text);
    }

    #[test]
    fn segment_count_is_ceiling() {
        assert_eq!(chunk(&"x".repeat(4000), 2000).len(), 2);
        assert_eq!(chunk(&"x".repeat(4001), 2000).len(), 3);
        assert_eq!(chunk(&"x".repeat(1999), 2000).len(), 1);
    }

    #[test]
    fn every_segment_within_bound() {
        let segments = chunk(&"y".repeat(5005), 1000);
        assert!(segments.iter().all(|s| s.chars().count() <= 1000));
        assert_eq!(segments.last().unwrap().chars().count(), 5);
    }

    #[test]
    fn multibyte_characters_never_split() {
        let text = "héllø🦀".repeat(700);
        let segments = chunk(&text, 2000);
        assert!(segments.iter().all(|s| s.chars().count() <= 2000));
        assert_eq!(segments.concat(), text);
    }

    #[tokio::test]
    async fn delivery_preserves_order() {
        let sink = RecordingSink::new();
        deliver_chunked(&sink, &"ab".repeat(5), 4).await.unwrap();
        assert_eq!(sink.sent(), vec!["abab", "abab", "ab"]);
    }

    #[tokio::test]
    async fn empty_text_sends_nothing() {
        let sink = RecordingSink::new();
        deliver_chunked(&sink, "", 2000).await.unwrap();
        assert!(sink.sent().is_empty());
    }
}
