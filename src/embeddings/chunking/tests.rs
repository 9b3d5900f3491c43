use super::*;
use crate::extract::Page;

fn settings(chunk_size: usize, overlap: usize) -> ChunkingSettings {
    ChunkingSettings {
        chunk_size,
        overlap,
    }
}

#[test]
fn repeated_character_document() {
    let text = "A".repeat(2000);

    let windows = sliding_windows(&text, 1000, 200);

    let offsets: Vec<usize> = windows.iter().map(|w| w.start).collect();
    let lengths: Vec<usize> = windows.iter().map(|w| w.text.chars().count()).collect();
    assert_eq!(offsets, vec![0, 800, 1600]);
    assert_eq!(lengths, vec![1000, 1000, 400]);
}

#[test]
fn windows_cover_input_with_increasing_offsets() {
    let text: String = (0..2345)
        .map(|i| char::from(b'a' + (i % 26) as u8))
        .collect();

    for (chunk_size, overlap) in [(1000, 200), (100, 0), (7, 3), (50, 49), (3000, 10)] {
        let windows = sliding_windows(&text, chunk_size, overlap);
        assert!(!windows.is_empty());

        for pair in windows.windows(2) {
            assert!(pair[0].start < pair[1].start);
            // Consecutive windows overlap or touch, so nothing is skipped
            assert!(pair[1].start <= pair[0].start + pair[0].text.chars().count());
        }

        assert_eq!(windows[0].start, 0);
        let last = windows.last().expect("at least one window");
        assert_eq!(last.start + last.text.chars().count(), text.chars().count());

        for window in &windows {
            let expected: String = text
                .chars()
                .skip(window.start)
                .take(window.text.chars().count())
                .collect();
            assert_eq!(window.text, expected);
        }
    }
}

#[test]
fn overlap_not_smaller_than_chunk_size_still_terminates() {
    let text = "abcdef";

    let windows = sliding_windows(text, 2, 5);

    let offsets: Vec<usize> = windows.iter().map(|w| w.start).collect();
    assert_eq!(offsets, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(windows[5].text, "f");
}

#[test]
fn zero_chunk_size_is_clamped() {
    let windows = sliding_windows("xyz", 0, 0);
    assert_eq!(windows.len(), 3);
    assert!(windows.iter().all(|w| w.text.chars().count() == 1));
}

#[test]
fn measured_in_characters_not_bytes() {
    let text = "héllo wörld ✓✓✓";

    let windows = sliding_windows(text, 5, 0);

    assert_eq!(windows[0].text, "héllo");
    assert_eq!(windows[1].text, " wörl");
    assert_eq!(windows[2].text, "d ✓✓✓");
    assert_eq!(windows.len(), 3);
}

#[test]
fn empty_text_has_no_windows() {
    assert!(sliding_windows("", 1000, 200).is_empty());
    assert!(chunk_text("", None, &settings(1000, 200)).is_empty());
}

#[test]
fn whitespace_windows_are_filtered() {
    let text = format!("{}{}", "x".repeat(10), " ".repeat(30));

    let chunks = chunk_text(&text, Some(4), &settings(10, 0));

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "x".repeat(10));
    assert_eq!(chunks[0].page_number, Some(4));
}

#[test]
fn unpaginated_document_is_page_one() {
    let document = ExtractedDocument {
        text: "Some plain text without any page information.".to_string(),
        pages: None,
    };

    let chunks = chunk_document(&document, &settings(20, 5));

    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.page_number == Some(1)));
}

#[test]
fn pages_are_chunked_independently() {
    let document = ExtractedDocument {
        text: "first page\u{c}second page".to_string(),
        pages: Some(vec![
            Page {
                number: 1,
                text: "first page".to_string(),
            },
            Page {
                number: 2,
                text: "   ".to_string(),
            },
            Page {
                number: 3,
                text: "second page".to_string(),
            },
        ]),
    };

    let chunks = chunk_document(&document, &settings(6, 0));

    let pages: Vec<Option<u32>> = chunks.iter().map(|c| c.page_number).collect();
    assert_eq!(pages, vec![Some(1), Some(1), Some(3), Some(3)]);
    assert_eq!(chunks[0].text, "first ");
    assert_eq!(chunks[1].text, "page");
    assert_eq!(chunks[2].text, "second");
}

#[test]
fn whitespace_only_document_has_no_chunks() {
    let document = ExtractedDocument {
        text: "\n\n   \t".to_string(),
        pages: None,
    };

    assert!(chunk_document(&document, &ChunkingSettings::default()).is_empty());
}
