//! Number list codec
//!
//! Translates marker-number text (`"4, 5"`, `"7-8"`, `"4,7-9"`) into integer
//! lists and back into minimal comma/range notation.

/// Characters accepted as a range separator inside a segment.
///
/// Documents arrive with plain hyphens as well as en/em dashes, depending on
/// the word processor that produced them.
const RANGE_SEPARATORS: [char; 3] = ['-', '\u{2013}', '\u{2014}'];

/// Parse a marker-number list into the integers it names, in input order.
///
/// Segments are comma-separated. A segment containing a dash is an inclusive
/// range; a bare segment is a single integer. Duplicates are kept and order
/// is preserved so a forward remap sees the numbers exactly as written.
///
/// Parsing is permissive: malformed numerals are skipped rather than fatal,
/// and a range whose end precedes its start (e.g. `"9-4"`) expands to
/// nothing. Stored documents contain such text and rejecting it here would
/// make previously-accepted citations unprocessable.
pub fn parse(text: &str) -> Vec<u32> {
    let mut numbers = Vec::new();

    for segment in text.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        match segment.find(RANGE_SEPARATORS) {
            Some(sep_idx) => {
                let sep_len = segment[sep_idx..]
                    .chars()
                    .next()
                    .map(char::len_utf8)
                    .unwrap_or(1);
                let start = segment[..sep_idx].trim().parse::<u32>();
                let end = segment[sep_idx + sep_len..].trim().parse::<u32>();

                if let (Ok(start), Ok(end)) = (start, end) {
                    // end < start yields an empty expansion
                    numbers.extend(start..=end);
                }
            }
            None => {
                if let Ok(n) = segment.parse::<u32>() {
                    numbers.push(n);
                }
            }
        }
    }

    numbers
}

/// De-duplicated, ascending view of a parsed list, used for recompression.
pub fn parse_unique_sorted(text: &str) -> Vec<u32> {
    let mut numbers = parse(text);
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}

/// Serialize a set of integers into minimal comma/range notation.
///
/// Sorts ascending, de-duplicates, and greedily merges maximal runs of
/// consecutive integers into `start-end` tokens. A run of three or more
/// compresses (`{4,5,6,8}` becomes `"4-6,8"`); a pair stays as two
/// comma-separated numbers (`{1,2}` becomes `"1,2"`), the way adjacent
/// markers are conventionally written. Empty input formats to the empty
/// string.
pub fn format(numbers: &[u32]) -> String {
    let mut sorted: Vec<u32> = numbers.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut tokens: Vec<String> = Vec::new();
    let mut i = 0;

    while i < sorted.len() {
        let start = sorted[i];
        let mut end = start;

        while i + 1 < sorted.len() && sorted[i + 1] == end + 1 {
            i += 1;
            end = sorted[i];
        }

        if end - start >= 2 {
            tokens.push(format!("{}-{}", start, end));
        } else {
            for n in start..=end {
                tokens.push(n.to_string());
            }
        }

        i += 1;
    }

    tokens.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_singles_and_ranges() {
        assert_eq!(parse("4, 5"), vec![4, 5]);
        assert_eq!(parse("7-8"), vec![7, 8]);
        assert_eq!(parse("4,7-9"), vec![4, 7, 8, 9]);
    }

    #[test]
    fn test_parse_preserves_order_and_duplicates() {
        assert_eq!(parse("9,2,2-3"), vec![9, 2, 2, 3]);
    }

    #[test]
    fn test_parse_unicode_dashes() {
        assert_eq!(parse("4\u{2013}6"), vec![4, 5, 6]);
        assert_eq!(parse("4\u{2014}6"), vec![4, 5, 6]);
    }

    #[test]
    fn test_parse_skips_malformed_segments() {
        assert_eq!(parse("4, five, 6"), vec![4, 6]);
        assert_eq!(parse("see above"), Vec::<u32>::new());
        assert_eq!(parse(""), Vec::<u32>::new());
    }

    #[test]
    fn test_parse_inverted_range_is_empty() {
        assert_eq!(parse("9-4"), Vec::<u32>::new());
        assert_eq!(parse("1,9-4,2"), vec![1, 2]);
    }

    #[test]
    fn test_format_merges_runs() {
        assert_eq!(format(&[4, 5, 6, 8]), "4-6,8");
        assert_eq!(format(&[8, 6, 5, 4]), "4-6,8");
        assert_eq!(format(&[3]), "3");
        assert_eq!(format(&[]), "");
    }

    #[test]
    fn test_format_keeps_pairs_uncompressed() {
        // {1,2} renders as "1,2"; only runs of three or more become ranges
        assert_eq!(format(&[2, 1]), "1,2");
        assert_eq!(format(&[1, 2, 4, 5]), "1,2,4,5");
        assert_eq!(format(&[1, 2, 3, 5, 6]), "1-3,5,6");
    }

    #[test]
    fn test_format_dedups() {
        assert_eq!(format(&[2, 2, 3, 3, 4]), "2-4");
    }

    #[test]
    fn test_round_trip() {
        // parse(format(S)) == sorted(dedup(S))
        let cases: Vec<Vec<u32>> = vec![
            vec![4, 5, 6, 8],
            vec![1],
            vec![10, 1, 5, 5, 2, 3],
            vec![],
            vec![100, 99, 98, 1],
        ];

        for set in cases {
            let mut expected = set.clone();
            expected.sort_unstable();
            expected.dedup();
            assert_eq!(parse(&format(&set)), expected);
        }
    }

    #[test]
    fn test_parse_roundtrip_of_compressed_text() {
        // Scenario: "4-6,8" -> [4,5,6,8]
        assert_eq!(parse("4-6,8"), vec![4, 5, 6, 8]);
    }
}
