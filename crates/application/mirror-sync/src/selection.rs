//! Patch-index selection parsing (spec §9 REDESIGN FLAGS): a sum type
//! instead of the original's "parse, or raise and let the caller catch
//! it a frame up" control flow, plus the *corrected* bounds/indexing the
//! spec's Open Questions ask for — validated against the patch list's own
//! length and `patch_list[i-1]`, not the selection count and `patch_list[i]`.
//!
//! Used both for "which patches to add" and "which newly-added patches are
//! one-time" (spec §6 CLI): same comma/whitespace-separated 1-based index
//! syntax in both prompts.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// User entered `c` (only meaningful for the "which to add" prompt).
    Cancel,
    /// User left the prompt blank.
    All,
    /// Parsed numeric indices, in the order they were entered. Not yet
    /// validated against a patch list's length — see `resolve_indices`.
    Indices(Vec<usize>),
}

pub fn parse_selection(input: &str) -> Selection {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("c") {
        return Selection::Cancel;
    }
    if trimmed.is_empty() {
        return Selection::All;
    }
    let indices = trimmed
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<usize>().ok())
        .collect();
    Selection::Indices(indices)
}

/// Partition 1-based indices into `(valid 0-based offsets, invalid
/// originals)` against a list of length `list_len`. An invalid index is
/// skipped, not fatal (spec §7: "Invalid user index in CLI selection" ->
/// "Skip that index, continue").
pub fn resolve_indices(indices: &[usize], list_len: usize) -> (Vec<usize>, Vec<usize>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for &i in indices {
        if i >= 1 && i <= list_len {
            valid.push(i - 1);
        } else {
            invalid.push(i);
        }
    }
    (valid, invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_selects_all() {
        assert_eq!(parse_selection(""), Selection::All);
        assert_eq!(parse_selection("   "), Selection::All);
    }

    #[test]
    fn c_cancels() {
        assert_eq!(parse_selection("c"), Selection::Cancel);
        assert_eq!(parse_selection(" C "), Selection::Cancel);
    }

    #[test]
    fn parses_comma_and_space_separated_indices() {
        assert_eq!(
            parse_selection("1, 3   5"),
            Selection::Indices(vec![1, 3, 5])
        );
    }

    #[test]
    fn resolve_bounds_against_list_length_not_selection_count() {
        // Regression for spec §9's Open Question: a 1-element selection
        // naming index 3 against a 5-patch list must be valid, even
        // though the *selection itself* only has one entry.
        let (valid, invalid) = resolve_indices(&[3], 5);
        assert_eq!(valid, vec![2]);
        assert!(invalid.is_empty());
    }

    #[test]
    fn resolve_indexes_zero_based_into_patch_list() {
        let (valid, _) = resolve_indices(&[1, 5], 5);
        assert_eq!(valid, vec![0, 4]);
    }

    #[test]
    fn resolve_rejects_out_of_range() {
        let (valid, invalid) = resolve_indices(&[0, 6], 5);
        assert!(valid.is_empty());
        assert_eq!(invalid, vec![0, 6]);
    }
}
