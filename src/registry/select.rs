//! Target selection strategies.
//!
//! Discovery finds every candidate; a strategy narrows them to the set
//! that actually gets built. Interactive selection is the default; the
//! `--latest` / `--newest` fast paths take everything.

use std::io::{self, Write};

use anyhow::Result;
use owo_colors::OwoColorize;

use super::Candidate;

/// Narrows discovered candidates to the selected target set.
///
/// An empty return is legal here; the caller turns it into the fatal
/// `NoTargetsSelected`.
pub trait SelectionStrategy {
    fn select(&self, candidates: &[Candidate]) -> Result<Vec<Candidate>>;
}

/// Take every discovered candidate (non-interactive runs).
pub struct SelectAll;

impl SelectionStrategy for SelectAll {
    fn select(&self, candidates: &[Candidate]) -> Result<Vec<Candidate>> {
        Ok(candidates.to_vec())
    }
}

/// Numbered stdin prompt; empty input or `a` takes everything.
pub struct InteractiveSelect;

impl SelectionStrategy for InteractiveSelect {
    fn select(&self, candidates: &[Candidate]) -> Result<Vec<Candidate>> {
        for (i, candidate) in candidates.iter().enumerate() {
            eprintln!("  {} {}", format!("{}.", i + 1).dimmed(), candidate.folder);
        }
        eprint!("Build which sizes? [all] ");
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        let Some(indices) = parse_selection(&input, candidates.len()) else {
            return Ok(Vec::new());
        };
        Ok(indices.into_iter().map(|i| candidates[i].clone()).collect())
    }
}

/// Parse a selection like `1,3` or `2 4` (1-based). Empty input, `a` and
/// `all` mean everything. Returns `None` when nothing valid was picked.
fn parse_selection(input: &str, len: usize) -> Option<Vec<usize>> {
    let input = input.trim().to_lowercase();
    if input.is_empty() || input == "a" || input == "all" {
        return Some((0..len).collect());
    }

    let mut indices: Vec<usize> = input
        .split([',', ' '])
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n >= 1 && n <= len)
        .map(|n| n - 1)
        .collect();

    indices.sort_unstable();
    indices.dedup();

    if indices.is_empty() { None } else { Some(indices) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn candidates(folders: &[&str]) -> Vec<Candidate> {
        folders
            .iter()
            .map(|f| Candidate {
                folder: (*f).to_string(),
                entry: PathBuf::from(format!("{f}/index.html")),
            })
            .collect()
    }

    #[test]
    fn test_parse_selection_empty_means_all() {
        assert_eq!(parse_selection("", 3), Some(vec![0, 1, 2]));
        assert_eq!(parse_selection("  \n", 3), Some(vec![0, 1, 2]));
        assert_eq!(parse_selection("all", 2), Some(vec![0, 1]));
        assert_eq!(parse_selection("A", 2), Some(vec![0, 1]));
    }

    #[test]
    fn test_parse_selection_numbers() {
        assert_eq!(parse_selection("1,3", 3), Some(vec![0, 2]));
        assert_eq!(parse_selection("2 3", 3), Some(vec![1, 2]));
        assert_eq!(parse_selection("3,3,1", 3), Some(vec![0, 2]));
    }

    #[test]
    fn test_parse_selection_out_of_range_dropped() {
        assert_eq!(parse_selection("2,9", 3), Some(vec![1]));
        assert_eq!(parse_selection("0,4", 3), None);
        assert_eq!(parse_selection("x", 3), None);
    }

    #[test]
    fn test_select_all_keeps_order() {
        let cands = candidates(&["160x600", "300x300", "728x90"]);
        let selected = SelectAll.select(&cands).unwrap();
        assert_eq!(selected, cands);
    }
}
