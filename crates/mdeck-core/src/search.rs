//! Search over the log buffer
//!
//! Matches are kept as ascending line indices. The pointer selects one of
//! them; "submit" walks toward older matches and "previous" toward newer ones,
//! both wrapping at the ends.

/// Derived match list for the committed query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchIndex {
    query: String,
    matches: Vec<usize>,
    pointer: Option<usize>,
    /// Bumped on every navigation so views can re-scroll to the same match
    navigation_tick: u64,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    pub fn pointer(&self) -> Option<usize> {
        self.pointer
    }

    pub fn navigation_tick(&self) -> u64 {
        self.navigation_tick
    }

    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }

    /// Buffer line index of the selected match
    pub fn current_line(&self) -> Option<usize> {
        self.pointer.and_then(|p| self.matches.get(p).copied())
    }

    /// Replace the committed query and recompute without preserving selection.
    pub fn set_query<'a>(&mut self, query: &str, lines: impl IntoIterator<Item = &'a str>) {
        self.query = query.to_string();
        self.recompute(lines, false, 0);
    }

    /// Drop query, matches and navigation history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Rebuild the match list from `lines`.
    ///
    /// With `preserve_selection`, the selected line is rebased by
    /// `removed_leading` evicted lines and stays selected if it still
    /// matches. Otherwise the newest match is selected.
    pub fn recompute<'a>(
        &mut self,
        lines: impl IntoIterator<Item = &'a str>,
        preserve_selection: bool,
        removed_leading: usize,
    ) {
        if self.query.is_empty() {
            self.matches.clear();
            self.pointer = None;
            return;
        }

        let previous_line = if preserve_selection {
            self.current_line()
                .and_then(|line| line.checked_sub(removed_leading))
        } else {
            None
        };

        let needle = self.query.to_lowercase();
        self.matches = lines
            .into_iter()
            .enumerate()
            .filter(|(_, line)| line.to_lowercase().contains(&needle))
            .map(|(index, _)| index)
            .collect();

        if self.matches.is_empty() {
            self.pointer = None;
            return;
        }

        if let Some(preserved) =
            previous_line.and_then(|line| self.matches.iter().position(|&m| m == line))
        {
            self.pointer = Some(preserved);
            return;
        }

        self.pointer = Some(self.matches.len() - 1);
    }

    /// Move toward older matches, wrapping from the oldest to the newest.
    pub fn submit(&mut self) {
        self.navigation_tick += 1;
        if self.matches.is_empty() {
            return;
        }
        let last = self.matches.len() - 1;
        self.pointer = Some(match self.pointer {
            None => last,
            Some(0) => last,
            Some(p) => p - 1,
        });
    }

    /// Move toward newer matches, wrapping from the newest to the oldest.
    pub fn previous(&mut self) {
        self.navigation_tick += 1;
        if self.matches.is_empty() {
            return;
        }
        let last = self.matches.len() - 1;
        self.pointer = Some(match self.pointer {
            None => 0,
            Some(p) if p >= last => 0,
            Some(p) => p + 1,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_for(lines: &[&str], query: &str) -> SearchIndex {
        let mut index = SearchIndex::new();
        index.set_query(query, lines.iter().copied());
        index
    }

    #[test]
    fn test_matches_are_case_insensitive() {
        let lines = ["Error: boom", "info", "an ERROR again", "error"];
        let index = index_for(&lines, "error");
        assert_eq!(index.matches(), &[0, 2, 3]);
        // newest match selected
        assert_eq!(index.pointer(), Some(2));
        assert_eq!(index.current_line(), Some(3));
    }

    #[test]
    fn test_empty_query_clears_matches() {
        let lines = ["a", "b"];
        let mut index = index_for(&lines, "a");
        assert!(index.has_matches());
        index.set_query("", lines.iter().copied());
        assert!(!index.has_matches());
        assert_eq!(index.pointer(), None);
    }

    #[test]
    fn test_no_matches_has_no_pointer() {
        let index = index_for(&["alpha", "beta"], "gamma");
        assert_eq!(index.matches(), &[] as &[usize]);
        assert_eq!(index.pointer(), None);
        assert_eq!(index.current_line(), None);
    }

    #[test]
    fn test_submit_walks_older_and_wraps() {
        let lines = ["hit", "miss", "hit", "hit"];
        let mut index = index_for(&lines, "hit");
        assert_eq!(index.matches(), &[0, 2, 3]);
        assert_eq!(index.pointer(), Some(2));

        let mut visited = Vec::new();
        for _ in 0..3 {
            index.submit();
            visited.push(index.pointer().unwrap());
        }
        assert_eq!(visited, vec![1, 0, 2]);
        assert_eq!(index.navigation_tick(), 3);
    }

    #[test]
    fn test_previous_walks_newer_and_wraps() {
        let lines = ["hit", "miss", "hit", "hit"];
        let mut index = index_for(&lines, "hit");
        assert_eq!(index.pointer(), Some(2));

        let mut visited = Vec::new();
        for _ in 0..3 {
            index.previous();
            visited.push(index.pointer().unwrap());
        }
        assert_eq!(visited, vec![0, 1, 2]);
    }

    #[test]
    fn test_navigation_without_matches_only_ticks() {
        let mut index = index_for(&["a"], "zzz");
        index.submit();
        index.previous();
        assert_eq!(index.pointer(), None);
        assert_eq!(index.navigation_tick(), 2);
    }

    #[test]
    fn test_selection_survives_truncation() {
        // 500 lines where only line 499 and line 10 match
        let mut lines: Vec<String> = (0..500).map(|i| format!("line {}", i)).collect();
        lines[10] = "needle early".to_string();
        lines[499] = "needle late".to_string();
        let mut index = SearchIndex::new();
        index.set_query("needle", lines.iter().map(String::as_str));
        assert_eq!(index.current_line(), Some(499));

        // one more line appended, index 0 evicted
        lines.remove(0);
        lines.push("line 500".to_string());
        index.recompute(lines.iter().map(String::as_str), true, 1);

        assert_eq!(index.current_line(), Some(498));
        assert_eq!(index.matches(), &[9, 498]);
    }

    #[test]
    fn test_selection_preserved_when_not_newest() {
        let mut lines = vec!["match a", "x", "match b"];
        let mut index = SearchIndex::new();
        index.set_query("match", lines.iter().copied());
        index.submit(); // select "match a" at line 0
        assert_eq!(index.current_line(), Some(0));

        lines.push("match c");
        index.recompute(lines.iter().copied(), true, 0);
        assert_eq!(index.current_line(), Some(0));
    }

    #[test]
    fn test_evicted_selection_falls_back_to_newest() {
        let mut lines = vec!["match a", "x", "match b"];
        let mut index = SearchIndex::new();
        index.set_query("match", lines.iter().copied());
        index.submit();
        assert_eq!(index.current_line(), Some(0));

        lines.remove(0);
        lines.push("match c");
        index.recompute(lines.iter().copied(), true, 1);
        assert_eq!(index.matches(), &[1, 2]);
        assert_eq!(index.current_line(), Some(2));
    }
}
