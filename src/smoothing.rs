//! Majority vote over a sliding window of predicted labels.

use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 5;

/// Steadies a stream of per-frame predictions.
#[derive(Debug, Clone)]
pub struct MajorityVoteSmoother {
    window: usize,
    recent: VecDeque<String>,
}

impl Default for MajorityVoteSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl MajorityVoteSmoother {
    /// A window of zero is treated as one.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            recent: VecDeque::with_capacity(window),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn push(&mut self, label: impl Into<String>) {
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(label.into());
    }

    /// Most frequent label in the window; ties go to the tied label that
    /// appears earliest in the window.
    pub fn stable_label(&self) -> Option<&str> {
        // Counts in first-appearance order
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for label in &self.recent {
            match counts.iter_mut().find(|(seen, _)| *seen == label.as_str()) {
                Some((_, count)) => *count += 1,
                None => counts.push((label.as_str(), 1)),
            }
        }

        let mut best: Option<(&str, usize)> = None;
        for (label, count) in counts {
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((label, count));
            }
        }
        best.map(|(label, _)| label)
    }

    pub fn clear(&mut self) {
        self.recent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_has_no_label() {
        let smoother = MajorityVoteSmoother::default();
        assert_eq!(smoother.stable_label(), None);
    }

    #[test]
    fn majority_wins() {
        let mut smoother = MajorityVoteSmoother::new(5);
        for label in ["A", "B", "A", "C", "A"] {
            smoother.push(label);
        }
        assert_eq!(smoother.stable_label(), Some("A"));
    }

    #[test]
    fn ties_go_to_first_seen() {
        let mut smoother = MajorityVoteSmoother::new(4);
        for label in ["A", "B", "B", "A"] {
            smoother.push(label);
        }
        assert_eq!(smoother.stable_label(), Some("A"));

        smoother.clear();
        for label in ["B", "A", "A", "B"] {
            smoother.push(label);
        }
        assert_eq!(smoother.stable_label(), Some("B"));
    }

    #[test]
    fn first_seen_is_relative_to_window() {
        let mut smoother = MajorityVoteSmoother::new(4);
        for label in ["A", "B", "C", "A", "C"] {
            smoother.push(label);
        }
        // Window is B C A C: C wins outright
        assert_eq!(smoother.stable_label(), Some("C"));

        smoother.push("A");
        // Window is C A C A: tie, C entered the window first
        assert_eq!(smoother.stable_label(), Some("C"));
    }

    #[test]
    fn old_labels_fall_out_of_window() {
        let mut smoother = MajorityVoteSmoother::new(3);
        for label in ["A", "A", "A", "B", "B"] {
            smoother.push(label);
        }
        assert_eq!(smoother.stable_label(), Some("B"));

        smoother.clear();
        assert_eq!(smoother.stable_label(), None);
    }
}
