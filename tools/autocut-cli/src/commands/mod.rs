pub mod check;
pub mod cut;
pub mod preview;

use autocut_processing::SelectionWindow;
use autocut_timeline::{RejectionSet, Timeline};

use crate::SelectionArgs;

impl SelectionArgs {
    /// Rejection set from `--filter` and `--default-fillers`.
    pub fn rejections(&self) -> anyhow::Result<RejectionSet> {
        let mut set = match &self.filter {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Filter file not found: {}", path.display());
                }
                RejectionSet::load(path)
                    .map_err(|e| anyhow::anyhow!("Failed to read filter file: {e}"))?
            }
            None => RejectionSet::new(),
        };
        if self.default_fillers {
            set.extend(RejectionSet::builtin_fillers());
        }
        Ok(set)
    }

    /// Window from `--start`/`--end`; `None` when neither is given.
    pub fn window(&self, timeline: &Timeline) -> Option<SelectionWindow> {
        if self.start.is_none() && self.end.is_none() {
            return None;
        }
        Some(SelectionWindow::new(
            self.start.unwrap_or(1),
            self.end.unwrap_or(timeline.len()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autocut_timeline::TimedEntry;
    use std::path::PathBuf;

    fn args(start: Option<usize>, end: Option<usize>) -> SelectionArgs {
        SelectionArgs {
            filter: None,
            default_fillers: false,
            start,
            end,
        }
    }

    #[test]
    fn test_window_defaults() {
        let timeline = Timeline::new(
            (1..=5)
                .map(|i| TimedEntry::new(i, i as f64, i as f64 + 0.5, "x"))
                .collect(),
        );
        assert_eq!(args(None, None).window(&timeline), None);
        assert_eq!(
            args(Some(2), None).window(&timeline),
            Some(SelectionWindow::new(2, 5))
        );
        assert_eq!(
            args(None, Some(3)).window(&timeline),
            Some(SelectionWindow::new(1, 3))
        );
    }

    #[test]
    fn test_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let filter = dir.path().join("filter.txt");
        std::fs::write(&filter, "好的\n").unwrap();

        let mut selection = args(None, None);
        selection.filter = Some(filter);
        selection.default_fillers = true;
        let set = selection.rejections().unwrap();
        assert!(set.contains("好的"));
        assert!(set.contains("嗯"));

        selection.filter = Some(PathBuf::from("/nonexistent/filter.txt"));
        assert!(selection.rejections().is_err());
    }
}
