//! Progress bar display for the fetch phase

use indicatif::{ProgressBar, ProgressStyle};

/// Progress display over fetch groups (one tick per cloned repository)
pub struct FetchProgress {
    repo_pb: ProgressBar,
}

impl FetchProgress {
    /// Create a new progress display with total repository count
    pub fn new(total_repos: u64) -> Self {
        let style = ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        let repo_pb = ProgressBar::new(total_repos);
        repo_pb.set_style(style);

        Self { repo_pb }
    }

    /// Update to show the repository currently being fetched
    pub fn update_repo(&self, url: &str, current: usize, total: usize) {
        // Truncate long URLs for display
        let display_url = if url.len() > 50 {
            format!("...{}", &url[url.len() - 47..])
        } else {
            url.to_string()
        };
        self.repo_pb
            .set_message(format!("({current}/{total}) {display_url}"));
    }

    /// Increment repository progress
    pub fn inc_repo(&self) {
        self.repo_pb.inc(1);
    }

    /// Finish the bar
    pub fn finish(&self) {
        self.repo_pb.finish_and_clear();
    }

    /// Abandon on error
    pub fn abandon(&self) {
        self.repo_pb.abandon();
    }
}
