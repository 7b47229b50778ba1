use thiserror::Error;

pub const DEFAULT_STATUS_CYCLE: [&str; 3] = ["HTTCoin Accepted", "Coming Soon", "In Negotiation"];

pub const DEFAULT_LAUNCH_WINDOWS: [&str; 11] = [
    "Now Live",
    "Q1 2025",
    "Q2 2025",
    "Q3 2025",
    "Q4 2025",
    "Dec 1, 2025",
    "Q1 2026",
    "Q2 2026",
    "Q3 2026",
    "Q4 2026",
    "2027",
];

pub const DEFAULT_LAUNCH_STRIDE: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CycleError {
    #[error("Status cycle is empty")]
    EmptyStatusCycle,

    #[error("Launch window cycle is empty")]
    EmptyLaunchWindows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment<'a> {
    pub status: &'a str,
    pub launch_date: &'a str,
}

/// Display labels as a pure function of an accepted record's rank.
#[derive(Debug, Clone)]
pub struct MetadataCycler {
    status_cycle: Vec<String>,
    launch_windows: Vec<String>,
    launch_stride: usize,
}

impl MetadataCycler {
    pub fn new(
        status_cycle: Vec<String>,
        launch_windows: Vec<String>,
        launch_stride: usize,
    ) -> Result<Self, CycleError> {
        if status_cycle.is_empty() {
            return Err(CycleError::EmptyStatusCycle);
        }
        if launch_windows.is_empty() {
            return Err(CycleError::EmptyLaunchWindows);
        }
        Ok(Self {
            status_cycle,
            launch_windows,
            launch_stride,
        })
    }

    pub fn status_index(&self, rank: usize) -> usize {
        rank % self.status_cycle.len()
    }

    /// Steps through the windows `launch_stride` at a time.
    pub fn launch_index(&self, rank: usize) -> usize {
        rank.wrapping_mul(self.launch_stride) % self.launch_windows.len()
    }

    pub fn status(&self, rank: usize) -> &str {
        &self.status_cycle[self.status_index(rank)]
    }

    pub fn launch_date(&self, rank: usize) -> &str {
        &self.launch_windows[self.launch_index(rank)]
    }

    pub fn assign(&self, rank: usize) -> Assignment<'_> {
        Assignment {
            status: self.status(rank),
            launch_date: self.launch_date(rank),
        }
    }
}

impl Default for MetadataCycler {
    fn default() -> Self {
        Self {
            status_cycle: DEFAULT_STATUS_CYCLE.iter().map(|s| s.to_string()).collect(),
            launch_windows: DEFAULT_LAUNCH_WINDOWS.iter().map(|s| s.to_string()).collect(),
            launch_stride: DEFAULT_LAUNCH_STRIDE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_stride_sequence() {
        let cycler = MetadataCycler::default();
        let indices: Vec<_> = (0..11).map(|rank| cycler.launch_index(rank)).collect();
        assert_eq!(indices, vec![0, 3, 6, 9, 1, 4, 7, 10, 2, 5, 8]);
        // The sequence repeats after a full lap.
        assert_eq!(cycler.launch_index(11), 0);
        assert_eq!(cycler.launch_index(15), 1);
    }

    #[test]
    fn test_status_round_robin() {
        let cycler = MetadataCycler::default();
        let statuses: Vec<_> = (0..7).map(|rank| cycler.status(rank)).collect();
        assert_eq!(
            statuses,
            vec![
                "HTTCoin Accepted",
                "Coming Soon",
                "In Negotiation",
                "HTTCoin Accepted",
                "Coming Soon",
                "In Negotiation",
                "HTTCoin Accepted",
            ]
        );
    }

    #[test]
    fn test_assign_labels() {
        let cycler = MetadataCycler::default();
        assert_eq!(
            cycler.assign(0),
            Assignment {
                status: "HTTCoin Accepted",
                launch_date: "Now Live"
            }
        );
        assert_eq!(
            cycler.assign(4),
            Assignment {
                status: "Coming Soon",
                launch_date: "Q1 2025"
            }
        );
        assert_eq!(cycler.assign(7).launch_date, "2027");
    }

    #[test]
    fn test_custom_cycles() {
        let cycler = MetadataCycler::new(
            vec!["on".into(), "off".into()],
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            2,
        )
        .unwrap();
        let launches: Vec<_> = (0..4).map(|rank| cycler.launch_date(rank)).collect();
        assert_eq!(launches, vec!["a", "c", "a", "c"]);
        assert_eq!(cycler.status(3), "off");
    }

    #[test]
    fn test_empty_cycles_rejected() {
        assert_eq!(
            MetadataCycler::new(vec![], vec!["x".into()], 3).unwrap_err(),
            CycleError::EmptyStatusCycle
        );
        assert_eq!(
            MetadataCycler::new(vec!["x".into()], vec![], 3).unwrap_err(),
            CycleError::EmptyLaunchWindows
        );
    }
}
