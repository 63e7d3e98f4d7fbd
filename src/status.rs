//! Component and incident status values, coupled to the Cachet API codes

/// Health of a monitored component. The discriminants are the wire codes
/// the Cachet API uses; the ordering is semantic: the greater the value,
/// the worse the state of the component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComponentStatus {
    Unknown = 0,
    Operational = 1,
    PerformanceIssues = 2,
    PartialOutage = 3,
    MajorOutage = 4,
}

impl ComponentStatus {
    /// The numeric code sent to and received from the Cachet API.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(ComponentStatus::Unknown),
            1 => Some(ComponentStatus::Operational),
            2 => Some(ComponentStatus::PerformanceIssues),
            3 => Some(ComponentStatus::PartialOutage),
            4 => Some(ComponentStatus::MajorOutage),
            _ => None,
        }
    }

    /// Maps a configured incident severity flag (`PARTIAL`, `MAJOR` or
    /// `PERFORMANCE`) to the component status an expectation reports when
    /// it fails.
    pub fn from_incident_flag(flag: &str) -> Option<Self> {
        match flag {
            "PARTIAL" => Some(ComponentStatus::PartialOutage),
            "MAJOR" => Some(ComponentStatus::MajorOutage),
            "PERFORMANCE" => Some(ComponentStatus::PerformanceIssues),
            _ => None,
        }
    }
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentStatus::Unknown => write!(f, "UNKNOWN"),
            ComponentStatus::Operational => write!(f, "OPERATIONAL"),
            ComponentStatus::PerformanceIssues => write!(f, "PERFORMANCE_ISSUES"),
            ComponentStatus::PartialOutage => write!(f, "PARTIAL_OUTAGE"),
            ComponentStatus::MajorOutage => write!(f, "MAJOR_OUTAGE"),
        }
    }
}

/// Lifecycle labels for incidents on the Cachet server. Only
/// `Investigating` (open) and `Fixed` (resolved) drive local branching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncidentStatus {
    Scheduled = 0,
    Investigating = 1,
    Identified = 2,
    Watching = 3,
    Fixed = 4,
}

impl IncidentStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}
