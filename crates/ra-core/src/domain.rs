/// Alert category as announced by the upstream `alertTypeId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertKind {
    Rocket,
    HostileUav,
    /// Generic "red alert"; also the fallback for ids we do not recognize.
    Red,
}

impl AlertKind {
    pub fn from_type_id(id: i64) -> Self {
        match id {
            1 => Self::Rocket,
            2 => Self::HostileUav,
            _ => Self::Red,
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            Self::Rocket => "Rocket alert",
            Self::HostileUav => "Hostile UAV alert",
            Self::Red => "Red alert",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Rocket => "🚀",
            Self::HostileUav => "🛩️",
            Self::Red => "🚨",
        }
    }
}

/// A single location entry inside an alert.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Occurrence {
    pub name_local: String,
    pub name_foreign: Option<String>,
    pub district_local: Option<String>,
    pub district_foreign: Option<String>,
    pub timestamp: String,
    pub city_id: Option<i64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub countdown_secs: Option<u32>,
}

impl Occurrence {
    /// Foreign (English) name when present, local name otherwise.
    pub fn display_name(&self) -> &str {
        non_blank(self.name_foreign.as_deref()).unwrap_or(&self.name_local)
    }

    pub fn display_area(&self) -> Option<&str> {
        non_blank(self.district_foreign.as_deref())
            .or_else(|| non_blank(self.district_local.as_deref()))
    }

    pub fn has_name(&self) -> bool {
        !self.display_name().trim().is_empty()
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

/// One real-world alert carrying one or more occurrences, in upstream order.
#[derive(Clone, Debug, PartialEq)]
pub struct Alert {
    pub alert_type_id: i64,
    pub occurrences: Vec<Occurrence>,
}

impl Alert {
    pub fn kind(&self) -> AlertKind {
        AlertKind::from_type_id(self.alert_type_id)
    }

    /// Timestamp of the first occurrence (the header timestamp).
    pub fn timestamp(&self) -> &str {
        self.occurrences
            .first()
            .map(|o| o.timestamp.as_str())
            .unwrap_or("")
    }
}

/// Classified stream payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Alert(Alert),
    KeepAlive,
    Malformed { reason: String },
    Empty,
}

/// Lifecycle of the inbound stream connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Streaming,
    Idle,
    Errored,
}
