use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown flight status code: {0}")]
pub struct UnknownStatusCode(pub u8);

/// Status of a flight as established by oracle consensus
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlightStatus {
    #[default]
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl FlightStatus {
    /// Every status, in code order
    pub const ALL: [FlightStatus; 6] = [
        FlightStatus::Unknown,
        FlightStatus::OnTime,
        FlightStatus::LateAirline,
        FlightStatus::LateWeather,
        FlightStatus::LateTechnical,
        FlightStatus::LateOther,
    ];

    /// Wire code of this status
    pub fn code(self) -> u8 {
        match self {
            FlightStatus::Unknown => 0,
            FlightStatus::OnTime => 10,
            FlightStatus::LateAirline => 20,
            FlightStatus::LateWeather => 30,
            FlightStatus::LateTechnical => 40,
            FlightStatus::LateOther => 50,
        }
    }

    /// Look up a status by wire code
    pub fn from_code(code: u8) -> Result<Self, UnknownStatusCode> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.code() == code)
            .ok_or(UnknownStatusCode(code))
    }

    /// A status oracles can report and a flight can settle into
    pub fn is_terminal(self) -> bool {
        self != FlightStatus::Unknown
    }

    /// Only airline-caused delays pay out
    pub fn is_payable(self) -> bool {
        self == FlightStatus::LateAirline
    }
}

impl TryFrom<u8> for FlightStatus {
    type Error = UnknownStatusCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<FlightStatus> for u8 {
    fn from(status: FlightStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FlightStatus::Unknown => "UNKNOWN",
            FlightStatus::OnTime => "ON TIME",
            FlightStatus::LateAirline => "LATE AIRLINE",
            FlightStatus::LateWeather => "LATE WEATHER",
            FlightStatus::LateTechnical => "LATE TECHNICAL",
            FlightStatus::LateOther => "LATE OTHER",
        };
        write!(f, "{} ({})", label, self.code())
    }
}
