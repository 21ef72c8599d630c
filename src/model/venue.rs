use std::fmt;

/// One of the two derivatives venues this engine arbitrages between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Venue {
    A,
    B,
}

impl Venue {
    pub fn other(self) -> Venue {
        match self {
            Venue::A => Venue::B,
            Venue::B => Venue::A,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Venue::A => "venue_a",
            Venue::B => "venue_b",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate-limiter / metric scope a venue call falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Scope {
    MarketData,
    Order,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::MarketData => "market_data",
            Scope::Order => "order",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
