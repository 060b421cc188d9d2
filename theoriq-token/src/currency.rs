use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::facts::FactError;

const LEGACY_USDC_CONTRACT: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
const LEGACY_USDT_CONTRACT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";

/// Settlement currency of a budget or cost, stored as its short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Currency {
    Usdc,
    Usdt,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usdc => "USDC",
            Currency::Usdt => "USDT",
        }
    }

    /// Accepts a short code in any case, or one of the ERC-20 contract
    /// addresses older tokens carried in place of the code.
    pub fn parse(value: &str) -> Result<Self, FactError> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "usdc" | LEGACY_USDC_CONTRACT => Ok(Currency::Usdc),
            "usdt" | LEGACY_USDT_CONTRACT => Ok(Currency::Usdt),
            _ => Err(FactError::UnknownCurrency(value.to_string())),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = FactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::parse(s)
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Currency::parse(&value).map_err(serde::de::Error::custom)
    }
}
