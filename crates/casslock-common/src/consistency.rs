//! Consistency levels accepted by the lock table store

use serde::{Deserialize, Serialize};

/// Read/write consistency level
///
/// The bakery lock is only correct when every read observes all prior
/// writes cluster-wide, i.e. with [`ConsistencyLevel::Quorum`] or stronger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsistencyLevel {
    Any,
    One,
    Two,
    Three,
    #[default]
    Quorum,
    LocalQuorum,
    EachQuorum,
    All,
    LocalOne,
    Serial,
    LocalSerial,
}

impl ConsistencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::Any => "any",
            ConsistencyLevel::One => "one",
            ConsistencyLevel::Two => "two",
            ConsistencyLevel::Three => "three",
            ConsistencyLevel::Quorum => "quorum",
            ConsistencyLevel::LocalQuorum => "local-quorum",
            ConsistencyLevel::EachQuorum => "each-quorum",
            ConsistencyLevel::All => "all",
            ConsistencyLevel::LocalOne => "local-one",
            ConsistencyLevel::Serial => "serial",
            ConsistencyLevel::LocalSerial => "local-serial",
        }
    }

    /// Whether reads at this level observe every acknowledged write
    pub fn is_quorum_or_stronger(&self) -> bool {
        matches!(
            self,
            ConsistencyLevel::Quorum
                | ConsistencyLevel::LocalQuorum
                | ConsistencyLevel::EachQuorum
                | ConsistencyLevel::All
                | ConsistencyLevel::Serial
                | ConsistencyLevel::LocalSerial
        )
    }
}

impl std::fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConsistencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "any" => Ok(ConsistencyLevel::Any),
            "one" | "1" => Ok(ConsistencyLevel::One),
            "two" | "2" => Ok(ConsistencyLevel::Two),
            "three" | "3" => Ok(ConsistencyLevel::Three),
            "quorum" => Ok(ConsistencyLevel::Quorum),
            "local-quorum" => Ok(ConsistencyLevel::LocalQuorum),
            "each-quorum" => Ok(ConsistencyLevel::EachQuorum),
            "all" => Ok(ConsistencyLevel::All),
            "local-one" => Ok(ConsistencyLevel::LocalOne),
            "serial" => Ok(ConsistencyLevel::Serial),
            "local-serial" => Ok(ConsistencyLevel::LocalSerial),
            _ => Err(format!("Invalid consistency level: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_quorum() {
        assert_eq!(ConsistencyLevel::default(), ConsistencyLevel::Quorum);
        assert!(ConsistencyLevel::default().is_quorum_or_stronger());
    }

    #[test]
    fn test_parse() {
        assert_eq!("one".parse::<ConsistencyLevel>().unwrap(), ConsistencyLevel::One);
        assert_eq!("1".parse::<ConsistencyLevel>().unwrap(), ConsistencyLevel::One);
        assert_eq!(
            "LOCAL_QUORUM".parse::<ConsistencyLevel>().unwrap(),
            ConsistencyLevel::LocalQuorum
        );
        assert_eq!(
            "each-quorum".parse::<ConsistencyLevel>().unwrap(),
            ConsistencyLevel::EachQuorum
        );
        assert!("sometimes".parse::<ConsistencyLevel>().is_err());
    }

    #[test]
    fn test_weak_levels() {
        assert!(!ConsistencyLevel::One.is_quorum_or_stronger());
        assert!(!ConsistencyLevel::Any.is_quorum_or_stronger());
        assert!(!ConsistencyLevel::LocalOne.is_quorum_or_stronger());
        assert!(ConsistencyLevel::All.is_quorum_or_stronger());
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        let level = ConsistencyLevel::LocalSerial;
        assert_eq!(level.to_string().parse::<ConsistencyLevel>().unwrap(), level);
    }
}
