use serde::{Deserialize, Serialize};
use std::fmt;

/// Roster slot category for a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Goalkeeper => "GOALKEEPER",
            Role::Defender => "DEFENDER",
            Role::Midfielder => "MIDFIELDER",
            Role::Forward => "FORWARD",
        }
    }

    pub fn all() -> [Role; 4] {
        [
            Role::Goalkeeper,
            Role::Defender,
            Role::Midfielder,
            Role::Forward,
        ]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "GOALKEEPER" | "P" | "GK" => Ok(Role::Goalkeeper),
            "DEFENDER" | "D" => Ok(Role::Defender),
            "MIDFIELDER" | "C" | "M" => Ok(Role::Midfielder),
            "FORWARD" | "A" | "F" => Ok(Role::Forward),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// A player eligible for nomination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::try_from("defender").unwrap(), Role::Defender);
        assert_eq!(Role::try_from("A").unwrap(), Role::Forward);
        assert_eq!(Role::try_from("GK").unwrap(), Role::Goalkeeper);
        assert!(Role::try_from("LIBERO").is_err());
    }

    #[test]
    fn test_role_roundtrip() {
        for role in Role::all() {
            assert_eq!(Role::try_from(role.as_str()).unwrap(), role);
        }
    }
}
