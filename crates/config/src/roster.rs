//! Party roster: the two `owner_id → grid_id` entries.
//!
//! Replaces matching identities against literals in code. The partner of an
//! owner is simply the other entry.

use serde::{Deserialize, Serialize};
use splitgrid_core::OwnerId;

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub owner_id: OwnerId,
    pub grid_id: String,
    /// Display name (optional, for CLI output)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyRoster {
    parties: [Party; 2],
}

impl PartyRoster {
    pub fn new(parties: Vec<Party>) -> Result<Self, ConfigError> {
        let [a, b]: [Party; 2] = parties.try_into().map_err(|v: Vec<Party>| {
            ConfigError::Validation(format!("exactly 2 parties are required, found {}", v.len()))
        })?;

        for p in [&a, &b] {
            if p.owner_id.as_str().trim().is_empty() {
                return Err(ConfigError::Validation("party owner_id is empty".into()));
            }
            if p.grid_id.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "party '{}': grid_id is empty",
                    p.owner_id
                )));
            }
        }
        if a.owner_id == b.owner_id {
            return Err(ConfigError::Validation(format!(
                "both parties have owner_id '{}'",
                a.owner_id
            )));
        }
        if a.grid_id == b.grid_id {
            return Err(ConfigError::Validation(format!(
                "both parties write to grid '{}'",
                a.grid_id
            )));
        }

        Ok(Self { parties: [a, b] })
    }

    pub fn parties(&self) -> &[Party; 2] {
        &self.parties
    }

    pub fn owners(&self) -> [&OwnerId; 2] {
        [&self.parties[0].owner_id, &self.parties[1].owner_id]
    }

    pub fn party(&self, owner: &OwnerId) -> Result<&Party, ConfigError> {
        self.parties
            .iter()
            .find(|p| &p.owner_id == owner)
            .ok_or_else(|| ConfigError::UnknownOwner(owner.to_string()))
    }

    pub fn grid_for(&self, owner: &OwnerId) -> Result<&str, ConfigError> {
        self.party(owner).map(|p| p.grid_id.as_str())
    }

    pub fn partner_of(&self, owner: &OwnerId) -> Result<&Party, ConfigError> {
        match self.parties.iter().position(|p| &p.owner_id == owner) {
            Some(0) => Ok(&self.parties[1]),
            Some(_) => Ok(&self.parties[0]),
            None => Err(ConfigError::UnknownOwner(owner.to_string())),
        }
    }

    pub fn contains(&self, owner: &OwnerId) -> bool {
        self.parties.iter().any(|p| &p.owner_id == owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party(owner: &str, grid: &str) -> Party {
        Party { owner_id: owner.into(), grid_id: grid.into(), name: None }
    }

    #[test]
    fn partner_is_the_other_entry() {
        let roster = PartyRoster::new(vec![party("alice", "g-a"), party("bob", "g-b")]).unwrap();
        assert_eq!(roster.partner_of(&"alice".into()).unwrap().owner_id, "bob".into());
        assert_eq!(roster.partner_of(&"bob".into()).unwrap().owner_id, "alice".into());
        assert_eq!(roster.grid_for(&"bob".into()).unwrap(), "g-b");
    }

    #[test]
    fn unknown_owner() {
        let roster = PartyRoster::new(vec![party("alice", "g-a"), party("bob", "g-b")]).unwrap();
        assert!(matches!(
            roster.partner_of(&"carol".into()),
            Err(ConfigError::UnknownOwner(id)) if id == "carol"
        ));
        assert!(!roster.contains(&"carol".into()));
    }

    #[test]
    fn needs_exactly_two_distinct_parties() {
        assert!(PartyRoster::new(vec![party("alice", "g-a")]).is_err());
        assert!(PartyRoster::new(vec![
            party("alice", "g-a"),
            party("bob", "g-b"),
            party("carol", "g-c"),
        ])
        .is_err());
        assert!(PartyRoster::new(vec![party("alice", "g-a"), party("alice", "g-b")]).is_err());
        assert!(PartyRoster::new(vec![party("alice", "g"), party("bob", "g")]).is_err());
        assert!(PartyRoster::new(vec![party("alice", ""), party("bob", "g")]).is_err());
    }
}
