//! Membership Directory
//!
//! Fixed id -> address mapping, loaded once and shared read-only.

use std::collections::BTreeMap;

use super::NodeId;
use crate::error::{Error, Result};

/// Immutable mapping from node id to network address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDirectory {
    members: BTreeMap<NodeId, String>,
}

impl MembershipDirectory {
    /// Build a directory, rejecting duplicate ids and empty membership
    pub fn from_members<I>(members: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NodeId, String)>,
    {
        let mut map = BTreeMap::new();
        for (id, address) in members {
            if address.is_empty() {
                return Err(Error::Config(format!("member {} has an empty address", id)));
            }
            if map.insert(id, address).is_some() {
                return Err(Error::Config(format!("duplicate member id {}", id)));
            }
        }

        if map.is_empty() {
            return Err(Error::Config("cluster.members cannot be empty".into()));
        }

        Ok(Self { members: map })
    }

    /// Address of a member
    pub fn lookup(&self, id: NodeId) -> Option<&str> {
        self.members.get(&id).map(String::as_str)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains_key(&id)
    }

    /// All member ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.members.keys().copied()
    }

    /// All members in ascending id order
    pub fn members(&self) -> impl Iterator<Item = (NodeId, &str)> + '_ {
        self.members.iter().map(|(id, addr)| (*id, addr.as_str()))
    }

    /// Members ranked above `id`, ascending
    pub fn higher_than(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &str)> + '_ {
        self.members
            .range(id.saturating_add(1)..)
            .filter(move |(peer, _)| **peer > id)
            .map(|(peer, addr)| (*peer, addr.as_str()))
    }

    /// Every member except `id`
    pub fn others(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &str)> + '_ {
        self.members().filter(move |(peer, _)| *peer != id)
    }

    pub fn highest_id(&self) -> Option<NodeId> {
        self.members.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five() -> MembershipDirectory {
        MembershipDirectory::from_members(
            (1..=5).map(|id| (id, format!("127.0.0.1:{}", 2999 + id))),
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_and_order() {
        let dir = five();
        assert_eq!(dir.len(), 5);
        assert_eq!(dir.lookup(1), Some("127.0.0.1:3000"));
        assert_eq!(dir.lookup(6), None);
        assert_eq!(dir.highest_id(), Some(5));
        assert_eq!(dir.ids().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_higher_than() {
        let dir = five();
        let higher: Vec<NodeId> = dir.higher_than(2).map(|(id, _)| id).collect();
        assert_eq!(higher, vec![3, 4, 5]);
        assert_eq!(dir.higher_than(5).count(), 0);
        assert_eq!(dir.higher_than(NodeId::MAX).count(), 0);
    }

    #[test]
    fn test_others_excludes_self() {
        let dir = five();
        let others: Vec<NodeId> = dir.others(3).map(|(id, _)| id).collect();
        assert_eq!(others, vec![1, 2, 4, 5]);
    }

    #[test]
    fn test_rejects_bad_membership() {
        assert!(MembershipDirectory::from_members(Vec::new()).is_err());

        let dup = vec![(1, "a:1".to_string()), (1, "b:1".to_string())];
        assert!(MembershipDirectory::from_members(dup).is_err());

        let empty_addr = vec![(1, String::new())];
        assert!(MembershipDirectory::from_members(empty_addr).is_err());
    }
}
