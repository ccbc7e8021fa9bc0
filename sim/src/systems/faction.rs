//! Faction rules - who may harm whom.

use crate::components::Faction;

/// Whether an entity of `attacker` faction may damage one of `defender` faction.
///
/// Pure and stateless; consulted on every contact.
#[inline]
pub fn may_attack(attacker: Faction, defender: Faction) -> bool {
    match (attacker, defender) {
        // Kept separate from the same-faction rule so Wild sub-factions never infight.
        (Faction::Wild, Faction::Wild) => false,
        (a, d) if a == d => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_faction_never_attacks() {
        assert!(!may_attack(Faction::Wild, Faction::Wild));
        assert!(!may_attack(Faction::Player, Faction::Player));
    }

    #[test]
    fn test_cross_faction_attacks() {
        assert!(may_attack(Faction::Player, Faction::Wild));
        assert!(may_attack(Faction::Wild, Faction::Player));
    }
}
