// OpenDota API response types.
// Player summary and the rank medal derived from it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Rank medal, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    Unranked,
    Herald,
    Guardian,
    Crusader,
    Archon,
    Legend,
    Ancient,
    Divine,
    Immortal,
}

impl Rank {
    const ALL: [Rank; 9] = [
        Rank::Unranked,
        Rank::Herald,
        Rank::Guardian,
        Rank::Crusader,
        Rank::Archon,
        Rank::Legend,
        Rank::Ancient,
        Rank::Divine,
        Rank::Immortal,
    ];

    /// Medal for an OpenDota `rank_tier` (medal * 10 + stars).
    ///
    /// Anyone on the leaderboard is Immortal regardless of tier.
    pub fn from_tier(rank_tier: Option<u32>, leaderboard_rank: Option<u32>) -> Self {
        if leaderboard_rank.is_some_and(|rank| rank > 0) {
            return Rank::Immortal;
        }
        let medal = rank_tier.unwrap_or(0) / 10;
        let index = usize::try_from(medal).unwrap_or(usize::MAX).min(Self::ALL.len() - 1);
        Self::ALL[index]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Rank::Unranked => "Unranked",
            Rank::Herald => "Herald",
            Rank::Guardian => "Guardian",
            Rank::Crusader => "Crusader",
            Rank::Archon => "Archon",
            Rank::Legend => "Legend",
            Rank::Ancient => "Ancient",
            Rank::Divine => "Divine",
            Rank::Immortal => "Immortal",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Steam profile attached to a player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub account_id: u64,
    pub personaname: Option<String>,
    pub avatarfull: Option<String>,
}

/// `/players/{account_id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub rank_tier: Option<u32>,
    pub leaderboard_rank: Option<u32>,
    pub profile: Option<Profile>,
}

impl PlayerInfo {
    pub fn rank(&self) -> Rank {
        Rank::from_tier(self.rank_tier, self.leaderboard_rank)
    }
}
