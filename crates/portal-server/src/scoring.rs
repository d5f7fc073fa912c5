//! Scoring engine: point awards, level derivation, badge unlocks
//!
//! Points and levels are plain arithmetic over stored counters, recomputed
//! synchronously on every award. Awards are read-modify-write on purpose:
//! callers are responsible for awarding each qualifying action exactly once.
//! Pure counters (applications/posts/referrals, job views/applicants) are the
//! only values incremented atomically in SQL.

use crate::db::{queries, DbPool};
use crate::models::User;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// XP per level tier. `level = xp / LEVEL_STEP + 1`.
pub const LEVEL_STEP: i64 = 350;

/// Accounts registered while the platform had fewer than this many users
/// carry the early-adopter cohort flag.
pub const EARLY_BIRD_COHORT: i64 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PointAction {
    Apply,
    Post,
    Referral,
    Selected,
}

impl PointAction {
    pub fn points(self) -> i64 {
        match self {
            PointAction::Apply => 50,
            PointAction::Post => 100,
            PointAction::Referral => 75,
            PointAction::Selected => 200,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PointAction::Apply => "apply",
            PointAction::Post => "post",
            PointAction::Referral => "referral",
            PointAction::Selected => "selected",
        }
    }
}

pub fn level_for(xp: i64) -> i32 {
    (xp / LEVEL_STEP + 1) as i32
}

/// A badge unlock rule. Rules are evaluated independently, in declaration
/// order; a badge already present is never re-checked or removed.
pub struct BadgeRule {
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    earned: fn(&User) -> bool,
}

pub const BADGE_RULES: &[BadgeRule] = &[
    BadgeRule {
        name: "Campus Recruiter",
        description: "Posted 5+ opportunities",
        icon: "🎯",
        earned: |u| u.posts >= 5,
    },
    BadgeRule {
        name: "Top Helper",
        description: "Referred 8+ students",
        icon: "🤝",
        earned: |u| u.referrals >= 8,
    },
    BadgeRule {
        name: "Networking Pro",
        description: "Applied to 10+ positions",
        icon: "🌐",
        earned: |u| u.applications >= 10,
    },
    BadgeRule {
        name: "Early Bird",
        description: "First 50 platform users",
        icon: "🐦",
        earned: |u| u.early_bird,
    },
];

/// Badges the account qualifies for but does not yet hold, in rule order.
pub fn newly_earned(user: &User) -> Vec<&'static str> {
    BADGE_RULES
        .iter()
        .filter(|rule| (rule.earned)(user) && !user.badges.iter().any(|b| b == rule.name))
        .map(|rule| rule.name)
        .collect()
}

/// Adds `amount` points to the account, recomputes the level and persists
/// both. Returns `None` when the account does not exist. Not idempotent.
pub async fn award_points(pool: &DbPool, user_id: Uuid, amount: i64) -> Result<Option<User>> {
    if amount <= 0 {
        bail!("point award must be positive, got {}", amount);
    }

    let Some(user) = queries::get_user(pool, user_id).await? else {
        return Ok(None);
    };

    let xp = user.xp + amount;
    let level = level_for(xp);
    queries::set_user_score(pool, user_id, xp, level).await?;

    let mut updated = user;
    updated.xp = xp;
    updated.level = level;
    Ok(Some(updated))
}

/// Runs every unlock rule against the account's current counters and appends
/// the newly earned badges. Returns the appended names, `None` when the
/// account does not exist.
pub async fn evaluate_badges(pool: &DbPool, user_id: Uuid) -> Result<Option<Vec<String>>> {
    let Some(user) = queries::get_user(pool, user_id).await? else {
        return Ok(None);
    };

    let earned: Vec<String> = newly_earned(&user)
        .into_iter()
        .map(|name| name.to_string())
        .collect();

    if !earned.is_empty() {
        queries::append_badges(pool, user_id, &earned).await?;
    }
    Ok(Some(earned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn test_user() -> User {
        User {
            id: "u-1".to_string(),
            name: "Test".to_string(),
            email: "test@uni.edu".to_string(),
            role: Role::Student,
            university: Some("Test University".to_string()),
            avatar: None,
            bio: None,
            skills: vec![],
            resume: None,
            xp: 0,
            level: 1,
            badges: vec![],
            applications: 0,
            posts: 0,
            referrals: 0,
            early_bird: false,
            is_active: true,
            last_login: None,
            created_at: 0,
        }
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(349), 1);
        assert_eq!(level_for(350), 2);
        assert_eq!(level_for(699), 2);
        assert_eq!(level_for(700), 3);
    }

    #[test]
    fn test_seven_applications_reach_level_two() {
        let mut xp = 0;
        for _ in 0..7 {
            xp += PointAction::Apply.points();
        }
        assert_eq!(xp, 350);
        assert_eq!(level_for(xp), 2);
    }

    #[test]
    fn test_point_values() {
        assert_eq!(PointAction::Apply.points(), 50);
        assert_eq!(PointAction::Post.points(), 100);
        assert_eq!(PointAction::Referral.points(), 75);
        assert_eq!(PointAction::Selected.points(), 200);
    }

    #[test]
    fn test_badges_none_for_fresh_account() {
        let user = test_user();
        assert!(newly_earned(&user).is_empty());
    }

    #[test]
    fn test_badge_thresholds() {
        let mut user = test_user();
        user.posts = 4;
        assert!(newly_earned(&user).is_empty());
        user.posts = 5;
        assert_eq!(newly_earned(&user), vec!["Campus Recruiter"]);

        user.referrals = 8;
        user.applications = 10;
        assert_eq!(
            newly_earned(&user),
            vec!["Campus Recruiter", "Top Helper", "Networking Pro"]
        );
    }

    #[test]
    fn test_badges_already_held_not_reissued() {
        let mut user = test_user();
        user.applications = 10;
        user.posts = 4;
        user.badges = vec!["Networking Pro".to_string()];
        assert!(newly_earned(&user).is_empty());

        // Fifth posting unlocks the next badge without touching existing ones
        user.posts = 5;
        assert_eq!(newly_earned(&user), vec!["Campus Recruiter"]);
        assert_eq!(user.badges, vec!["Networking Pro".to_string()]);
    }

    #[test]
    fn test_early_bird_flag_drives_badge() {
        let mut user = test_user();
        assert!(newly_earned(&user).is_empty());
        user.early_bird = true;
        assert_eq!(newly_earned(&user), vec!["Early Bird"]);
    }

    #[test]
    fn test_rules_declared_in_award_order() {
        let names: Vec<_> = BADGE_RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec!["Campus Recruiter", "Top Helper", "Networking Pro", "Early Bird"]
        );
    }
}
