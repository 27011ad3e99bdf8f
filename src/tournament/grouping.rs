use crate::{
    db::models::{
        GroupMember, TournamentGroup, TournamentRegistration, TournamentStatus,
    },
    error::{AppError, Result},
};
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

use super::{
    context::TournamentContext,
    lifecycle::LifecycleEvent,
};

/// How confirmed registrants are ordered before partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingMethod {
    /// Ascending handicap; lowest handicap plays first
    Handicap,
    /// Uniform shuffle
    Random,
    /// Registration order preserved
    Seeded,
}

impl GroupingMethod {
    pub fn parse(s: &str) -> Self {
        match s {
            "handicap" => GroupingMethod::Handicap,
            "random" => GroupingMethod::Random,
            // "seeded" and anything else keep registration order
            _ => GroupingMethod::Seeded,
        }
    }
}

/// One computed group before it is written to the store.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub group_no: i32,
    pub tee_time: Option<String>,
    pub starting_hole: i32,
    pub members: Vec<GroupMember>,
}

/// Pure partition of confirmed registrants into play groups. The caller
/// applies the returned set as a full replacement of any existing groups.
pub fn compute_grouping<R: Rng>(
    registrations: &[TournamentRegistration],
    method: GroupingMethod,
    group_size: usize,
    tee_times: &[String],
    start_type: &str,
    rng: &mut R,
) -> Vec<GroupSpec> {
    let mut ordered: Vec<&TournamentRegistration> = registrations.iter().collect();

    match method {
        GroupingMethod::Handicap => {
            ordered.sort_by(|a, b| {
                a.handicap
                    .partial_cmp(&b.handicap)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.reg_no.cmp(&b.reg_no))
            });
        }
        GroupingMethod::Random => {
            ordered.shuffle(rng);
        }
        GroupingMethod::Seeded => {
            ordered.sort_by(|a, b| {
                a.registered_at
                    .cmp(&b.registered_at)
                    .then_with(|| a.reg_no.cmp(&b.reg_no))
            });
        }
    }

    let group_size = group_size.max(1);
    let shotgun = start_type == "shotgun";

    ordered
        .chunks(group_size)
        .enumerate()
        .map(|(i, chunk)| {
            let group_no = i as i32 + 1;
            let members = chunk
                .iter()
                .enumerate()
                .map(|(order, reg)| GroupMember {
                    reg_id: reg.id.clone(),
                    player_id: reg.player_id.clone(),
                    player_name: reg.player_name.clone(),
                    handicap: reg.handicap,
                    order_in_group: order as i32 + 1,
                })
                .collect();

            // All 18 holes round-robin for shotgun starts; hole 1 otherwise
            let starting_hole = if shotgun { (group_no - 1) % 18 + 1 } else { 1 };

            GroupSpec {
                group_no,
                tee_time: tee_times.get(i).cloned(),
                starting_hole,
                members,
            }
        })
        .collect()
}

/// Manual edits applied to one group without re-running the partition.
#[derive(Debug, Clone, Default)]
pub struct GroupUpdate {
    pub tee_time: Option<Option<String>>,
    pub starting_hole: Option<i32>,
    pub players: Option<Vec<GroupMember>>,
}

pub(crate) struct GroupingService {
    ctx: Arc<TournamentContext>,
}

impl GroupingService {
    pub(crate) fn new(ctx: Arc<TournamentContext>) -> Self {
        Self { ctx }
    }

    /// Replace all groups for the tournament. Destructive and (for
    /// non-random methods) idempotent; existing groups are dropped and the
    /// computed set written in their place, with assignments propagated
    /// back onto the registrations.
    pub(crate) async fn auto_group(
        &self,
        tournament_id: &str,
        method: GroupingMethod,
        group_size: Option<i32>,
    ) -> Result<(Vec<TournamentGroup>, Option<LifecycleEvent>)> {
        let lock = self.ctx.lock_for(tournament_id).await;
        let _guard = lock.lock().await;

        let tournament = self.ctx.load_tournament(tournament_id).await?;

        // Grouping starts from closed; re-running while already grouping is
        // legal and produces a full replacement set.
        if !matches!(
            tournament.status,
            TournamentStatus::Closed | TournamentStatus::Grouping
        ) {
            return Err(AppError::BadRequest(
                "Tournament must be closed before grouping".to_string(),
            ));
        }

        let registrations: Vec<TournamentRegistration> = sqlx::query_as(
            "SELECT * FROM tournament_registrations
             WHERE tournament_id = ? AND status = 'confirmed'
             ORDER BY reg_no",
        )
        .bind(tournament_id)
        .fetch_all(&*self.ctx.pool)
        .await?;

        if registrations.is_empty() {
            return Err(AppError::BadRequest(
                "No confirmed registrations to group".to_string(),
            ));
        }

        let group_size = group_size.unwrap_or(tournament.group_size).max(1) as usize;
        let specs = compute_grouping(
            &registrations,
            method,
            group_size,
            &tournament.tee_times.0,
            &tournament.start_type,
            &mut rand::thread_rng(),
        );

        sqlx::query("DELETE FROM tournament_groups WHERE tournament_id = ?")
            .bind(tournament_id)
            .execute(&*self.ctx.pool)
            .await?;

        // Registrations dropped from the field since the last run (e.g.
        // cancelled) must not keep pointers into the deleted groups.
        sqlx::query(
            "UPDATE tournament_registrations
             SET group_id = NULL, group_no = NULL, tee_time = NULL, starting_hole = NULL
             WHERE tournament_id = ?",
        )
        .bind(tournament_id)
        .execute(&*self.ctx.pool)
        .await?;

        let mut groups = Vec::with_capacity(specs.len());
        for spec in specs {
            let group = TournamentGroup::new(
                tournament_id.to_string(),
                spec.group_no,
                spec.tee_time,
                spec.starting_hole,
                spec.members,
            );

            sqlx::query(
                "INSERT INTO tournament_groups
                    (id, tournament_id, group_no, tee_time, starting_hole, players, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&group.id)
            .bind(&group.tournament_id)
            .bind(group.group_no)
            .bind(&group.tee_time)
            .bind(group.starting_hole)
            .bind(&group.players)
            .bind(&group.created_at)
            .execute(&*self.ctx.pool)
            .await?;

            for member in group.players.0.iter() {
                sqlx::query(
                    "UPDATE tournament_registrations
                     SET group_id = ?, group_no = ?, tee_time = ?, starting_hole = ?
                     WHERE id = ?",
                )
                .bind(&group.id)
                .bind(group.group_no)
                .bind(&group.tee_time)
                .bind(group.starting_hole)
                .bind(&member.reg_id)
                .execute(&*self.ctx.pool)
                .await?;
            }

            groups.push(group);
        }

        let was_closed = tournament.status == TournamentStatus::Closed;
        sqlx::query(
            "UPDATE tournaments SET group_count = ?, status = 'grouping', updated_at = ? WHERE id = ?",
        )
        .bind(groups.len() as i32)
        .bind(Utc::now().to_rfc3339())
        .bind(tournament_id)
        .execute(&*self.ctx.pool)
        .await?;

        tracing::info!(
            "Grouped tournament {} into {} groups of up to {}",
            tournament_id,
            groups.len(),
            group_size
        );

        // Entering grouping notifies confirmed registrants; a rerun while
        // already grouping does not re-announce.
        let event = if was_closed {
            let tournament = self.ctx.load_tournament(tournament_id).await?;
            let recipients = self.ctx.confirmed_player_ids(tournament_id).await?;
            Some(LifecycleEvent {
                event_type: "grouping_started",
                tournament,
                recipient_player_ids: recipients,
            })
        } else {
            None
        };

        Ok((groups, event))
    }

    /// Mutate one group in place; other groups and the partition are
    /// untouched.
    pub(crate) async fn update_group(
        &self,
        tournament_id: &str,
        group_no: i32,
        update: GroupUpdate,
    ) -> Result<TournamentGroup> {
        let mut group: TournamentGroup = sqlx::query_as(
            "SELECT * FROM tournament_groups WHERE tournament_id = ? AND group_no = ?",
        )
        .bind(tournament_id)
        .bind(group_no)
        .fetch_optional(&*self.ctx.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found".to_string()))?;

        if let Some(tee_time) = update.tee_time {
            group.tee_time = tee_time;
        }
        if let Some(starting_hole) = update.starting_hole {
            if !(1..=18).contains(&starting_hole) {
                return Err(AppError::Validation(
                    "startingHole must be between 1 and 18".to_string(),
                ));
            }
            group.starting_hole = starting_hole;
        }
        if let Some(players) = update.players {
            group.players.0 = players;
        }

        sqlx::query(
            "UPDATE tournament_groups SET tee_time = ?, starting_hole = ?, players = ?
             WHERE id = ?",
        )
        .bind(&group.tee_time)
        .bind(group.starting_hole)
        .bind(&group.players)
        .bind(&group.id)
        .execute(&*self.ctx.pool)
        .await?;

        // Keep registration assignments in step with the edited group
        for member in group.players.0.iter() {
            sqlx::query(
                "UPDATE tournament_registrations
                 SET group_id = ?, group_no = ?, tee_time = ?, starting_hole = ?
                 WHERE id = ?",
            )
            .bind(&group.id)
            .bind(group.group_no)
            .bind(&group.tee_time)
            .bind(group.starting_hole)
            .bind(&member.reg_id)
            .execute(&*self.ctx.pool)
            .await?;
        }

        self.ctx.touch_tournament(tournament_id).await?;

        Ok(group)
    }

    pub(crate) async fn list(&self, tournament_id: &str) -> Result<Vec<TournamentGroup>> {
        self.ctx.load_tournament(tournament_id).await?;

        let groups: Vec<TournamentGroup> = sqlx::query_as(
            "SELECT * FROM tournament_groups WHERE tournament_id = ? ORDER BY group_no",
        )
        .bind(tournament_id)
        .fetch_all(&*self.ctx.pool)
        .await?;

        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::RegistrationStatus;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn reg(no: i64, name: &str, handicap: f64) -> TournamentRegistration {
        let mut r = TournamentRegistration::new(
            "t1".to_string(),
            no,
            Some(format!("p{}", no)),
            name.to_string(),
            None,
            None,
            handicap,
            RegistrationStatus::Confirmed,
        );
        // Deterministic order for the seeded method
        r.registered_at = format!("2026-08-01T10:{:02}:00+00:00", no);
        r
    }

    #[test]
    fn handicap_method_sorts_ascending_and_chunks() {
        let regs = vec![
            reg(1, "High", 20.0),
            reg(2, "Low", 4.0),
            reg(3, "Mid", 12.0),
            reg(4, "Scratch", 0.0),
            reg(5, "Plus", 8.0),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let groups = compute_grouping(&regs, GroupingMethod::Handicap, 4, &[], "tee_times", &mut rng);

        assert_eq!(groups.len(), 2);
        let names: Vec<&str> = groups[0].members.iter().map(|m| m.player_name.as_str()).collect();
        assert_eq!(names, vec!["Scratch", "Low", "Plus", "Mid"]);
        assert_eq!(groups[1].members[0].player_name, "High");
        assert_eq!(groups[0].group_no, 1);
        assert_eq!(groups[1].group_no, 2);
        // order_in_group is 1-based within the chunk
        assert_eq!(groups[0].members[3].order_in_group, 4);
    }

    #[test]
    fn handicap_method_is_deterministic() {
        let regs: Vec<_> = (1..=9).map(|i| reg(i, &format!("P{}", i), (i * 3 % 7) as f64)).collect();
        let mut rng_a = ChaCha8Rng::seed_from_u64(1);
        let mut rng_b = ChaCha8Rng::seed_from_u64(99);

        let a = compute_grouping(&regs, GroupingMethod::Handicap, 3, &[], "tee_times", &mut rng_a);
        let b = compute_grouping(&regs, GroupingMethod::Handicap, 3, &[], "tee_times", &mut rng_b);

        let flatten = |groups: &[GroupSpec]| -> Vec<String> {
            groups
                .iter()
                .flat_map(|g| g.members.iter().map(|m| m.player_name.clone()))
                .collect()
        };
        assert_eq!(flatten(&a), flatten(&b));
    }

    #[test]
    fn seeded_method_preserves_registration_order() {
        let regs = vec![reg(1, "First", 30.0), reg(2, "Second", 1.0), reg(3, "Third", 15.0)];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let groups = compute_grouping(&regs, GroupingMethod::Seeded, 2, &[], "tee_times", &mut rng);

        assert_eq!(groups[0].members[0].player_name, "First");
        assert_eq!(groups[0].members[1].player_name, "Second");
        assert_eq!(groups[1].members[0].player_name, "Third");
    }

    #[test]
    fn tee_times_assigned_in_group_order_null_beyond() {
        let regs: Vec<_> = (1..=6).map(|i| reg(i, &format!("P{}", i), i as f64)).collect();
        let tee_times = vec!["08:00".to_string(), "08:10".to_string()];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let groups = compute_grouping(&regs, GroupingMethod::Seeded, 2, &tee_times, "tee_times", &mut rng);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].tee_time.as_deref(), Some("08:00"));
        assert_eq!(groups[1].tee_time.as_deref(), Some("08:10"));
        assert_eq!(groups[2].tee_time, None); // unscheduled beyond the array
        assert!(groups.iter().all(|g| g.starting_hole == 1));
    }

    #[test]
    fn shotgun_start_round_robins_all_18_holes() {
        let regs: Vec<_> = (1..=40).map(|i| reg(i, &format!("P{}", i), i as f64)).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let groups = compute_grouping(&regs, GroupingMethod::Seeded, 2, &[], "shotgun", &mut rng);

        assert_eq!(groups.len(), 20);
        assert_eq!(groups[0].starting_hole, 1);
        assert_eq!(groups[17].starting_hole, 18);
        assert_eq!(groups[18].starting_hole, 1); // wraps after hole 18
        assert_eq!(groups[19].starting_hole, 2);
    }

    #[test]
    fn random_method_keeps_everyone_exactly_once() {
        let regs: Vec<_> = (1..=10).map(|i| reg(i, &format!("P{}", i), i as f64)).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let groups = compute_grouping(&regs, GroupingMethod::Random, 4, &[], "tee_times", &mut rng);

        let mut names: Vec<String> = groups
            .iter()
            .flat_map(|g| g.members.iter().map(|m| m.player_name.clone()))
            .collect();
        names.sort();
        let mut expected: Vec<String> = (1..=10).map(|i| format!("P{}", i)).collect();
        expected.sort();
        assert_eq!(names, expected);
    }
}
