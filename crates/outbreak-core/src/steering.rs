use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::city::CityMap;
use crate::geometry::{Point, rotate};
use crate::npc::{NPC_RADIUS, Npc};
use crate::round::RoundStatus;
use crate::rules::GameRules;
use crate::time::{Timestamp, elapsed_ms};
use crate::world::World;

/// Distance under which an NPC counts as already at its target.
const ARRIVAL_EPSILON: f32 = 0.5;

/// Heading offsets tried, at half step, when the direct step is blocked.
const DEFLECTIONS: [f32; 4] = [FRAC_PI_4, -FRAC_PI_4, FRAC_PI_2, -FRAC_PI_2];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// True when the tick was gated off (not playing, or debounced).
    pub skipped: bool,
    pub moved: usize,
    pub hunting: usize,
    /// NPCs that disappeared before their new state could be written.
    pub missing: usize,
}

impl TickReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// The next state of one NPC.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Step {
    position: Point,
    target: Point,
    wander_cooldown: Timestamp,
    hunting: bool,
}

impl World {
    /// Advance every NPC by the time elapsed since its last move.
    pub fn npc_tick(&mut self, now: Timestamp) -> TickReport {
        let Some(round) = self.store.round() else {
            return TickReport::skipped();
        };
        if round.status != RoundStatus::Playing {
            return TickReport::skipped();
        }
        if let Some(last) = round.last_npc_update
            && elapsed_ms(last, now) < self.rules.npc_debounce_ms
        {
            tracing::debug!(last, now, "NPC tick debounced");
            return TickReport::skipped();
        }
        self.update_round(|r| r.last_npc_update = Some(now));

        let humans: Vec<Point> = self
            .active_players(now)
            .iter()
            .filter(|p| p.is_human())
            .map(|p| p.position())
            .collect();

        let mut report = TickReport::default();
        for npc in self.store.npcs() {
            let step = plan_step(&self.rules, &self.map, &mut self.rng, &npc, &humans, now);
            let result = self.store.patch_npc(npc.id, &mut |n| {
                n.x = step.position.x;
                n.y = step.position.y;
                n.target_x = step.target.x;
                n.target_y = step.target.y;
                n.last_move_time = now;
                n.wander_cooldown = step.wander_cooldown;
                n.hunting = step.hunting;
            });
            match result {
                Ok(()) => {
                    report.moved += 1;
                    if step.hunting {
                        report.hunting += 1;
                    }
                },
                Err(err) => {
                    tracing::debug!(npc_id = npc.id, %err, "NPC vanished mid-tick");
                    report.missing += 1;
                },
            }
        }
        report
    }
}

fn plan_step(
    rules: &GameRules,
    map: &CityMap,
    rng: &mut StdRng,
    npc: &Npc,
    humans: &[Point],
    now: Timestamp,
) -> Step {
    let dt = (elapsed_ms(npc.last_move_time, now) as f32 / 1000.0).min(rules.npc_max_delta_secs);
    let pos = npc.position();
    let prey = humans
        .iter()
        .copied()
        .filter(|h| pos.within(*h, rules.npc_detection_radius))
        .min_by(|a, b| pos.distance_sq(*a).total_cmp(&pos.distance_sq(*b)));

    // Between retargets the NPC keeps the mode it picked its target in.
    let mut target = npc.target();
    let mut wander_cooldown = npc.wander_cooldown;
    let mut hunting = npc.hunting;
    if now >= npc.wander_cooldown || pos.within(target, rules.npc_target_radius) {
        match prey {
            Some(human) => {
                target = hunt_target(rules, map, pos, human);
                wander_cooldown = now + rules.npc_hunt_retarget_ms;
            },
            None => {
                target = meander_target(rules, map, rng, pos);
                wander_cooldown = now + rules.npc_wander_retarget_ms;
            },
        }
        hunting = prey.is_some();
    }

    let speed = if hunting {
        npc.speed
    } else {
        npc.speed * rules.npc_meander_speed_factor
    };
    Step {
        position: advance(map, pos, target, speed * dt),
        target,
        wander_cooldown,
        hunting,
    }
}

/// Straight at the human when nothing is in the way, otherwise via the
/// waypoint that best trades distance-to-waypoint against waypoint-to-human.
fn hunt_target(rules: &GameRules, map: &CityMap, pos: Point, human: Point) -> Point {
    let samples = rules.path_probe_samples;
    if map.path_clear(pos, human, samples, NPC_RADIUS) {
        return human;
    }

    let cost = |wp: Point| pos.distance(wp) + rules.hunt_goal_weight * wp.distance(human);
    let open: Vec<Point> = map
        .waypoints
        .iter()
        .copied()
        .filter(|wp| !map.collides(*wp, NPC_RADIUS))
        .collect();

    let reachable = open
        .iter()
        .copied()
        .filter(|wp| map.path_clear(pos, *wp, samples, NPC_RADIUS));
    cheapest(reachable, cost)
        .or_else(|| cheapest(open.iter().copied(), cost))
        .unwrap_or(human)
}

fn cheapest(candidates: impl Iterator<Item = Point>, cost: impl Fn(Point) -> f32) -> Option<Point> {
    candidates.min_by(|a, b| cost(*a).total_cmp(&cost(*b)))
}

fn meander_target(rules: &GameRules, map: &CityMap, rng: &mut StdRng, pos: Point) -> Point {
    if map.waypoints.is_empty() {
        return pos;
    }
    let half = rules.waypoint_jitter / 2.0;
    let wp = map.waypoints[rng.random_range(0..map.waypoints.len())];
    let candidate = Point::new(
        wp.x + rng.random_range(-half..=half),
        wp.y + rng.random_range(-half..=half),
    )
    .clamp_to_world(NPC_RADIUS);

    let samples = rules.path_probe_samples;
    if map.path_clear(pos, candidate, samples, NPC_RADIUS) {
        return candidate;
    }

    let nearby: Vec<Point> = map
        .waypoints
        .iter()
        .copied()
        .filter(|w| pos.within(*w, rules.meander_search_radius) && !map.collides(*w, NPC_RADIUS))
        .collect();
    if nearby.is_empty() {
        return pos;
    }
    nearby[rng.random_range(0..nearby.len())]
}

/// Move up to `step` units towards `target`, sliding around buildings. The
/// result never collides unless `pos` itself already did.
fn advance(map: &CityMap, pos: Point, target: Point, step: f32) -> Point {
    let distance = pos.distance(target);
    if distance <= ARRIVAL_EPSILON || step <= 0.0 {
        return pos;
    }
    let dir = ((target.x - pos.x) / distance, (target.y - pos.y) / distance);
    let step = step.min(distance);

    let direct = Point::new(pos.x + dir.0 * step, pos.y + dir.1 * step).clamp_to_world(NPC_RADIUS);
    if !map.collides(direct, NPC_RADIUS) {
        return direct;
    }

    let half = step / 2.0;
    DEFLECTIONS
        .iter()
        .map(|angle| {
            let (dx, dy) = rotate(dir, *angle);
            Point::new(pos.x + dx * half, pos.y + dy * half).clamp_to_world(NPC_RADIUS)
        })
        .find(|p| !map.collides(*p, NPC_RADIUS))
        .unwrap_or(pos)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;

    use super::*;
    use crate::city::Building;
    use crate::error::StoreError;
    use crate::npc::NpcId;
    use crate::player::{Player, PlayerId};
    use crate::round::Round;
    use crate::store::{EntityStore, MemoryStore};
    use crate::test_helpers::{T0, join, open_world, place, seeded_world, spawn_npc_at, start_round};

    fn block(x: f32, y: f32, width: f32, height: f32) -> Building {
        Building {
            name: "block".to_string(),
            x,
            y,
            width,
            height,
        }
    }

    /// Memory store that loses one NPC between the read and the write of a tick.
    struct LosingStore {
        inner: MemoryStore,
        lost: NpcId,
    }

    impl EntityStore for LosingStore {
        fn insert_player(&mut self, player: Player) -> PlayerId {
            self.inner.insert_player(player)
        }
        fn player(&self, id: PlayerId) -> Option<Player> {
            self.inner.player(id)
        }
        fn patch_player(
            &mut self,
            id: PlayerId,
            patch: &mut dyn FnMut(&mut Player),
        ) -> Result<(), StoreError> {
            self.inner.patch_player(id, patch)
        }
        fn delete_player(&mut self, id: PlayerId) -> Result<Player, StoreError> {
            self.inner.delete_player(id)
        }
        fn players(&self) -> Vec<Player> {
            self.inner.players()
        }
        fn player_by_username(&self, username: &str) -> Option<Player> {
            self.inner.player_by_username(username)
        }
        fn player_by_connection(&self, connection_id: &str) -> Option<Player> {
            self.inner.player_by_connection(connection_id)
        }
        fn players_active_since(&self, cutoff: Timestamp) -> Vec<Player> {
            self.inner.players_active_since(cutoff)
        }
        fn insert_npc(&mut self, npc: Npc) -> NpcId {
            self.inner.insert_npc(npc)
        }
        fn npc(&self, id: NpcId) -> Option<Npc> {
            self.inner.npc(id)
        }
        fn patch_npc(
            &mut self,
            id: NpcId,
            patch: &mut dyn FnMut(&mut Npc),
        ) -> Result<(), StoreError> {
            if id == self.lost {
                return Err(StoreError::NotFound { table: "npcs", id });
            }
            self.inner.patch_npc(id, patch)
        }
        fn delete_npc(&mut self, id: NpcId) -> Result<Npc, StoreError> {
            self.inner.delete_npc(id)
        }
        fn npcs(&self) -> Vec<Npc> {
            self.inner.npcs()
        }
        fn round(&self) -> Option<Round> {
            self.inner.round()
        }
        fn put_round(&mut self, round: Round) {
            self.inner.put_round(round);
        }
        fn patch_round(&mut self, patch: &mut dyn FnMut(&mut Round)) -> Result<(), StoreError> {
            self.inner.patch_round(patch)
        }
        fn delete_round(&mut self) -> Option<Round> {
            self.inner.delete_round()
        }
    }

    #[test]
    fn tick_is_gated_on_playing() {
        let mut world = seeded_world(4);
        join(&mut world, "a", T0);
        assert!(world.npc_tick(T0).skipped);
    }

    #[test]
    fn tick_is_debounced() {
        let mut world = seeded_world(4);
        join(&mut world, "a", T0);
        join(&mut world, "b", T0);
        let started = start_round(&mut world, T0);

        let first = world.npc_tick(started + 100);
        assert!(!first.skipped);
        assert_eq!(first.moved, 5);
        assert!(world.npc_tick(started + 150).skipped);
        assert!(!world.npc_tick(started + 200).skipped);
        assert_eq!(world.round().unwrap().last_npc_update, Some(started + 200));
    }

    #[test]
    fn delta_time_is_capped() {
        let map = CityMap::open();
        let rules = GameRules::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut npc = Npc::spawn(Point::new(100.0, 300.0), 100.0, T0, T0 + 10_000);
        npc.target_x = 700.0;

        // 5 seconds since the last move still only buys 0.1 s of travel at
        // meander speed: 100 × 0.6 × 0.1 = 6 units.
        let step = plan_step(&rules, &map, &mut rng, &npc, &[], T0 + 5_000);
        assert!((step.position.x - 106.0).abs() < 1e-3);
        assert!(!step.hunting);
        assert_eq!(step.wander_cooldown, T0 + 10_000);
    }

    #[test]
    fn hunter_goes_straight_when_path_is_clear() {
        let map = CityMap::open();
        let rules = GameRules::default();
        let mut rng = StdRng::seed_from_u64(1);
        let npc = Npc::spawn(Point::new(100.0, 300.0), 100.0, T0, T0);
        let human = Point::new(200.0, 300.0);

        let step = plan_step(&rules, &map, &mut rng, &npc, &[human], T0 + 100);
        assert!(step.hunting);
        assert_eq!(step.target, human);
        assert_eq!(step.wander_cooldown, T0 + 100 + 2_000);
        // full speed: 100 × 0.1
        assert!((step.position.x - 110.0).abs() < 1e-3);
    }

    #[test]
    fn nearest_human_in_range_wins() {
        let map = CityMap::open();
        let rules = GameRules::default();
        let mut rng = StdRng::seed_from_u64(1);
        let npc = Npc::spawn(Point::new(400.0, 300.0), 100.0, T0, T0);
        let far = Point::new(400.0, 420.0);
        let near = Point::new(350.0, 300.0);
        let out_of_range = Point::new(400.0, 10.0);

        let step = plan_step(&rules, &map, &mut rng, &npc, &[far, out_of_range, near], T0 + 100);
        assert_eq!(step.target, near);
    }

    #[test]
    fn hunter_routes_around_buildings() {
        let map = CityMap::default();
        let rules = GameRules::default();
        // City Hall (20..170 × 20..140) sits between these two.
        let npc_at = Point::new(95.0, 165.0);
        let human = Point::new(95.0, 8.0);
        let target = hunt_target(&rules, &map, npc_at, human);
        assert_ne!(target, human);
        assert!(!map.collides(target, NPC_RADIUS));
    }

    #[test]
    fn retarget_waits_for_cooldown() {
        let map = CityMap::open();
        let rules = GameRules::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut npc = Npc::spawn(Point::new(100.0, 300.0), 100.0, T0, T0 + 1_000);
        npc.target_x = 300.0;

        let step = plan_step(&rules, &map, &mut rng, &npc, &[], T0 + 100);
        assert_eq!(step.target, Point::new(300.0, 300.0));

        // arriving at the target retargets early
        npc.target_x = 104.0;
        let step = plan_step(&rules, &map, &mut rng, &npc, &[], T0 + 100);
        assert_eq!(step.wander_cooldown, T0 + 100 + 5_000);
    }

    #[test]
    fn blocked_step_deflects() {
        let map = CityMap::default();
        // Just below City Hall's bottom edge (y = 140), heading straight up.
        let pos = Point::new(95.0, 151.0);
        let next = advance(&map, pos, Point::new(95.0, 60.0), 10.0);
        assert!(!map.collides(next, NPC_RADIUS));
        assert!(next.y >= pos.y - 5.0);
    }

    #[test]
    fn arrival_stops_movement() {
        let map = CityMap::open();
        let pos = Point::new(300.0, 300.0);
        assert_eq!(advance(&map, pos, Point::new(300.4, 300.0), 10.0), pos);
        let next = advance(&map, pos, Point::new(303.0, 300.0), 10.0);
        assert_eq!(next, Point::new(303.0, 300.0));
    }

    #[test]
    fn tick_moves_npcs_towards_humans() {
        let mut world = open_world(8);
        let a = join(&mut world, "a", T0);
        let b = join(&mut world, "b", T0);
        let started = start_round(&mut world, T0);
        let human = if world.store().player(a).unwrap().is_human() { a } else { b };
        place(&mut world, human, Point::new(400.0, 300.0));
        let npc_id = spawn_npc_at(&mut world, Point::new(300.0, 300.0), started);

        let report = world.npc_tick(started + 100);
        assert!(report.hunting >= 1);
        let npc = world.store().npc(npc_id).unwrap();
        assert!(npc.x > 300.0);
        assert_eq!(npc.last_move_time, started + 100);
        assert_eq!(npc.target(), Point::new(400.0, 300.0));
    }

    #[test]
    fn vanished_npc_is_skipped_and_the_rest_move() {
        let store = LosingStore {
            inner: MemoryStore::new(),
            lost: 3,
        };
        let mut world = World::with_store(
            Box::new(store),
            GameRules::default(),
            CityMap::default(),
            StdRng::seed_from_u64(4),
        );
        join(&mut world, "a", T0);
        join(&mut world, "b", T0);
        let started = start_round(&mut world, T0);
        assert_eq!(world.store().npcs().len(), 5);

        let report = world.npc_tick(started + 100);
        assert!(!report.skipped);
        assert_eq!((report.moved, report.missing), (4, 1));
        for npc in world.store().npcs() {
            let expected = if npc.id == 3 { started } else { started + 100 };
            assert_eq!(npc.last_move_time, expected, "npc {}", npc.id);
        }
    }

    #[test]
    fn blocked_meander_falls_back_to_nearby_waypoint() {
        // A wall between the NPC and every waypoint; only one waypoint is
        // within the search radius.
        let near = Point::new(200.0, 300.0);
        let map = CityMap {
            buildings: vec![block(140.0, 0.0, 20.0, 600.0)],
            spawn_points: Vec::new(),
            waypoints: vec![Point::new(700.0, 300.0), near],
        };
        let rules = GameRules {
            waypoint_jitter: 0.0,
            ..GameRules::default()
        };
        let pos = Point::new(100.0, 300.0);
        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(meander_target(&rules, &map, &mut rng, pos), near);
        }
    }

    #[test]
    fn meander_holds_when_no_waypoint_qualifies() {
        let map = CityMap {
            buildings: vec![block(140.0, 0.0, 20.0, 600.0)],
            spawn_points: Vec::new(),
            waypoints: vec![Point::new(700.0, 300.0)],
        };
        let rules = GameRules {
            waypoint_jitter: 0.0,
            ..GameRules::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let pos = Point::new(100.0, 300.0);
        assert_eq!(meander_target(&rules, &map, &mut rng, pos), pos);

        let npc = Npc::spawn(pos, 100.0, T0, T0);
        let step = plan_step(&rules, &map, &mut rng, &npc, &[], T0 + 100);
        assert_eq!(step.target, pos);
        assert_eq!(step.position, pos);
    }

    #[test]
    fn boxed_in_npc_stays_put() {
        // Four blocks flush against a 20×20 pocket around (300, 300).
        let map = CityMap {
            buildings: vec![
                block(270.0, 250.0, 20.0, 100.0),
                block(310.0, 250.0, 20.0, 100.0),
                block(250.0, 270.0, 100.0, 20.0),
                block(250.0, 310.0, 100.0, 20.0),
            ],
            spawn_points: Vec::new(),
            waypoints: Vec::new(),
        };
        let pos = Point::new(300.0, 300.0);
        assert!(!map.collides(pos, NPC_RADIUS));
        for target in [
            Point::new(400.0, 300.0),
            Point::new(300.0, 100.0),
            Point::new(150.0, 450.0),
        ] {
            assert_eq!(advance(&map, pos, target, 10.0), pos);
        }
    }

    #[test]
    fn mode_sticks_until_retarget() {
        let map = CityMap::open();
        let rules = GameRules::default();
        let mut rng = StdRng::seed_from_u64(1);
        let human = Point::new(150.0, 300.0);

        // Meandering towards a far point; a human comes into view before the
        // cooldown ends. Still meander speed, not counted as hunting.
        let mut npc = Npc::spawn(Point::new(100.0, 300.0), 100.0, T0, T0 + 5_000);
        npc.target_x = 100.0;
        npc.target_y = 500.0;
        let step = plan_step(&rules, &map, &mut rng, &npc, &[human], T0 + 100);
        assert!(!step.hunting);
        assert_eq!(step.target, Point::new(100.0, 500.0));
        assert!((step.position.y - 306.0).abs() < 1e-3);

        // Chasing with the human now gone: full speed until the next retarget.
        npc.hunting = true;
        let step = plan_step(&rules, &map, &mut rng, &npc, &[], T0 + 100);
        assert!(step.hunting);
        assert!((step.position.y - 310.0).abs() < 1e-3);

        // Once the cooldown runs out the mode follows what the NPC sees.
        let step = plan_step(&rules, &map, &mut rng, &npc, &[], T0 + 5_000);
        assert!(!step.hunting);
    }

    proptest! {
        #[test]
        fn npcs_never_enter_buildings(
            seed in any::<u64>(),
            start in (10.0f32..790.0, 10.0f32..590.0),
            human in (0.0f32..800.0, 0.0f32..600.0),
            target in (0.0f32..800.0, 0.0f32..600.0),
            elapsed in 0u64..500,
            cooldown in 0u64..4_000,
        ) {
            let map = CityMap::default();
            let pos = Point::new(start.0, start.1);
            prop_assume!(!map.collides(pos, NPC_RADIUS));

            let rules = GameRules::default();
            let mut rng = StdRng::seed_from_u64(seed);
            let mut npc = Npc::spawn(pos, 120.0, T0, T0 + cooldown);
            npc.target_x = target.0;
            npc.target_y = target.1;

            let mut now = T0;
            for _ in 0..20 {
                now += elapsed;
                let step = plan_step(&rules, &map, &mut rng, &npc, &[Point::new(human.0, human.1)], now);
                prop_assert!(!map.collides(step.position, NPC_RADIUS));
                npc.x = step.position.x;
                npc.y = step.position.y;
                npc.target_x = step.target.x;
                npc.target_y = step.target.y;
                npc.wander_cooldown = step.wander_cooldown;
                npc.hunting = step.hunting;
                npc.last_move_time = now;
            }
        }
    }
}
