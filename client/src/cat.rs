//! Companion cat that trails its owner through the owner's position history.

use crate::player::Player;
use rand::Rng;
use shared::{CatInfo, CatType, Direction};

/// Pixels per frame.
pub const CAT_SPEED: f32 = 2.5;
pub const FOLLOW_OFFSET: usize = 20;
pub const CATCH_UP_DISTANCE: f32 = 35.0;
pub const SLEEP_AFTER_MS: f32 = 10_000.0;
pub const MEOW_MIN_MS: f32 = 5_000.0;
pub const MEOW_MAX_MS: f32 = 15_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatEvent {
    Meow,
    FellAsleep,
    WokeUp,
}

#[derive(Debug, Clone)]
pub struct Cat {
    /// Id of the player this cat follows. The game removes the cat together
    /// with its owner.
    pub owner_id: String,
    pub kind: CatType,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub direction: Direction,
    pub is_moving: bool,
    pub is_awake: bool,
    idle_ms: f32,
    meow_countdown_ms: f32,
}

impl Cat {
    pub fn new<R: Rng>(owner_id: impl Into<String>, info: &CatInfo, x: f32, y: f32, rng: &mut R) -> Self {
        let info = info.clone().normalized();
        Self {
            owner_id: owner_id.into(),
            kind: info.kind,
            name: info.name,
            x,
            y,
            direction: Direction::Down,
            is_moving: false,
            is_awake: true,
            idle_ms: 0.0,
            meow_countdown_ms: roll_meow_countdown(rng),
        }
    }

    pub fn info(&self) -> CatInfo {
        CatInfo {
            kind: self.kind,
            name: self.name.clone(),
        }
    }

    pub fn idle_ms(&self) -> f32 {
        self.idle_ms
    }

    /// Where the cat is heading: the owner's position `FOLLOW_OFFSET`
    /// samples ago, the oldest sample if the history is shorter, or the
    /// owner's live position with no history at all.
    pub fn target(&self, owner: &Player) -> (f32, f32) {
        let history = owner.history();
        history
            .back(FOLLOW_OFFSET)
            .or_else(|| history.oldest())
            .map(|sample| (sample.x, sample.y))
            .unwrap_or((owner.x, owner.y))
    }

    pub fn distance_to_target(&self, owner: &Player) -> f32 {
        let (tx, ty) = self.target(owner);
        (tx - self.x).hypot(ty - self.y)
    }

    /// Advances one frame behind `owner`.
    pub fn update<R: Rng>(&mut self, owner: &Player, dt_ms: f32, rng: &mut R) -> Option<CatEvent> {
        let (tx, ty) = self.target(owner);
        let (dx, dy) = (tx - self.x, ty - self.y);
        let distance = dx.hypot(dy);

        if distance > CATCH_UP_DISTANCE {
            let step = CAT_SPEED.min(distance);
            self.x += dx / distance * step;
            self.y += dy / distance * step;
            if let Some(direction) = Direction::from_vector(dx, dy) {
                self.direction = direction;
            }
            self.is_moving = true;
            self.idle_ms = 0.0;

            if !self.is_awake {
                self.is_awake = true;
                return Some(CatEvent::WokeUp);
            }
            return None;
        }

        self.is_moving = false;
        self.idle_ms += dt_ms;

        if !self.is_awake {
            return None;
        }

        if self.idle_ms >= SLEEP_AFTER_MS {
            self.is_awake = false;
            return Some(CatEvent::FellAsleep);
        }

        self.meow_countdown_ms -= dt_ms;
        if self.meow_countdown_ms <= 0.0 {
            self.meow_countdown_ms = roll_meow_countdown(rng);
            return Some(CatEvent::Meow);
        }

        None
    }
}

fn roll_meow_countdown<R: Rng>(rng: &mut R) -> f32 {
    rng.gen_range(MEOW_MIN_MS..=MEOW_MAX_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1)
    }

    fn orange() -> CatInfo {
        CatInfo::new(CatType::Orange, "")
    }

    #[test]
    fn test_new_cat_uses_default_name() {
        let cat = Cat::new("owner", &orange(), 1.0, 2.0, &mut rng());
        assert_eq!(cat.name, "Marmalade");
        assert!(cat.is_awake);
        assert!(!cat.is_moving);
        assert_eq!(cat.info(), CatInfo::new(CatType::Orange, "Marmalade"));
    }

    #[test]
    fn test_target_falls_back_to_live_position() {
        let owner = Player::new("owner", "O", 300.0, 200.0);
        let cat = Cat::new("owner", &orange(), 0.0, 0.0, &mut rng());
        assert_eq!(cat.target(&owner), (300.0, 200.0));
    }

    #[test]
    fn test_target_uses_oldest_sample_when_history_is_short() {
        let mut owner = Player::new("owner", "O", 0.0, 0.0);
        owner.set_input(1.0, 0.0);
        for _ in 0..5 {
            owner.update(16.0, None);
        }
        let cat = Cat::new("owner", &orange(), 0.0, 0.0, &mut rng());
        let (tx, _) = cat.target(&owner);
        assert_approx_eq!(tx, 3.0);
    }

    #[test]
    fn test_target_trails_by_follow_offset() {
        let mut owner = Player::new("owner", "O", 0.0, 0.0);
        owner.set_input(1.0, 0.0);
        for _ in 0..30 {
            owner.update(16.0, None);
        }
        let cat = Cat::new("owner", &orange(), 0.0, 0.0, &mut rng());
        let (tx, _) = cat.target(&owner);
        assert_approx_eq!(tx, owner.x - 3.0 * FOLLOW_OFFSET as f32);
    }

    #[test]
    fn test_distance_strictly_decreases_until_caught_up() {
        let owner = Player::new("owner", "O", 200.0, 150.0);
        let mut cat = Cat::new("owner", &orange(), 0.0, 0.0, &mut rng());
        let mut rng = rng();

        let mut previous = cat.distance_to_target(&owner);
        let mut frames = 0;
        while previous > CATCH_UP_DISTANCE {
            cat.update(&owner, 16.0, &mut rng);
            assert!(cat.is_moving);
            let distance = cat.distance_to_target(&owner);
            assert!(distance < previous);
            assert_approx_eq!(previous - distance, CAT_SPEED, 1e-3);
            previous = distance;
            frames += 1;
            assert!(frames < 1000);
        }

        cat.update(&owner, 16.0, &mut rng);
        assert!(!cat.is_moving);
        assert_approx_eq!(cat.distance_to_target(&owner), previous);
    }

    #[test]
    fn test_falls_asleep_after_idle_threshold() {
        let owner = Player::new("owner", "O", 10.0, 10.0);
        let mut cat = Cat::new("owner", &orange(), 10.0, 10.0, &mut rng());
        let mut rng = rng();

        let mut slept_at = None;
        for frame in 1..=200 {
            if cat.update(&owner, 100.0, &mut rng) == Some(CatEvent::FellAsleep) {
                slept_at = Some(frame);
                break;
            }
            assert!(cat.is_awake);
        }
        assert_eq!(slept_at, Some(100));
        assert!(!cat.is_awake);
        assert_approx_eq!(cat.idle_ms(), SLEEP_AFTER_MS);
    }

    #[test]
    fn test_wakes_and_resets_idle_when_moving() {
        let mut owner = Player::new("owner", "O", 10.0, 10.0);
        let mut cat = Cat::new("owner", &orange(), 10.0, 10.0, &mut rng());
        let mut rng = rng();
        for _ in 0..101 {
            cat.update(&owner, 100.0, &mut rng);
        }
        assert!(!cat.is_awake);

        owner.apply_remote(200.0, 10.0, Direction::Right, true);
        assert_eq!(cat.update(&owner, 16.0, &mut rng), Some(CatEvent::WokeUp));
        assert!(cat.is_awake);
        assert!(cat.is_moving);
        assert_eq!(cat.idle_ms(), 0.0);
        assert_eq!(cat.direction, Direction::Right);
    }

    #[test]
    fn test_meows_while_awake_and_idle() {
        let owner = Player::new("owner", "O", 10.0, 10.0);
        let mut cat = Cat::new("owner", &orange(), 10.0, 10.0, &mut rng());
        let mut rng = rng();

        let mut meows = 0;
        for frame in 0..400 {
            // Push the cat away now and then so it walks back and stays awake
            if frame % 50 == 0 {
                cat.x -= 40.0;
            }
            if cat.update(&owner, 100.0, &mut rng) == Some(CatEvent::Meow) {
                meows += 1;
            }
            assert!(cat.is_awake);
        }
        assert!((2..=8).contains(&meows), "{} meows", meows);

        while cat.is_awake {
            cat.update(&owner, 100.0, &mut rng);
        }
        for _ in 0..500 {
            assert_ne!(cat.update(&owner, 100.0, &mut rng), Some(CatEvent::Meow));
        }
    }
}
