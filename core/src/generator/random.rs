use super::*;

/// Generation strategy that places mines uniformly at random, optionally keeping the 3x3 block
/// around a starting cell free of mines so the first reveal opens a cascade.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomBoardGenerator {
    seed: u64,
    safe_zone: Option<Coord2>,
}

impl RandomBoardGenerator {
    pub fn new(seed: u64, safe_zone: Option<Coord2>) -> Self {
        Self { seed, safe_zone }
    }
}

impl BoardGenerator for RandomBoardGenerator {
    fn generate(self, config: GameConfig) -> Result<Board> {
        use rand::prelude::*;

        // rejection sampling below only terminates when enough cells remain
        match self.safe_zone {
            Some(safe) => config.validate_safe_zone(safe)?,
            None => config.validate()?,
        }

        let (rows, cols) = config.size();
        let mut board = Board::empty(config.size());
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let mut mines_placed = 0;

        while mines_placed < config.mines {
            let coords = (rng.random_range(0..rows), rng.random_range(0..cols));
            if self
                .safe_zone
                .is_some_and(|safe| is_adjacent(coords, safe))
            {
                continue;
            }
            if board.place_mine(coords) {
                mines_placed += 1;
            }
        }

        log::debug!(
            "Generated {}x{} board with {} mines, seed: {}, safe zone: {:?}",
            rows,
            cols,
            mines_placed,
            self.seed,
            self.safe_zone
        );
        Ok(board)
    }
}

/// Generates a board from a fresh random seed.
#[cfg(feature = "std")]
pub fn create_board(config: GameConfig, safe_zone: Option<Coord2>) -> Result<Board> {
    RandomBoardGenerator::new(rand::random(), safe_zone).generate(config)
}
