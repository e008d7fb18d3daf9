use alloc::vec::Vec;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::*;

/// Valid transitions:
/// - Idle -> Playing
/// - Playing -> Won
/// - Playing -> Lost
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// Nothing clicked yet
    #[default]
    Idle,
    Playing,
    Won,
    Lost,
}

impl GameStatus {
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Indicates the game has ended and no moves can be made anymore
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// One game from first click to win or loss, holding the live board on behalf of a UI.
///
/// Until the first reveal the board is a placeholder without a safe zone, the first reveal
/// regenerates it around the clicked cell and keeps any flags placed so far.
#[derive(Clone, Debug)]
pub struct Session {
    difficulty: Difficulty,
    board: Board,
    status: GameStatus,
    awaiting_first_reveal: bool,
    rng: SmallRng,
}

impl Session {
    pub fn new(difficulty: Difficulty, seed: u64) -> Result<Self> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let board = RandomBoardGenerator::new(rng.random(), None).generate(difficulty.config())?;
        Ok(Self {
            difficulty,
            board,
            status: GameStatus::Idle,
            awaiting_first_reveal: true,
            rng,
        })
    }

    #[cfg(feature = "std")]
    pub fn from_entropy(difficulty: Difficulty) -> Result<Self> {
        Self::new(difficulty, rand::random())
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn config(&self) -> GameConfig {
        self.difficulty.config()
    }

    /// How many mines have not been flagged yet, may be negative
    pub fn flags_remaining(&self) -> isize {
        self.board.remaining_flags(self.config().mines)
    }

    /// Starts over with a new board, optionally switching difficulty.
    pub fn restart(&mut self, difficulty: Option<Difficulty>) -> Result<()> {
        let difficulty = difficulty.unwrap_or(self.difficulty);
        self.board =
            RandomBoardGenerator::new(self.rng.random(), None).generate(difficulty.config())?;
        self.difficulty = difficulty;
        self.status = GameStatus::Idle;
        self.awaiting_first_reveal = true;
        log::debug!("restarted as {:?}", difficulty);
        Ok(())
    }

    pub fn reveal(&mut self, coords: Coord2) -> Result<RevealOutcome> {
        self.check_not_finished()?;
        let coords = self.board.validate_coords(coords)?;

        if self.awaiting_first_reveal {
            if self.board.cell_at(coords)?.is_flagged() {
                return Ok(RevealOutcome::NoChange);
            }
            self.regenerate_around(coords)?;
            self.awaiting_first_reveal = false;
        }
        self.mark_started();

        let outcome = self.board.reveal(coords)?;
        match outcome {
            RevealOutcome::HitMine => {
                self.board.reveal_all_mines(Some(coords))?;
                self.end_game(false);
            }
            RevealOutcome::Revealed | RevealOutcome::NoChange => {
                if self.is_won() {
                    self.board.reveal_all_mines(None)?;
                    self.end_game(true);
                }
            }
        }
        Ok(outcome)
    }

    pub fn toggle_flag(&mut self, coords: Coord2) -> Result<MarkOutcome> {
        self.check_not_finished()?;
        let outcome = self.board.toggle_flag(coords)?;
        self.mark_started();
        Ok(outcome)
    }

    /// `Board::check_win` accepts a board where wrongly flagged safe cells hide nothing and rejects
    /// one where only unflagged mines are left, the session instead wins once every safe cell is open.
    fn is_won(&self) -> bool {
        self.board.all_safe_revealed()
    }

    fn regenerate_around(&mut self, safe: Coord2) -> Result<()> {
        let flags: Vec<_> = self
            .board
            .iter()
            .filter(|(_, cell)| cell.is_flagged())
            .map(|(coords, _)| coords)
            .collect();

        let mut board =
            RandomBoardGenerator::new(self.rng.random(), Some(safe)).generate(self.config())?;
        for coords in flags {
            board.toggle_flag(coords)?;
        }
        self.board = board;
        Ok(())
    }

    fn mark_started(&mut self) {
        if self.status.is_idle() {
            log::debug!("game started");
            self.status = GameStatus::Playing;
        }
    }

    fn end_game(&mut self, won: bool) {
        if self.status.is_finished() {
            return;
        }

        self.status = if won {
            GameStatus::Won
        } else {
            GameStatus::Lost
        };
        log::debug!("game ended: {:?}", self.status);
    }

    fn check_not_finished(&self) -> Result<()> {
        if self.status.is_finished() {
            Err(GameError::AlreadyEnded)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn safe_cells(board: &Board) -> Vec<Coord2> {
        board
            .iter()
            .filter(|(_, cell)| !cell.is_mine())
            .map(|(coords, _)| coords)
            .collect()
    }

    fn first_mine(board: &Board) -> Coord2 {
        board
            .iter()
            .find(|(_, cell)| cell.is_mine())
            .map(|(coords, _)| coords)
            .unwrap()
    }

    #[test]
    fn starts_idle_with_preset_board() {
        let session = Session::new(Difficulty::Expert, 1).unwrap();

        assert_eq!(session.status(), GameStatus::Idle);
        assert_eq!(session.board().size(), (16, 30));
        assert_eq!(session.board().mine_count(), 99);
        assert_eq!(session.flags_remaining(), 99);
    }

    #[test]
    fn first_reveal_is_always_safe() {
        for seed in 0..50 {
            let mut session = Session::new(Difficulty::Beginner, seed).unwrap();

            assert_eq!(session.reveal((4, 4)), Ok(RevealOutcome::Revealed));
            assert_ne!(session.status(), GameStatus::Lost);
            for coords in safe_zone((4, 4), (9, 9)) {
                assert!(session.board().cell_at(coords).unwrap().is_revealed());
            }
        }
    }

    #[test]
    fn flag_starts_game_and_survives_first_reveal() {
        let mut session = Session::new(Difficulty::Beginner, 3).unwrap();

        assert_eq!(session.toggle_flag((8, 8)), Ok(MarkOutcome::Changed));
        assert_eq!(session.status(), GameStatus::Playing);
        assert_eq!(session.flags_remaining(), 9);

        // flagged cells cannot be the first reveal
        assert_eq!(session.reveal((8, 8)), Ok(RevealOutcome::NoChange));

        session.reveal((0, 0)).unwrap();
        assert!(session.board().cell_at((8, 8)).unwrap().is_flagged());
        assert!(session.board().cell_at((0, 0)).unwrap().is_revealed());
        assert_eq!(session.flags_remaining(), 9);
    }

    #[test]
    fn hitting_mine_loses_and_discloses_board() {
        let mut session = Session::new(Difficulty::Intermediate, 11).unwrap();
        session.reveal((0, 0)).unwrap();
        let mine = first_mine(session.board());

        assert_eq!(session.reveal(mine), Ok(RevealOutcome::HitMine));

        assert_eq!(session.status(), GameStatus::Lost);
        assert_eq!(session.board().exploded_mine(), Some(mine));
        assert!(
            session
                .board()
                .iter()
                .filter(|(_, cell)| cell.is_mine())
                .all(|(_, cell)| cell.is_revealed())
        );
        assert_eq!(session.reveal((0, 1)), Err(GameError::AlreadyEnded));
        assert_eq!(session.toggle_flag((0, 1)), Err(GameError::AlreadyEnded));
    }

    #[test]
    fn revealing_every_safe_cell_wins_without_flags() {
        let mut session = Session::new(Difficulty::Custom, 5).unwrap();
        session.reveal((5, 5)).unwrap();

        for coords in safe_cells(session.board()) {
            if !session.board().cell_at(coords).unwrap().is_revealed() {
                session.reveal(coords).unwrap();
            }
        }

        assert_eq!(session.status(), GameStatus::Won);
        assert_eq!(session.board().exploded_mine(), None);
        assert_eq!(session.board().hidden_count(), 0);
        assert_eq!(session.reveal((0, 0)), Err(GameError::AlreadyEnded));
    }

    #[test]
    fn flagging_every_cell_does_not_win() {
        let mut session = Session::new(Difficulty::Intermediate, 8).unwrap();
        session.reveal((4, 4)).unwrap();
        let hidden: Vec<_> = session
            .board()
            .iter()
            .filter(|(_, cell)| cell.is_hidden())
            .map(|(coords, _)| coords)
            .collect();

        for coords in hidden {
            session.toggle_flag(coords).unwrap();
        }
        session.reveal((4, 4)).unwrap();

        assert!(session.board().check_win(40));
        assert_eq!(session.status(), GameStatus::Playing);
        assert!(session.flags_remaining() < 0);
    }

    #[test]
    fn out_of_bounds_leaves_session_idle() {
        let mut session = Session::new(Difficulty::Beginner, 0).unwrap();

        assert_eq!(session.reveal((9, 0)), Err(GameError::OutOfBounds));
        assert_eq!(session.toggle_flag((0, 9)), Err(GameError::OutOfBounds));
        assert_eq!(session.status(), GameStatus::Idle);
    }

    #[test]
    fn restart_resets_and_switches_difficulty() {
        let mut session = Session::new(Difficulty::Intermediate, 2).unwrap();
        session.reveal((0, 0)).unwrap();
        let mine = first_mine(session.board());
        session.reveal(mine).unwrap();
        assert!(session.is_finished());

        session.restart(Some(Difficulty::Expert)).unwrap();

        assert_eq!(session.status(), GameStatus::Idle);
        assert_eq!(session.difficulty(), Difficulty::Expert);
        assert_eq!(session.board().size(), (16, 30));
        assert_eq!(session.board().hidden_count(), 480);
        assert_eq!(session.reveal((15, 29)), Ok(RevealOutcome::Revealed));
    }
}
