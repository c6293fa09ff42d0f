use std::fmt;

use crate::jid;

/// The eight winning lines, as board indices
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    fn symbol(self) -> &'static str {
        match self {
            Mark::X => "❌",
            Mark::O => "⭕",
        }
    }

    fn other(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    NotYourTurn,
    Occupied,
    InvalidCell,
    Finished,
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveError::NotYourTurn => write!(f, "It's not your turn."),
            MoveError::Occupied => write!(f, "That cell is already taken."),
            MoveError::InvalidCell => write!(f, "Pick a cell from 1 to 9."),
            MoveError::Finished => write!(f, "This game is already over."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The game goes on; `next` is the mark to play
    Continue { next: Mark },
    Win { mark: Mark, player: String },
    Draw,
}

/// A 3x3 board between the starter (X) and the first other player to move (O)
#[derive(Debug, Clone)]
pub struct TicTacToe {
    board: [Option<Mark>; 9],
    x: String,
    o: Option<String>,
    turn: Mark,
    finished: bool,
}

impl TicTacToe {
    pub fn new(starter: &str) -> Self {
        Self {
            board: [None; 9],
            x: jid::normalize(starter),
            o: None,
            turn: Mark::X,
            finished: false,
        }
    }

    pub fn player_x(&self) -> &str {
        &self.x
    }

    pub fn player_o(&self) -> Option<&str> {
        self.o.as_deref()
    }

    pub fn turn(&self) -> Mark {
        self.turn
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether `player` has a seat, or could take the open O seat with this move
    pub fn is_player(&self, player: &str) -> bool {
        if jid::same_user(player, &self.x) {
            return true;
        }
        match &self.o {
            Some(o) => jid::same_user(player, o),
            None => self.turn == Mark::O,
        }
    }

    /// Place the current mark at `cell` (1 to 9). O is claimed by the first
    /// player other than X to move on O's turn.
    pub fn play(&mut self, player: &str, cell: usize) -> Result<MoveOutcome, MoveError> {
        if self.finished {
            return Err(MoveError::Finished);
        }
        if !(1..=9).contains(&cell) {
            return Err(MoveError::InvalidCell);
        }
        let seat_ok = match self.turn {
            Mark::X => jid::same_user(player, &self.x),
            Mark::O => match &self.o {
                Some(o) => jid::same_user(player, o),
                None => !jid::same_user(player, &self.x),
            },
        };
        if !seat_ok {
            return Err(MoveError::NotYourTurn);
        }
        let idx = cell - 1;
        if self.board[idx].is_some() {
            return Err(MoveError::Occupied);
        }

        if self.turn == Mark::O && self.o.is_none() {
            self.o = Some(jid::normalize(player));
        }
        let mark = self.turn;
        self.board[idx] = Some(mark);

        if LINES
            .iter()
            .any(|line| line.iter().all(|&i| self.board[i] == Some(mark)))
        {
            self.finished = true;
            return Ok(MoveOutcome::Win {
                mark,
                player: jid::normalize(player),
            });
        }
        if self.board.iter().all(Option::is_some) {
            self.finished = true;
            return Ok(MoveOutcome::Draw);
        }
        self.turn = mark.other();
        Ok(MoveOutcome::Continue { next: self.turn })
    }

    pub fn render(&self) -> String {
        const EMPTY: [&str; 9] = ["1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣", "6️⃣", "7️⃣", "8️⃣", "9️⃣"];
        self.board
            .chunks(3)
            .enumerate()
            .map(|(row, cells)| {
                cells
                    .iter()
                    .enumerate()
                    .map(|(col, cell)| match cell {
                        Some(mark) => mark.symbol(),
                        None => EMPTY[row * 3 + col],
                    })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A bare cell number such as `5`
pub fn parse_cell(body: &str) -> Option<usize> {
    let trimmed = body.trim();
    if trimmed.len() != 1 {
        return None;
    }
    trimmed.parse().ok().filter(|c| (1..=9).contains(c))
}
