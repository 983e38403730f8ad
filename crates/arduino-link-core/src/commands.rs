//! Character commands
//!
//! Interprets instruction tokens as character commands. The decoder itself
//! is opcode-agnostic; this is the layer a game loop sits on.

use crate::decoder::Instruction;

/// Ticks a `Run` command keeps the character moving forward
pub const RUN_TICKS: u32 = 100;

/// Forward input applied on each tick of a run
pub const RUN_FORWARD_SCALE: f32 = 0.07;

/// Yaw input applied by a single turn nudge
pub const YAW_NUDGE: f32 = 10.0;

/// Commands the board can send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Jump / climb ('J')
    Jump,

    /// Start a sustained forward run ('W')
    Run,

    /// Raise hands ('U')
    HandsUp,

    /// Lower hands ('D')
    HandsDown,

    /// Nudge the view left ('1')
    TurnLeft,

    /// Nudge the view right ('2')
    TurnRight,

    /// Anything else; carries the raw token
    Unknown(Instruction),
}

impl Command {
    /// Interpret a token by its first character
    pub fn from_instruction(instruction: Instruction) -> Self {
        match instruction.opcode() {
            'J' => Command::Jump,
            'W' => Command::Run,
            'U' => Command::HandsUp,
            'D' => Command::HandsDown,
            '1' => Command::TurnLeft,
            '2' => Command::TurnRight,
            _ => Command::Unknown(instruction),
        }
    }

    /// Opcode character, if this is a known command
    pub fn opcode(&self) -> Option<char> {
        match self {
            Command::Jump => Some('J'),
            Command::Run => Some('W'),
            Command::HandsUp => Some('U'),
            Command::HandsDown => Some('D'),
            Command::TurnLeft => Some('1'),
            Command::TurnRight => Some('2'),
            Command::Unknown(_) => None,
        }
    }
}

impl From<Instruction> for Command {
    fn from(instruction: Instruction) -> Self {
        Command::from_instruction(instruction)
    }
}

/// Effect a command has on the character for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Jump / climb
    Jump,
    /// Forward movement input for this tick
    MoveForward(f32),
    /// Raise hands
    HandsUp,
    /// Lower hands
    HandsDown,
    /// Yaw input in degrees; negative turns left
    AddYaw(f32),
}

/// Per-tick command state: a `Run` lasts [`RUN_TICKS`] ticks, during
/// which only `Jump` is honoured.
#[derive(Debug, Default, Clone)]
pub struct CommandInterpreter {
    run_ticks: Option<u32>,
}

impl CommandInterpreter {
    /// Idle interpreter, no run in progress
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a run is in progress
    pub fn is_running(&self) -> bool {
        self.run_ticks.is_some()
    }

    /// Advance one tick with the command polled this tick (if any)
    pub fn tick(&mut self, command: Option<Command>) -> Vec<Action> {
        let mut actions = Vec::new();

        if let Some(elapsed) = self.run_ticks {
            let elapsed = elapsed + 1;
            if elapsed < RUN_TICKS {
                actions.push(Action::MoveForward(RUN_FORWARD_SCALE));
                self.run_ticks = Some(elapsed);
            } else {
                self.run_ticks = None;
            }
            if command == Some(Command::Jump) {
                actions.push(Action::Jump);
            }
            return actions;
        }

        match command {
            Some(Command::Jump) => actions.push(Action::Jump),
            Some(Command::Run) => self.run_ticks = Some(0),
            Some(Command::HandsUp) => actions.push(Action::HandsUp),
            Some(Command::HandsDown) => actions.push(Action::HandsDown),
            Some(Command::TurnLeft) => actions.push(Action::AddYaw(-YAW_NUDGE)),
            Some(Command::TurnRight) => actions.push(Action::AddYaw(YAW_NUDGE)),
            Some(Command::Unknown(instruction)) => {
                tracing::debug!("ignoring unknown instruction {}", instruction);
            }
            None => {}
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(s: &str) -> Command {
        Command::from_instruction(Instruction::from_bytes(s.as_bytes()).unwrap())
    }

    #[test]
    fn test_opcodes_use_first_character() {
        assert_eq!(cmd("J1"), Command::Jump);
        assert_eq!(cmd("W9"), Command::Run);
        assert_eq!(cmd("U0"), Command::HandsUp);
        assert_eq!(cmd("D0"), Command::HandsDown);
        assert_eq!(cmd("1x"), Command::TurnLeft);
        assert_eq!(cmd("2x"), Command::TurnRight);
        assert!(matches!(cmd("Zz"), Command::Unknown(i) if i == "Zz"));
        assert_eq!(cmd("Zz").opcode(), None);
        assert_eq!(Command::Run.opcode(), Some('W'));
    }

    #[test]
    fn test_idle_commands() {
        let mut interp = CommandInterpreter::new();
        assert_eq!(interp.tick(Some(Command::Jump)), vec![Action::Jump]);
        assert_eq!(interp.tick(Some(Command::TurnLeft)), vec![Action::AddYaw(-10.0)]);
        assert_eq!(interp.tick(Some(Command::TurnRight)), vec![Action::AddYaw(10.0)]);
        assert_eq!(interp.tick(Some(Command::HandsUp)), vec![Action::HandsUp]);
        assert_eq!(interp.tick(Some(Command::HandsDown)), vec![Action::HandsDown]);
        assert!(interp.tick(None).is_empty());
        assert!(interp.tick(Some(cmd("??"))).is_empty());
    }

    #[test]
    fn test_run_lasts_fixed_ticks_and_only_allows_jump() {
        let mut interp = CommandInterpreter::new();
        assert!(interp.tick(Some(Command::Run)).is_empty());
        assert!(interp.is_running());

        let mut forward_ticks = 0;
        for i in 0..RUN_TICKS {
            let command = match i {
                5 => Some(Command::Jump),
                6 => Some(Command::TurnLeft),
                _ => None,
            };
            let actions = interp.tick(command);
            if actions.contains(&Action::MoveForward(RUN_FORWARD_SCALE)) {
                forward_ticks += 1;
            }
            if i == 5 {
                assert!(actions.contains(&Action::Jump));
            }
            assert!(!actions.iter().any(|a| matches!(a, Action::AddYaw(_))));
        }

        assert_eq!(forward_ticks, RUN_TICKS - 1);
        assert!(!interp.is_running());
        assert_eq!(interp.tick(Some(Command::HandsUp)), vec![Action::HandsUp]);
    }
}
