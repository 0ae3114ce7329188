//! Line protocol parser.
//!
//! One command per line, space-separated tokens:
//!
//! | Command      | Arguments                                         |
//! |--------------|---------------------------------------------------|
//! | `MOVE`       | speed accel steps direction                       |
//! | `MANUAL`     | fspeed faccel fsteps fdir bspeed baccel bsteps bdir |
//! | `RESET`      | —                                                 |
//! | `STOP`       | —                                                 |
//! | `BATCH_SIZE` | n                                                 |
//!
//! Direction is `0` (backward) or `1` (forward). Parsing is pure syntax;
//! a malformed line yields a typed error the ingestion loop logs and
//! ignores, leaving all state unchanged.

use quake_common::movement::{Direction, Movement};
use thiserror::Error;

/// A successfully parsed input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Enqueue an ordinary movement.
    Move(Movement),
    /// Enqueue a manual oscillation pair.
    Manual {
        forward: Movement,
        backward: Movement,
    },
    /// Urgent: halt and flush the queue.
    Stop,
    /// Urgent: trigger homing.
    Reset,
    /// Resize the command channel, discarding its contents.
    BatchSize(usize),
}

/// Parse failure on an input line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{command}: expected {expected} arguments, got {got}")]
    ArgCount {
        command: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{command}: invalid {field}: {value}")]
    InvalidArgument {
        command: &'static str,
        field: &'static str,
        value: String,
    },
}

/// Parse one line of the serial protocol.
pub fn parse_line(line: &str) -> Result<Request, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&keyword, args)) = tokens.split_first() else {
        return Err(ParseError::Empty);
    };

    match keyword {
        "MOVE" => {
            expect_args("MOVE", args, 4)?;
            Ok(Request::Move(parse_movement("MOVE", args)?))
        }
        "MANUAL" => {
            expect_args("MANUAL", args, 8)?;
            Ok(Request::Manual {
                forward: parse_movement("MANUAL", &args[..4])?,
                backward: parse_movement("MANUAL", &args[4..])?,
            })
        }
        "STOP" => {
            expect_args("STOP", args, 0)?;
            Ok(Request::Stop)
        }
        "RESET" => {
            expect_args("RESET", args, 0)?;
            Ok(Request::Reset)
        }
        "BATCH_SIZE" => {
            expect_args("BATCH_SIZE", args, 1)?;
            let capacity = parse_number::<usize>("BATCH_SIZE", "capacity", args[0])?;
            if capacity == 0 {
                return Err(ParseError::InvalidArgument {
                    command: "BATCH_SIZE",
                    field: "capacity",
                    value: args[0].to_string(),
                });
            }
            Ok(Request::BatchSize(capacity))
        }
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

fn expect_args(command: &'static str, args: &[&str], expected: usize) -> Result<(), ParseError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ParseError::ArgCount {
            command,
            expected,
            got: args.len(),
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    command: &'static str,
    field: &'static str,
    token: &str,
) -> Result<T, ParseError> {
    token.parse().map_err(|_| ParseError::InvalidArgument {
        command,
        field,
        value: token.to_string(),
    })
}

/// Parse `speed accel steps direction` into a `Movement`.
fn parse_movement(command: &'static str, args: &[&str]) -> Result<Movement, ParseError> {
    let target_speed = parse_number::<u32>(command, "speed", args[0])?;
    let acceleration = parse_number::<u32>(command, "acceleration", args[1])?;
    let step_count = parse_number::<i32>(command, "steps", args[2])?;
    let direction_bit = parse_number::<u8>(command, "direction", args[3])?;
    let direction =
        Direction::from_bit(direction_bit).ok_or_else(|| ParseError::InvalidArgument {
            command,
            field: "direction",
            value: args[3].to_string(),
        })?;
    Ok(Movement::new(target_speed, acceleration, step_count, direction))
}
