//! Line-oriented console controller.
//!
//! Each stdin line is one command. Controller commands go through the
//! server exactly like a paired controller's writes would; simulation
//! commands poke the mock hardware directly.

use garage_core::{
    CharacteristicType, CurrentDoorState, LockCurrentState, LockTargetState, Result, ServiceType,
    SessionId, TargetDoorState, Value,
};
use garage_hardware::DoorPosition;
use garage_hardware::mock::{MockDoorHandle, MockLockHandle};
use garage_server::AccessoryServer;
use std::str::FromStr;

pub const HELP: &str = "\
controller: open | close | lock | unlock | identify | status | list
simulation: obstruct | clear | push <open|closed> | fault <reason> | jam <reason>
            quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open,
    Close,
    Lock,
    Unlock,
    Identify,
    Status,
    List,
    Obstruct,
    Clear,
    Push(DoorPosition),
    Fault(String),
    Jam(String),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCommandError {
    #[error("unknown command `{0}`, try `help`")]
    Unknown(String),
    #[error("`{0}` expects {1}")]
    MissingArgument(&'static str, &'static str),
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let reason = |name| {
            if rest.is_empty() {
                Err(ParseCommandError::MissingArgument(name, "a reason"))
            } else {
                Ok(rest.to_string())
            }
        };

        match word.to_ascii_lowercase().as_str() {
            "open" => Ok(Command::Open),
            "close" => Ok(Command::Close),
            "lock" => Ok(Command::Lock),
            "unlock" => Ok(Command::Unlock),
            "identify" => Ok(Command::Identify),
            "status" => Ok(Command::Status),
            "list" => Ok(Command::List),
            "obstruct" => Ok(Command::Obstruct),
            "clear" => Ok(Command::Clear),
            "push" => match rest {
                "open" => Ok(Command::Push(DoorPosition::Open)),
                "closed" => Ok(Command::Push(DoorPosition::Closed)),
                _ => Err(ParseCommandError::MissingArgument("push", "`open` or `closed`")),
            },
            "fault" => reason("fault").map(Command::Fault),
            "jam" => reason("jam").map(Command::Jam),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            _ => Err(ParseCommandError::Unknown(word.to_string())),
        }
    }
}

/// What the input loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console<'a> {
    server: &'a AccessoryServer,
    door: MockDoorHandle,
    lock: MockLockHandle,
    session: SessionId,
}

impl<'a> Console<'a> {
    pub fn new(
        server: &'a AccessoryServer,
        door: MockDoorHandle,
        lock: MockLockHandle,
        session: SessionId,
    ) -> Self {
        Self {
            server,
            door,
            lock,
            session,
        }
    }

    /// Run one command, returning the text to show the operator.
    ///
    /// # Errors
    /// Whatever the server or the mock hardware reports.
    pub async fn execute(&self, command: Command) -> anyhow::Result<(Flow, String)> {
        let output = match command {
            Command::Open => self.write_target(
                CharacteristicType::TargetDoorState,
                TargetDoorState::Open.to_u8(),
            )?,
            Command::Close => self.write_target(
                CharacteristicType::TargetDoorState,
                TargetDoorState::Closed.to_u8(),
            )?,
            Command::Lock => self.write_target(
                CharacteristicType::LockTargetState,
                LockTargetState::Secured.to_u8(),
            )?,
            Command::Unlock => self.write_target(
                CharacteristicType::LockTargetState,
                LockTargetState::Unsecured.to_u8(),
            )?,
            Command::Identify => {
                self.server.identify();
                "identify requested".to_string()
            }
            Command::Status => self.status()?,
            Command::List => serde_json::to_string_pretty(&self.server.list_accessories())?,
            Command::Obstruct => {
                self.door.obstruct().await?;
                "obstruction sensor tripped".to_string()
            }
            Command::Clear => {
                self.door.clear_obstruction().await?;
                "obstruction sensor cleared".to_string()
            }
            Command::Push(position) => {
                self.door.move_externally(position).await?;
                format!("door pushed {position}")
            }
            Command::Fault(reason) => {
                self.door.fault(reason).await?;
                "drive fault reported".to_string()
            }
            Command::Jam(reason) => {
                self.lock.jam(reason).await?;
                "lock jam reported".to_string()
            }
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok((Flow::Quit, "bye".to_string())),
        };
        Ok((Flow::Continue, output))
    }

    fn write_target(&self, kind: CharacteristicType, value: u8) -> Result<String> {
        let id = self
            .server
            .characteristic_id(ServiceType::GarageDoorOpener, kind)?;
        self.server
            .handle_write(id, Value::Uint8(value), self.session)?;
        Ok(format!("{kind} <- {value}"))
    }

    fn read(&self, kind: CharacteristicType) -> Result<Value> {
        let id = self
            .server
            .characteristic_id(ServiceType::GarageDoorOpener, kind)?;
        self.server.handle_read(id, self.session)
    }

    fn status(&self) -> Result<String> {
        let state = |kind| -> Result<Option<u8>> { Ok(self.read(kind)?.as_u8()) };

        let door = state(CharacteristicType::CurrentDoorState)?.and_then(CurrentDoorState::from_u8);
        let target = state(CharacteristicType::TargetDoorState)?.and_then(TargetDoorState::from_u8);
        let lock = state(CharacteristicType::LockCurrentState)?.and_then(LockCurrentState::from_u8);
        let lock_target =
            state(CharacteristicType::LockTargetState)?.and_then(LockTargetState::from_u8);
        let obstructed = self.read(CharacteristicType::ObstructionDetected)?;

        Ok(format!(
            "door: {} (target {}), obstruction: {obstructed}, lock: {} (target {})",
            display(door),
            display(target),
            display(lock),
            display(lock_target),
        ))
    }
}

fn display<T: std::fmt::Display>(state: Option<T>) -> String {
    state.map_or_else(|| "?".to_string(), |s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use garage_hardware::mock::{MockDoor, MockLock};
    use garage_server::IdentifyHandler;
    use rstest::rstest;
    use std::sync::Arc;

    struct NoIdentify;

    impl IdentifyHandler for NoIdentify {
        fn identify(&self) {}
    }

    #[rstest]
    #[case("open", Command::Open)]
    #[case("  CLOSE ", Command::Close)]
    #[case("lock", Command::Lock)]
    #[case("unlock", Command::Unlock)]
    #[case("status", Command::Status)]
    #[case("push closed", Command::Push(DoorPosition::Closed))]
    #[case("fault motor overload", Command::Fault("motor overload".into()))]
    #[case("jam bolt stuck", Command::Jam("bolt stuck".into()))]
    #[case("?", Command::Help)]
    #[case("exit", Command::Quit)]
    fn test_parse_command(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(line.parse::<Command>().unwrap(), expected);
    }

    #[rstest]
    #[case("fly", ParseCommandError::Unknown("fly".into()))]
    #[case("push", ParseCommandError::MissingArgument("push", "`open` or `closed`"))]
    #[case("push sideways", ParseCommandError::MissingArgument("push", "`open` or `closed`"))]
    #[case("fault", ParseCommandError::MissingArgument("fault", "a reason"))]
    fn test_parse_command_errors(#[case] line: &str, #[case] expected: ParseCommandError) {
        assert_eq!(line.parse::<Command>().unwrap_err(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_writes_through_server() {
        let (door, door_handle) = MockDoor::new();
        let (lock, lock_handle) = MockLock::new();
        let server =
            AccessoryServer::start(Default::default(), door, lock, Arc::new(NoIdentify)).unwrap();
        let console = Console::new(&server, door_handle, lock_handle, SessionId::new());

        let (flow, _) = console.execute(Command::Open).await.unwrap();
        assert_eq!(flow, Flow::Continue);
        let id = server
            .characteristic_id(ServiceType::GarageDoorOpener, CharacteristicType::TargetDoorState)
            .unwrap();
        assert_eq!(server.handle_read(id, SessionId::new()).unwrap(), Value::Uint8(0));

        let (_, status) = console.execute(Command::Status).await.unwrap();
        assert!(status.contains("target open"), "{status}");

        let (flow, _) = console.execute(Command::Quit).await.unwrap();
        assert_eq!(flow, Flow::Quit);
    }
}
