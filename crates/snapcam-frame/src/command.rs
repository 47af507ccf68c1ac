use serde_json::{Map, Value};

use crate::error::{FrameError, Result};

/// JSON key carrying the opcode.
pub const TYPE_KEY: &str = "Type";

/// A camera command: opcode plus named arguments.
///
/// Serialized as the argument object with `"Type": opcode` added last (or
/// overwritten in place when the caller already supplied a `Type` key).
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    opcode: u8,
    args: Map<String, Value>,
}

impl Command {
    /// A command without arguments.
    pub fn new(opcode: u8) -> Self {
        Self {
            opcode,
            args: Map::new(),
        }
    }

    /// A command with an explicit argument map.
    pub fn with_args(opcode: u8, args: Map<String, Value>) -> Self {
        Self { opcode, args }
    }

    /// Build from an arbitrary JSON value. `null` means no arguments.
    pub fn from_value(opcode: u8, args: Value) -> Result<Self> {
        match args {
            Value::Object(args) => Ok(Self::with_args(opcode, args)),
            Value::Null => Ok(Self::new(opcode)),
            Value::Bool(_) => Err(FrameError::InvalidArgs("boolean")),
            Value::Number(_) => Err(FrameError::InvalidArgs("number")),
            Value::String(_) => Err(FrameError::InvalidArgs("string")),
            Value::Array(_) => Err(FrameError::InvalidArgs("array")),
        }
    }

    /// Add one argument.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn args(&self) -> &Map<String, Value> {
        &self.args
    }

    /// The JSON object sent on the wire.
    pub fn to_value(&self) -> Value {
        let mut fields = self.args.clone();
        fields.insert(TYPE_KEY.to_string(), Value::from(self.opcode));
        Value::Object(fields)
    }

    /// Compact JSON bytes of [`Command::to_value`].
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.to_value()).map_err(FrameError::Encode)
    }
}
