//! JSON request dispatch.
//!
//! A volume-plugin front end hands over `(cmd, name, opts)` and expects a
//! JSON document back. `list` answers with the volume array; every other verb
//! answers `null`.

use std::collections::HashMap;
use std::str::FromStr;

use loopvol_shared::errors::{LoopvolError, LoopvolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::volume::VolumeManager;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub cmd: String,

    #[serde(default)]
    pub name: String,

    /// Driver options. Accepted for compatibility, not interpreted.
    #[serde(default)]
    pub opts: HashMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Create,
    List,
    Attach,
    Detach,
    Remove,
}

impl FromStr for Verb {
    type Err = LoopvolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Verb::Create),
            "list" => Ok(Verb::List),
            "attach" => Ok(Verb::Attach),
            "detach" => Ok(Verb::Detach),
            "remove" => Ok(Verb::Remove),
            other => Err(LoopvolError::InvalidArgument(format!(
                "unknown command {:?}",
                other
            ))),
        }
    }
}

/// Parse a request document.
pub fn parse_request(input: &str) -> LoopvolResult<Request> {
    serde_json::from_str(input)
        .map_err(|e| LoopvolError::InvalidArgument(format!("malformed request: {}", e)))
}

/// Run `request` against `manager` and build the JSON response.
pub fn dispatch(manager: &VolumeManager, request: &Request) -> LoopvolResult<Value> {
    tracing::debug!(cmd = %request.cmd, name = %request.name, "Dispatching request");

    if !request.opts.is_empty() {
        tracing::debug!(opts = ?request.opts, "Ignoring driver options");
    }

    let verb = match request.cmd.parse::<Verb>() {
        Ok(verb) => verb,
        Err(e) => {
            tracing::warn!("{}", e);
            return Ok(Value::Null);
        }
    };

    match verb {
        Verb::Create => {
            manager.create(&request.name)?;
            Ok(Value::Null)
        }
        Verb::List => Ok(serde_json::to_value(manager.list()?)?),
        Verb::Attach => {
            manager.attach(&request.name)?;
            Ok(Value::Null)
        }
        Verb::Detach => {
            manager.detach(&request.name)?;
            Ok(Value::Null)
        }
        Verb::Remove => {
            manager.remove(&request.name)?;
            Ok(Value::Null)
        }
    }
}
