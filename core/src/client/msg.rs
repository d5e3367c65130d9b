//! Builders for the CosmWasm messages the deployer sends.
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use super::proto::{
    Any, Coin, MsgExecuteContract, MsgInstantiateContract, MsgStoreCode, MSG_EXECUTE_CONTRACT,
    MSG_INSTANTIATE_CONTRACT, MSG_STORE_CODE,
};

/// Remote contract entry point invoked by a funded send. Both take no
/// parameters; only the selector differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    Route,
    RouteWithSender,
}

impl EntryPoint {
    pub fn selector(self) -> &'static str {
        match self {
            Self::Route => "route",
            Self::RouteWithSender => "route_with_sender",
        }
    }

    /// JSON body `{"<selector>":{}}`.
    pub fn body(self) -> Value {
        let mut map = Map::new();
        map.insert(self.selector().to_string(), Value::Object(Map::new()));
        Value::Object(map)
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

impl FromStr for EntryPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "route" => Ok(Self::Route),
            "route_with_sender" | "with_sender" => Ok(Self::RouteWithSender),
            other => Err(format!(
                "Unknown entry point: '{other}'. Use 'route' or 'route_with_sender'."
            )),
        }
    }
}

/// A single execute message, kept decoded so callers can inspect it before
/// it is packed for signing.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractMsg {
    StoreCode(MsgStoreCode),
    Instantiate(MsgInstantiateContract),
    Execute(MsgExecuteContract),
}

impl ContractMsg {
    pub fn type_url(&self) -> &'static str {
        match self {
            Self::StoreCode(_) => MSG_STORE_CODE,
            Self::Instantiate(_) => MSG_INSTANTIATE_CONTRACT,
            Self::Execute(_) => MSG_EXECUTE_CONTRACT,
        }
    }

    pub fn to_any(&self) -> Any {
        match self {
            Self::StoreCode(m) => Any::pack(MSG_STORE_CODE, m),
            Self::Instantiate(m) => Any::pack(MSG_INSTANTIATE_CONTRACT, m),
            Self::Execute(m) => Any::pack(MSG_EXECUTE_CONTRACT, m),
        }
    }
}

/// Funded execute message addressed to `contract`.
pub fn execute_msg(
    sender: &str,
    contract: &str,
    entry_point: EntryPoint,
    funds: Vec<Coin>,
) -> ContractMsg {
    ContractMsg::Execute(MsgExecuteContract {
        sender: sender.to_string(),
        contract: contract.to_string(),
        msg: entry_point.body().to_string().into_bytes(),
        funds,
    })
}

/// Upload message. `wasm` is expected to be gzip-compressed already.
pub fn store_code_msg(sender: &str, wasm: Vec<u8>) -> ContractMsg {
    ContractMsg::StoreCode(MsgStoreCode {
        sender: sender.to_string(),
        wasm_byte_code: wasm,
    })
}

/// Instantiate message without admin or funds.
pub fn instantiate_msg(sender: &str, code_id: u64, init: &Value, label: &str) -> ContractMsg {
    ContractMsg::Instantiate(MsgInstantiateContract {
        sender: sender.to_string(),
        admin: String::new(),
        code_id,
        label: label.to_string(),
        msg: init.to_string().into_bytes(),
        funds: Vec::new(),
    })
}
