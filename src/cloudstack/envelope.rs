//! Typed decoding of CloudStack response envelopes.
//!
//! Every reply is wrapped as `{"<command>response": {...}}` where `<command>`
//! is the lower-cased API command. List replies carry the records under a
//! singular entity key (`zone`, `virtualmachine`) which is omitted entirely
//! when the list is empty.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::CloudstackError;

/// A list command whose records live under `entity`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ListCall {
    /// API command name.
    pub command: &'static str,
    /// Key holding the record array.
    pub entity: &'static str,
}

/// A command returning a single record under `entity`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EntityCall {
    /// API command name.
    pub command: &'static str,
    /// Key holding the record.
    pub entity: &'static str,
}

/// A command whose wrapper object is the record itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlainCall {
    /// API command name.
    pub command: &'static str,
}

pub(crate) const LIST_ZONES: ListCall = ListCall {
    command: "listZones",
    entity: "zone",
};
pub(crate) const LIST_DOMAINS: ListCall = ListCall {
    command: "listDomains",
    entity: "domain",
};
pub(crate) const LIST_HYPERVISORS: ListCall = ListCall {
    command: "listHypervisors",
    entity: "hypervisor",
};
pub(crate) const LIST_NETWORKS: ListCall = ListCall {
    command: "listNetworks",
    entity: "network",
};
pub(crate) const LIST_TEMPLATES: ListCall = ListCall {
    command: "listTemplates",
    entity: "template",
};
pub(crate) const LIST_ISOS: ListCall = ListCall {
    command: "listIsos",
    entity: "iso",
};
pub(crate) const LIST_FLAVORS: ListCall = ListCall {
    command: "listServiceOfferings",
    entity: "serviceoffering",
};
pub(crate) const LIST_DISK_OFFERINGS: ListCall = ListCall {
    command: "listDiskOfferings",
    entity: "diskoffering",
};
pub(crate) const LIST_SERVERS: ListCall = ListCall {
    command: "listVirtualMachines",
    entity: "virtualmachine",
};
pub(crate) const DEPLOY_SERVER: PlainCall = PlainCall {
    command: "deployVirtualMachine",
};
pub(crate) const DESTROY_SERVER: PlainCall = PlainCall {
    command: "destroyVirtualMachine",
};
pub(crate) const CREATE_KEY_PAIR: EntityCall = EntityCall {
    command: "createSSHKeyPair",
    entity: "keypair",
};
pub(crate) const DELETE_KEY_PAIR: PlainCall = PlainCall {
    command: "deleteSSHKeyPair",
};
pub(crate) const CONSOLE_ENDPOINT: EntityCall = EntityCall {
    command: "createConsoleEndpoint",
    entity: "consoleendpoint",
};

/// Returns the wrapper key for `command` (`listZones` -> `listzonesresponse`).
#[must_use]
pub fn response_key(command: &str) -> String {
    format!("{}response", command.to_ascii_lowercase())
}

fn decode_error(command: &str, message: impl Into<String>) -> CloudstackError {
    CloudstackError::Decode {
        command: command.to_owned(),
        message: message.into(),
    }
}

/// Returns the wrapper object for `command`.
///
/// # Errors
///
/// Returns [`CloudstackError::Decode`] when the wrapper is missing or is not
/// an object.
pub fn unwrap_response<'v>(
    body: &'v Value,
    command: &str,
) -> Result<&'v Map<String, Value>, CloudstackError> {
    let key = response_key(command);
    body.get(&key)
        .ok_or_else(|| decode_error(command, format!("missing '{key}' field")))?
        .as_object()
        .ok_or_else(|| decode_error(command, format!("'{key}' is not an object")))
}

fn from_value<T: DeserializeOwned>(command: &str, value: Value) -> Result<T, CloudstackError> {
    serde_json::from_value(value).map_err(|err| decode_error(command, err.to_string()))
}

impl ListCall {
    /// Decodes the record list. A missing entity key is an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::Decode`] on any shape mismatch.
    pub fn decode<T: DeserializeOwned>(&self, body: &Value) -> Result<Vec<T>, CloudstackError> {
        let wrapper = unwrap_response(body, self.command)?;
        match wrapper.get(self.entity) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .cloned()
                .map(|item| from_value(self.command, item))
                .collect(),
            Some(_) => Err(decode_error(
                self.command,
                format!("'{}' is not an array", self.entity),
            )),
        }
    }
}

impl EntityCall {
    /// Decodes the single record.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::Decode`] when the entity is missing or does
    /// not match `T`.
    pub fn decode<T: DeserializeOwned>(&self, body: &Value) -> Result<T, CloudstackError> {
        let wrapper = unwrap_response(body, self.command)?;
        let entity = wrapper.get(self.entity).cloned().ok_or_else(|| {
            decode_error(self.command, format!("missing '{}' field", self.entity))
        })?;
        from_value(self.command, entity)
    }
}

impl PlainCall {
    /// Decodes the wrapper object.
    ///
    /// # Errors
    ///
    /// Returns [`CloudstackError::Decode`] when the wrapper does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self, body: &Value) -> Result<T, CloudstackError> {
        let wrapper = unwrap_response(body, self.command)?;
        from_value(self.command, Value::Object(wrapper.clone()))
    }
}

/// Structured error carried by a CloudStack reply.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiFault {
    /// Provider error code (431 for bad parameters, 530 for internal errors).
    pub code: Option<u64>,
    /// Provider message.
    pub message: String,
}

/// Extracts the provider's error from a response body.
///
/// Looks at `errorresponse`, then any `<command>response` carrying
/// `errortext`, then a `badRequest.message` body. Falls back to the raw text.
#[must_use]
pub fn extract_fault(raw: &[u8]) -> ApiFault {
    let text = String::from_utf8_lossy(raw).trim().to_owned();
    let Ok(body) = serde_json::from_slice::<Value>(raw) else {
        return ApiFault {
            code: None,
            message: text,
        };
    };

    let from_wrapper = body.as_object().and_then(|root| {
        root.iter()
            .filter(|(key, _)| key.ends_with("response"))
            .find_map(|(_, wrapper)| {
                let message = wrapper.get("errortext")?.as_str()?.to_owned();
                let code = wrapper.get("errorcode").and_then(Value::as_u64);
                Some(ApiFault { code, message })
            })
    });
    if let Some(fault) = from_wrapper {
        return fault;
    }

    let bad_request = body
        .pointer("/badRequest/message")
        .and_then(Value::as_str)
        .map(|message| ApiFault {
            code: body.pointer("/badRequest/code").and_then(Value::as_u64),
            message: message.to_owned(),
        });

    bad_request.unwrap_or(ApiFault {
        code: None,
        message: text,
    })
}
