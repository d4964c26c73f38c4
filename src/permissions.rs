// 🔐 Permissions - Typed per-endpoint operation flags
//
// Stored as the JSON map users have always carried:
//   {"create_customers": "RW", "get_interactions": "R", "read_all": "X"}
// Endpoint keys map to letter sets drawn from R (read), W (write), X (admin).
// "read_all" / "write_all" set to "X" grant the operation on every endpoint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// ENDPOINT KEYS + OPERATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EndpointKey {
    Admin,
    GetCustomers,
    CreateCustomers,
    GetInteractions,
}

impl EndpointKey {
    pub const ALL: [EndpointKey; 4] = [
        EndpointKey::Admin,
        EndpointKey::GetCustomers,
        EndpointKey::CreateCustomers,
        EndpointKey::GetInteractions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKey::Admin => "admin",
            EndpointKey::GetCustomers => "get_customers",
            EndpointKey::CreateCustomers => "create_customers",
            EndpointKey::GetInteractions => "get_interactions",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        EndpointKey::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    Admin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationFlags {
    pub read: bool,
    pub write: bool,
    pub admin: bool,
}

impl OperationFlags {
    pub const ALL: OperationFlags = OperationFlags {
        read: true,
        write: true,
        admin: true,
    };

    /// Parse a letter set like "RW". Unknown letters are rejected.
    pub fn parse(letters: &str) -> Result<Self, PermissionError> {
        let mut flags = OperationFlags::default();
        for c in letters.chars() {
            match c {
                'R' => flags.read = true,
                'W' => flags.write = true,
                'X' => flags.admin = true,
                other => return Err(PermissionError::UnknownLetter(other)),
            }
        }
        Ok(flags)
    }

    pub fn letters(&self) -> String {
        let mut s = String::new();
        if self.read {
            s.push('R');
        }
        if self.write {
            s.push('W');
        }
        if self.admin {
            s.push('X');
        }
        s
    }

    pub fn allows(&self, op: Operation) -> bool {
        match op {
            Operation::Read => self.read,
            Operation::Write => self.write,
            Operation::Admin => self.admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    #[error("Unknown permission key: {0}")]
    UnknownKey(String),

    #[error("Unknown permission letter: {0}")]
    UnknownLetter(char),

    #[error("Override {0} only accepts \"X\"")]
    InvalidOverride(String),
}

// ============================================================================
// PERMISSION SET
// ============================================================================

/// Everything one user may do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct PermissionSet {
    pub endpoints: BTreeMap<EndpointKey, OperationFlags>,
    pub read_all: bool,
    pub write_all: bool,
}

impl PermissionSet {
    /// Every flag on every endpoint, plus both overrides
    pub fn superuser() -> Self {
        PermissionSet {
            endpoints: EndpointKey::ALL
                .into_iter()
                .map(|k| (k, OperationFlags::ALL))
                .collect(),
            read_all: true,
            write_all: true,
        }
    }

    pub fn with(mut self, key: EndpointKey, flags: OperationFlags) -> Self {
        self.endpoints.insert(key, flags);
        self
    }

    pub fn granted(&self, key: EndpointKey) -> OperationFlags {
        self.endpoints.get(&key).copied().unwrap_or_default()
    }

    /// Whether `op` is allowed on `key`, overrides included.
    /// Admin is never granted by the read/write overrides.
    pub fn allows(&self, key: EndpointKey, op: Operation) -> bool {
        let override_applies = match op {
            Operation::Read => self.read_all,
            Operation::Write => self.write_all,
            Operation::Admin => false,
        };

        override_applies || self.granted(key).allows(op)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> String {
        let map: BTreeMap<String, String> = self.clone().into();
        serde_json::json!(map).to_string()
    }
}

impl TryFrom<BTreeMap<String, String>> for PermissionSet {
    type Error = PermissionError;

    fn try_from(raw: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut set = PermissionSet::default();

        for (key, letters) in raw {
            match key.as_str() {
                "read_all" | "write_all" => {
                    let enabled = match letters.as_str() {
                        "X" => true,
                        "" => false,
                        _ => return Err(PermissionError::InvalidOverride(key)),
                    };
                    if key == "read_all" {
                        set.read_all = enabled;
                    } else {
                        set.write_all = enabled;
                    }
                }
                other => {
                    let endpoint = EndpointKey::parse(other)
                        .ok_or_else(|| PermissionError::UnknownKey(other.to_string()))?;
                    set.endpoints.insert(endpoint, OperationFlags::parse(&letters)?);
                }
            }
        }

        Ok(set)
    }
}

impl From<PermissionSet> for BTreeMap<String, String> {
    fn from(set: PermissionSet) -> Self {
        let mut map: BTreeMap<String, String> = set
            .endpoints
            .iter()
            .map(|(k, flags)| (k.as_str().to_string(), flags.letters()))
            .collect();

        if set.read_all {
            map.insert("read_all".to_string(), "X".to_string());
        }
        if set.write_all {
            map.insert("write_all".to_string(), "X".to_string());
        }
        map
    }
}

// ============================================================================
// TESTS
// ============================================================================
