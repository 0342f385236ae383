use std::{fmt::Display, str::FromStr};

pub use gate_common::HttpMethod;
use gate_common::Secret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The name of the privileged role. Holding it satisfies every permission check.
pub const SUPER_ROLE: &str = "super";

#[derive(Debug, Clone, Error)]
#[error("Could not parse identifier: {0}")]
pub struct IdParseError(String);

//--------------------------------------     SubjectId       ---------------------------------------------------------
/// The authenticated actor (end user or admin) a request acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(Uuid);

impl SubjectId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for SubjectId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for SubjectId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self).map_err(|e| IdParseError(format!("{s}: {e}")))
    }
}

impl Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------       Roles         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(Uuid);

impl RoleId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for RoleId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self).map_err(|e| IdParseError(format!("{s}: {e}")))
    }
}

impl Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

impl Role {
    pub fn new<S: Into<String>>(id: RoleId, name: S) -> Self {
        Self { id, name: name.into() }
    }

    pub fn is_super(&self) -> bool {
        self.name == SUPER_ROLE
    }
}

//--------------------------------------     Permission      ---------------------------------------------------------
/// A named action and HTTP method pair that a route requires, e.g. `("create brand", POST)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub name: String,
    pub method: HttpMethod,
}

impl Permission {
    pub fn new<S: Into<String>>(name: S, method: HttpMethod) -> Self {
        Self { name: name.into(), method }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.name, self.method)
    }
}

/// One row of the declarative policy table: `role` may perform `permission_name` with `method`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRule {
    pub role_id: RoleId,
    pub permission_name: String,
    pub method: HttpMethod,
}

impl PolicyRule {
    pub fn new<S: Into<String>>(role_id: RoleId, permission_name: S, method: HttpMethod) -> Self {
        Self { role_id, permission_name: permission_name.into(), method }
    }
}

//--------------------------------------      Partners       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartnerId(i32);

impl PartnerId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl FromStr for PartnerId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i32>().map(Self).map_err(|e| IdParseError(format!("{s}: {e}")))
    }
}

impl Display for PartnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The signing credential a B2B partner uses to sign its requests. There is exactly one current key per partner.
#[derive(Debug, Clone)]
pub struct PartnerCredential {
    pub partner_id: PartnerId,
    pub signing_key: Secret<String>,
    pub active: bool,
}

impl PartnerCredential {
    /// The key to verify signatures with, if this credential may be used at all.
    pub fn usable_key(&self) -> Option<&str> {
        (self.active && !self.signing_key.is_empty()).then(|| self.signing_key.reveal().as_str())
    }
}

//--------------------------------------     Two-factor      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorMethod {
    Totp,
    BackupCode,
}

impl Display for TwoFactorMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Totp => f.write_str("totp"),
            Self::BackupCode => f.write_str("backup_code"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TwoFactorStatus {
    pub enabled: bool,
}

/// The second factor a client presented on a step-up route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwoFactorProof {
    Token(String),
    BackupCode(String),
}

impl TwoFactorProof {
    pub fn method(&self) -> TwoFactorMethod {
        match self {
            Self::Token(_) => TwoFactorMethod::Totp,
            Self::BackupCode(_) => TwoFactorMethod::BackupCode,
        }
    }
}
