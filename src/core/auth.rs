use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::errors::QuizError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    Learner,
    Creator,
    Admin,
}

impl FromStr for Role {
    type Err = QuizError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "learner" | "student" | "user" => Ok(Self::Learner),
            "creator" | "teacher" => Ok(Self::Creator),
            "admin" => Ok(Self::Admin),
            other => Err(QuizError::Input(format!("unknown role: {other}"))),
        }
    }
}

/// Identity of the caller, resolved once at the trust boundary.
///
/// The core never looks at token internals; whoever authenticates the request
/// builds this value and hands it in explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AuthContext {
    user_id: Uuid,
    role: Role,
}

impl AuthContext {
    pub(crate) fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub(crate) fn parse(user_id: &str, role: Role) -> Result<Self, QuizError> {
        let user_id = Uuid::parse_str(user_id.trim())
            .map_err(|_| QuizError::Input("invalid user id format".to_string()))?;
        Ok(Self::new(user_id, role))
    }

    pub(crate) fn user_id(&self) -> String {
        self.user_id.to_string()
    }

    pub(crate) fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub(crate) fn can_read_owned_by(&self, owner_id: &str) -> bool {
        self.is_admin() || self.user_id() == owner_id
    }
}

impl fmt::Display for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.user_id, self.role)
    }
}
