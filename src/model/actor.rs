use serde::{Deserialize, Serialize};

/// Who asked for a mutation. Attribution only: nothing is authorised against
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user: Option<String>,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn system() -> Self {
        Self::named("system")
    }

    pub fn named(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
        }
    }
}

impl Default for Actor {
    fn default() -> Self {
        Self::anonymous()
    }
}
