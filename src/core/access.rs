//! Authorization gate and caller scope.
//!
//! The gate is the per-session state machine every protected view goes
//! through: it starts in `Checking`, reads the stored token and user, and
//! settles on `Authorized(role)` or `Unauthorized`. A settled gate then
//! answers, for a page that requires some role, whether to render it or
//! where to redirect. The same decision backs the server's dashboard routes
//! and the CLI's session handling.
//!
//! [`Actor`] is the authenticated caller as seen by the business logic. It
//! answers role checks and yields the set of agent ids whose records the
//! caller may see.

use crate::{
    entities::{Role, User, UserModel, user},
    errors::{Error, Result},
};
use sea_orm::{QuerySelect, prelude::*};

/// Route of the login screen.
pub const LOGIN_PATH: &str = "/login";

/// Session state of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    /// Storage has not been read yet
    #[default]
    Checking,
    /// A token and user were found
    Authorized(Role),
    /// No usable session
    Unauthorized,
}

/// What to do with a request for a protected page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Still checking; render nothing yet
    Wait,
    /// Render the page
    Allow,
    /// Send the visitor to the login screen
    RedirectToLogin,
    /// Send the visitor to the home of the role they actually have
    RedirectTo(&'static str),
}

impl GateDecision {
    /// Redirect target, if the decision is a redirect.
    #[must_use]
    pub const fn location(self) -> Option<&'static str> {
        match self {
            Self::RedirectToLogin => Some(LOGIN_PATH),
            Self::RedirectTo(path) => Some(path),
            Self::Wait | Self::Allow => None,
        }
    }
}

/// Per-session authorization gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthGate {
    state: GateState,
}

impl AuthGate {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: GateState::Checking,
        }
    }

    #[must_use]
    pub const fn state(&self) -> GateState {
        self.state
    }

    /// Settles the gate from what storage holds. Both a non-blank token and a
    /// user role are needed for `Authorized`.
    pub fn resolve(&mut self, token: Option<&str>, role: Option<Role>) -> GateState {
        self.state = match (token.map(str::trim), role) {
            (Some(token), Some(role)) if !token.is_empty() => GateState::Authorized(role),
            _ => GateState::Unauthorized,
        };
        self.state
    }

    /// Decision for a page that requires `required`.
    #[must_use]
    pub fn decide(&self, required: Role) -> GateDecision {
        match self.state {
            GateState::Checking => GateDecision::Wait,
            GateState::Unauthorized => GateDecision::RedirectToLogin,
            GateState::Authorized(role) if role == required => GateDecision::Allow,
            GateState::Authorized(role) => GateDecision::RedirectTo(role.home_path()),
        }
    }

    /// Where the entry route (`/`) sends a visitor.
    #[must_use]
    pub const fn landing(&self) -> GateDecision {
        match self.state {
            GateState::Checking => GateDecision::Wait,
            GateState::Unauthorized => GateDecision::RedirectToLogin,
            GateState::Authorized(role) => GateDecision::RedirectTo(role.home_path()),
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl From<&UserModel> for Actor {
    fn from(user: &UserModel) -> Self {
        Self {
            id: user.id,
            role: user.role,
        }
    }
}

impl Actor {
    /// Fails with `Forbidden` unless the caller holds one of `roles`.
    pub fn require(&self, roles: &[Role]) -> Result<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(Error::forbidden(format!(
                "role {} may not perform this action",
                self.role
            )))
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Agent ids whose records the caller may see. `None` means everything.
    ///
    /// Admins see all records, managers their own plus their agents', agents their own.
    pub async fn visible_agent_ids<C>(&self, db: &C) -> Result<Option<Vec<i64>>>
    where
        C: ConnectionTrait,
    {
        match self.role {
            Role::Admin => Ok(None),
            Role::Agent => Ok(Some(vec![self.id])),
            Role::Manager => {
                let mut ids: Vec<i64> = User::find()
                    .select_only()
                    .column(user::Column::Id)
                    .filter(user::Column::ManagerId.eq(self.id))
                    .into_tuple()
                    .all(db)
                    .await?;
                ids.push(self.id);
                Ok(Some(ids))
            }
        }
    }

    /// True when the caller may see records created by `agent_id`.
    pub async fn can_see_agent<C>(&self, db: &C, agent_id: i64) -> Result<bool>
    where
        C: ConnectionTrait,
    {
        Ok(self
            .visible_agent_ids(db)
            .await?
            .is_none_or(|ids| ids.contains(&agent_id)))
    }
}
