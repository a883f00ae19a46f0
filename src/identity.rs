//! Caller identity and base scoping
//!
//! The identity provider hands us `{id, role, base_id}` and we trust it verbatim.
//! Every service operation resolves a [`Scope`] from it before touching records.
use crate::error::{LedgerError, Result};
use crate::model::{Role, User};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub role: Role,
    pub base_id: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, role: Role, base_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            role,
            base_id,
        }
    }
    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, Role::Admin, None)
    }
    pub fn commander(id: impl Into<String>, base_id: impl Into<String>) -> Self {
        Self::new(id, Role::Commander, Some(base_id.into()))
    }
    pub fn logistics(id: impl Into<String>, base_id: impl Into<String>) -> Self {
        Self::new(id, Role::Logistics, Some(base_id.into()))
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fails with `Forbidden` unless the caller holds one of `roles`.
    pub fn require_role(&self, roles: &[Role], action: &str) -> Result<()> {
        if roles.contains(&self.role) {
            return Ok(());
        }
        Err(LedgerError::forbidden(format!(
            "role {} may not {action}",
            self.role
        )))
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Identity::new(user.id.clone(), user.role, user.base_id.clone())
    }
}

/// The set of bases a principal may act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    AllBases,
    Base(String),
}

impl Scope {
    pub fn includes(&self, base_id: &str) -> bool {
        match self {
            Scope::AllBases => true,
            Scope::Base(own) => own == base_id,
        }
    }

    pub fn require(&self, base_id: &str) -> Result<()> {
        if self.includes(base_id) {
            return Ok(());
        }
        Err(LedgerError::forbidden(format!(
            "base {base_id} is outside the caller's scope"
        )))
    }

    /// The single base a scoped principal is stationed at, `None` for admins.
    pub fn home_base(&self) -> Option<&str> {
        match self {
            Scope::AllBases => None,
            Scope::Base(own) => Some(own),
        }
    }
}

/// Resolve the caller's scope. Admins see every base; commanders and logistics
/// officers see exactly their own, which must exist.
pub fn resolve_scope(store: &Store, identity: &Identity) -> Result<Scope> {
    if identity.is_admin() {
        return Ok(Scope::AllBases);
    }
    let Some(base_id) = identity.base_id.as_deref() else {
        return Err(LedgerError::forbidden(format!(
            "{} {} is not assigned to a base",
            identity.role, identity.id
        )));
    };
    if !store.contains(&store.bases, base_id)? {
        return Err(LedgerError::forbidden(format!(
            "assigned base {base_id} does not exist"
        )));
    }
    Ok(Scope::Base(base_id.to_string()))
}
