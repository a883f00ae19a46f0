//! Accounts and personnel
//!
//! Admins manage every account. Commanders manage the logistics officers of their
//! own base. Logistics officers and commanders keep the personnel roster of their
//! base; admins may do so for any base.
use super::AssetService;
use crate::audit::AuditAction;
use crate::error::{LedgerError, Result};
use crate::identity::Identity;
use crate::model::{
    PERSONNEL_HRP, Personnel, Role, TimeStamp, USER_HRP, User, require_text,
};
use crate::store::{self, TxResult};
use crate::utils;
use sled::Transactional;
use sled::transaction::TransactionalTree;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub role: Role,
    pub base_id: Option<String>,
}

/// Fields left as `None` are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub role: Option<Role>,
    pub base_id: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogisticsUpdate {
    pub username: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPersonnel {
    pub name: String,
    pub rank: String,
    pub service_number: String,
    pub assigned_unit: Option<String>,
    /// Only read for admins; everyone else adds personnel to their own base.
    pub base_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonnelUpdate {
    pub name: Option<String>,
    pub rank: Option<String>,
    pub assigned_unit: Option<String>,
    pub is_active: Option<bool>,
}

impl AssetService {
    /// Create a commander or logistics account. There is only ever one admin.
    pub fn add_user(&self, identity: &Identity, new: NewUser) -> Result<User> {
        let result = identity
            .require_role(&[Role::Admin], "create users")
            .and_then(|()| {
                if new.role == Role::Admin {
                    return Err(LedgerError::invalid("only one admin account is allowed"));
                }
                self.insert_user(new)
            });
        self.audited_success(identity, result, user_created)
    }

    /// Seed the admin account on first start. Returns the existing admin if there is one.
    pub fn ensure_admin(&self, username: &str) -> Result<User> {
        let users: Vec<User> = self.store.list(&self.store.users)?;
        if let Some(admin) = users.into_iter().find(|u| u.role == Role::Admin) {
            return Ok(admin);
        }
        let admin = self.insert_user(NewUser {
            username: username.to_string(),
            role: Role::Admin,
            base_id: None,
        })?;
        let identity = Identity::from(&admin);
        self.audited_success(&identity, Ok(admin), user_created)
    }

    pub fn update_user(&self, identity: &Identity, user_id: &str, update: UserUpdate) -> Result<User> {
        let result = identity
            .require_role(&[Role::Admin], "update users")
            .and_then(|()| self.modify_user(user_id, update));
        self.audited_success(identity, result, |user| AuditAction::UserUpdated {
            user_id: user.id.clone(),
        })
    }

    pub fn delete_user(&self, identity: &Identity, user_id: &str) -> Result<()> {
        let result = identity
            .require_role(&[Role::Admin], "delete users")
            .and_then(|()| self.remove_user(user_id, |user| {
                if user.role == Role::Admin {
                    return Err(LedgerError::invalid("the admin account cannot be deleted"));
                }
                Ok(())
            }));
        self.audited_success(identity, result, |_| AuditAction::UserDeleted {
            user_id: user_id.to_string(),
        })
    }

    pub fn list_users(&self, identity: &Identity) -> Result<Vec<User>> {
        identity.require_role(&[Role::Admin], "list users")?;
        self.store.list(&self.store.users)
    }

    pub fn add_logistics(&self, identity: &Identity, username: &str) -> Result<User> {
        let result = self.commander_base(identity).and_then(|base_id| {
            self.insert_user(NewUser {
                username: username.to_string(),
                role: Role::Logistics,
                base_id: Some(base_id),
            })
        });
        self.audited_success(identity, result, user_created)
    }

    pub fn update_logistics(
        &self,
        identity: &Identity,
        user_id: &str,
        update: LogisticsUpdate,
    ) -> Result<User> {
        let result = self.commander_base(identity).and_then(|base_id| {
            let db = &self.store;
            (&db.users, &db.usernames)
                .transaction(|(users, usernames)| -> TxResult<User> {
                    let mut user = load_officer(users, user_id, &base_id)?;
                    if let Some(username) = &update.username {
                        rename(usernames, &mut user, username)?;
                    }
                    if let Some(active) = update.is_active {
                        user.is_active = active;
                    }
                    store::save_tx(users, user_id, &user)?;
                    Ok(user)
                })
                .map_err(LedgerError::from)
        });
        self.audited_success(identity, result, |user| AuditAction::UserUpdated {
            user_id: user.id.clone(),
        })
    }

    pub fn delete_logistics(&self, identity: &Identity, user_id: &str) -> Result<()> {
        let result = self.commander_base(identity).and_then(|base_id| {
            self.remove_user(user_id, |user| {
                if user.role != Role::Logistics {
                    return Err(LedgerError::not_found("logistics officer", user_id));
                }
                if user.base_id.as_deref() != Some(base_id.as_str()) {
                    return Err(LedgerError::forbidden(format!(
                        "user {user_id} does not belong to base {base_id}"
                    )));
                }
                Ok(())
            })
        });
        self.audited_success(identity, result, |_| AuditAction::UserDeleted {
            user_id: user_id.to_string(),
        })
    }

    pub fn list_logistics(&self, identity: &Identity) -> Result<Vec<User>> {
        let base_id = self.commander_base(identity)?;
        let mut users: Vec<User> = self.store.list(&self.store.users)?;
        users.retain(|u| u.role == Role::Logistics && u.base_id.as_deref() == Some(&base_id));
        Ok(users)
    }

    pub fn add_personnel(&self, identity: &Identity, new: NewPersonnel) -> Result<Personnel> {
        let result = self.enlist(identity, new);
        self.audited_success(identity, result, |p| AuditAction::PersonnelAdded {
            personnel_id: p.id.clone(),
            base_id: p.base_id.clone(),
            service_number: p.service_number.clone(),
        })
    }

    pub fn update_personnel(
        &self,
        identity: &Identity,
        personnel_id: &str,
        update: PersonnelUpdate,
    ) -> Result<Personnel> {
        let result = self.modify_personnel(identity, personnel_id, update);
        self.audited_success(identity, result, |p| AuditAction::PersonnelUpdated {
            personnel_id: p.id.clone(),
        })
    }

    pub fn remove_personnel(&self, identity: &Identity, personnel_id: &str) -> Result<()> {
        let result = self.discharge(identity, personnel_id);
        self.audited_success(identity, result, |_| AuditAction::PersonnelRemoved {
            personnel_id: personnel_id.to_string(),
        })
    }

    pub fn list_personnel(&self, identity: &Identity) -> Result<Vec<Personnel>> {
        let scope = self.scope(identity)?;
        let mut personnel: Vec<Personnel> = self.store.list(&self.store.personnel)?;
        personnel.retain(|p| scope.includes(&p.base_id));
        Ok(personnel)
    }

    fn commander_base(&self, identity: &Identity) -> Result<String> {
        identity.require_role(&[Role::Commander], "manage logistics officers")?;
        let scope = self.scope(identity)?;
        scope
            .home_base()
            .map(str::to_string)
            .ok_or_else(|| LedgerError::forbidden("commander is not assigned to a base"))
    }

    fn insert_user(&self, new: NewUser) -> Result<User> {
        require_text("username", &new.username)?;
        if new.role != Role::Admin && new.base_id.is_none() {
            return Err(LedgerError::invalid(format!(
                "a {} account needs a base",
                new.role
            )));
        }

        let user = User {
            id: utils::new_id(USER_HRP)?,
            username: new.username.trim().to_string(),
            role: new.role,
            base_id: new.base_id,
            is_active: true,
            created_at: TimeStamp::new(),
        };
        let db = &self.store;
        (&db.users, &db.usernames, &db.bases).transaction(
            |(users, usernames, bases)| -> TxResult<()> {
                if let Some(base_id) = &user.base_id {
                    if bases.get(base_id.as_bytes())?.is_none() {
                        return store::abort(LedgerError::invalid(format!(
                            "base {base_id} does not exist"
                        )));
                    }
                }
                store::claim_unique(usernames, "username", &user.username, &user.id)?;
                store::save_tx(users, &user.id, &user)
            },
        )?;

        info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    fn modify_user(&self, user_id: &str, update: UserUpdate) -> Result<User> {
        let db = &self.store;
        let user = (&db.users, &db.usernames, &db.bases).transaction(
            |(users, usernames, bases)| -> TxResult<User> {
                let mut user: User = store::require_tx(users, "user", user_id)?;
                if let Some(role) = update.role {
                    if (role == Role::Admin) != (user.role == Role::Admin) {
                        return store::abort(LedgerError::invalid(
                            "the admin role cannot be granted or revoked",
                        ));
                    }
                    user.role = role;
                }
                if let Some(username) = &update.username {
                    rename(usernames, &mut user, username)?;
                }
                if let Some(base_id) = &update.base_id {
                    if bases.get(base_id.as_bytes())?.is_none() {
                        return store::abort(LedgerError::invalid(format!(
                            "base {base_id} does not exist"
                        )));
                    }
                    user.base_id = Some(base_id.clone());
                }
                if user.role != Role::Admin && user.base_id.is_none() {
                    return store::abort(LedgerError::invalid(format!(
                        "a {} account needs a base",
                        user.role
                    )));
                }
                if let Some(active) = update.is_active {
                    user.is_active = active;
                }
                store::save_tx(users, user_id, &user)?;
                Ok(user)
            },
        )?;

        info!(user_id, role = %user.role, "user updated");
        Ok(user)
    }

    fn remove_user<F>(&self, user_id: &str, guard: F) -> Result<()>
    where
        F: Fn(&User) -> Result<()>,
    {
        let db = &self.store;
        (&db.users, &db.usernames).transaction(|(users, usernames)| -> TxResult<()> {
            let user: User = store::require_tx(users, "user", user_id)?;
            if let Err(err) = guard(&user) {
                return store::abort(err);
            }
            store::remove_tx(usernames, &user.username)?;
            store::remove_tx(users, user_id)
        })?;

        info!(user_id, "user deleted");
        Ok(())
    }

    fn enlist(&self, identity: &Identity, new: NewPersonnel) -> Result<Personnel> {
        identity.require_role(
            &[Role::Admin, Role::Commander, Role::Logistics],
            "add personnel",
        )?;
        let scope = self.scope(identity)?;
        let base_id = match (scope.home_base(), new.base_id) {
            (Some(own), _) => own.to_string(),
            (None, Some(base_id)) => base_id,
            (None, None) => return Err(LedgerError::invalid("base_id is required")),
        };
        require_text("name", &new.name)?;
        require_text("rank", &new.rank)?;
        require_text("service number", &new.service_number)?;

        let person = Personnel {
            id: utils::new_id(PERSONNEL_HRP)?,
            name: new.name.trim().to_string(),
            rank: new.rank.trim().to_string(),
            service_number: new.service_number.trim().to_string(),
            base_id,
            assigned_unit: new.assigned_unit,
            is_active: true,
            created_at: TimeStamp::new(),
        };
        let db = &self.store;
        (&db.personnel, &db.service_numbers, &db.bases).transaction(
            |(personnel, numbers, bases)| -> TxResult<()> {
                if bases.get(person.base_id.as_bytes())?.is_none() {
                    return store::abort(LedgerError::not_found("base", person.base_id.as_str()));
                }
                store::claim_unique(numbers, "service number", &person.service_number, &person.id)?;
                store::save_tx(personnel, &person.id, &person)
            },
        )?;

        info!(
            personnel_id = %person.id,
            base_id = %person.base_id,
            added_by = %identity.id,
            "personnel added"
        );
        Ok(person)
    }

    fn modify_personnel(
        &self,
        identity: &Identity,
        personnel_id: &str,
        update: PersonnelUpdate,
    ) -> Result<Personnel> {
        identity.require_role(
            &[Role::Admin, Role::Commander, Role::Logistics],
            "update personnel",
        )?;
        let scope = self.scope(identity)?;
        for (field, value) in [("name", &update.name), ("rank", &update.rank)] {
            if let Some(value) = value {
                require_text(field, value)?;
            }
        }

        let person = self.store.personnel.transaction(|personnel| -> TxResult<Personnel> {
            let mut person: Personnel = store::require_tx(personnel, "personnel", personnel_id)?;
            if !scope.includes(&person.base_id) {
                return store::abort(LedgerError::not_found("personnel", personnel_id));
            }
            if let Some(name) = &update.name {
                person.name = name.trim().to_string();
            }
            if let Some(rank) = &update.rank {
                person.rank = rank.trim().to_string();
            }
            if let Some(unit) = &update.assigned_unit {
                person.assigned_unit = Some(unit.clone());
            }
            if let Some(active) = update.is_active {
                person.is_active = active;
            }
            store::save_tx(personnel, personnel_id, &person)?;
            Ok(person)
        })?;

        info!(personnel_id, updated_by = %identity.id, "personnel updated");
        Ok(person)
    }

    fn discharge(&self, identity: &Identity, personnel_id: &str) -> Result<()> {
        identity.require_role(
            &[Role::Admin, Role::Commander, Role::Logistics],
            "remove personnel",
        )?;
        let scope = self.scope(identity)?;

        let db = &self.store;
        (&db.personnel, &db.service_numbers).transaction(|(personnel, numbers)| -> TxResult<()> {
            let person: Personnel = store::require_tx(personnel, "personnel", personnel_id)?;
            if !scope.includes(&person.base_id) {
                return store::abort(LedgerError::not_found("personnel", personnel_id));
            }
            store::remove_tx(numbers, &person.service_number)?;
            store::remove_tx(personnel, personnel_id)
        })?;

        info!(personnel_id, removed_by = %identity.id, "personnel removed");
        Ok(())
    }
}

fn user_created(user: &User) -> AuditAction {
    AuditAction::UserCreated {
        user_id: user.id.clone(),
        role: user.role,
        base_id: user.base_id.clone(),
    }
}

fn load_officer(users: &TransactionalTree, user_id: &str, base_id: &str) -> TxResult<User> {
    let user: User = store::require_tx(users, "user", user_id)?;
    if user.role != Role::Logistics {
        return store::abort(LedgerError::not_found("logistics officer", user_id));
    }
    if user.base_id.as_deref() != Some(base_id) {
        return store::abort(LedgerError::forbidden(format!(
            "user {user_id} does not belong to base {base_id}"
        )));
    }
    Ok(user)
}

fn rename(usernames: &TransactionalTree, user: &mut User, username: &str) -> TxResult<()> {
    let username = username.trim();
    if username.is_empty() {
        return store::abort(LedgerError::invalid("username is required"));
    }
    if user.username != username {
        store::claim_unique(usernames, "username", username, &user.id)?;
        store::remove_tx(usernames, &user.username)?;
        user.username = username.to_string();
    }
    Ok(())
}
