use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::models::user::{UpdateProfile, User, UserRole};
use crate::storage::{keys, KeyValueStorage};

/// Single source of truth for the authenticated user. Every derived view
/// (role checks, permission checks) reads from here; no duplicate copies.
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
    user: RwLock<Option<User>>,
}

impl SessionStore {
    /// Builds the store and hydrates from the persisted snapshot, if any.
    /// A corrupt snapshot is discarded and its persisted copy cleared.
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        let user = match storage.get(keys::SESSION) {
            Some(raw) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => {
                    debug!(user_id = %user.id, "hydrated session from snapshot");
                    Some(user)
                }
                Err(err) => {
                    warn!(?err, "discarding corrupt session snapshot");
                    storage.remove(keys::SESSION);
                    None
                }
            },
            None => None,
        };

        Self {
            storage,
            user: RwLock::new(user),
        }
    }

    pub fn set_user(&self, user: Option<User>) {
        let mut slot = self.user.write().unwrap_or_else(PoisonError::into_inner);
        match &user {
            Some(user) => match serde_json::to_string(user) {
                Ok(snapshot) => self.storage.set(keys::SESSION, &snapshot),
                Err(err) => warn!(?err, "failed to serialize session snapshot"),
            },
            None => self.storage.remove(keys::SESSION),
        }
        *slot = user;
    }

    pub fn clear(&self) {
        self.set_user(None);
    }

    pub fn current_user(&self) -> Option<User> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Applies a partial profile update to the current user, persisting the
    /// refreshed snapshot. No-op when signed out.
    pub fn update_user(&self, update: &UpdateProfile) -> Option<User> {
        let mut slot = self.user.write().unwrap_or_else(PoisonError::into_inner);
        let user = slot.as_mut()?;
        update.apply_to(user);
        match serde_json::to_string(&*user) {
            Ok(snapshot) => self.storage.set(keys::SESSION, &snapshot),
            Err(err) => warn!(?err, "failed to serialize session snapshot"),
        }
        Some(user.clone())
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|user| user.roles.contains(&role))
    }

    pub fn has_any_role(&self, roles: &[UserRole]) -> bool {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|user| roles.iter().any(|role| user.roles.contains(role)))
    }

    pub fn has_all_roles(&self, roles: &[UserRole]) -> bool {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|user| roles.iter().all(|role| user.roles.contains(role)))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|user| user.permissions.iter().any(|p| p == permission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use uuid::Uuid;

    fn sample_user(roles: Vec<UserRole>) -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@b.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            roles,
            permissions: vec!["employees:read".into()],
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn setting_a_user_authenticates_and_persists() {
        let storage = Arc::new(MemoryStorage::default());
        let session = SessionStore::new(storage.clone());
        assert!(!session.is_authenticated());

        session.set_user(Some(sample_user(vec![UserRole::Employee])));
        assert!(session.is_authenticated());
        assert!(storage.get(keys::SESSION).is_some());

        session.clear();
        assert!(!session.is_authenticated());
        assert!(storage.get(keys::SESSION).is_none());
    }

    #[test]
    fn hydrates_from_persisted_snapshot() {
        let storage = Arc::new(MemoryStorage::default());
        let user = sample_user(vec![UserRole::Admin]);
        storage.set(keys::SESSION, &serde_json::to_string(&user).unwrap());

        let session = SessionStore::new(storage);
        assert!(session.is_authenticated());
        assert_eq!(session.current_user().unwrap().id, user.id);
    }

    #[test]
    fn corrupt_snapshot_is_discarded_and_cleared() {
        let storage = Arc::new(MemoryStorage::default());
        storage.set(keys::SESSION, "{definitely not a user");

        let session = SessionStore::new(storage.clone());
        assert!(!session.is_authenticated());
        // fail-safe, not fail-open: the bad snapshot is gone
        assert!(storage.get(keys::SESSION).is_none());
    }

    #[test]
    fn snapshot_with_wrong_shape_is_also_discarded() {
        let storage = Arc::new(MemoryStorage::default());
        storage.set(keys::SESSION, &json!({"unexpected": true}).to_string());

        let session = SessionStore::new(storage.clone());
        assert!(!session.is_authenticated());
        assert!(storage.get(keys::SESSION).is_none());
    }

    #[test]
    fn role_and_permission_views_derive_from_current_user() {
        let session = SessionStore::new(Arc::new(MemoryStorage::default()));
        session.set_user(Some(sample_user(vec![
            UserRole::Employee,
            UserRole::HrManager,
        ])));

        assert!(session.has_role(UserRole::Employee));
        assert!(!session.has_role(UserRole::Admin));
        assert!(session.has_any_role(&[UserRole::Admin, UserRole::HrManager]));
        assert!(session.has_all_roles(&[UserRole::Employee, UserRole::HrManager]));
        assert!(!session.has_all_roles(&[UserRole::Employee, UserRole::Admin]));
        assert!(session.has_permission("employees:read"));
        assert!(!session.has_permission("payroll:write"));
    }

    #[test]
    fn signed_out_views_are_all_false() {
        let session = SessionStore::new(Arc::new(MemoryStorage::default()));
        assert!(!session.has_role(UserRole::Employee));
        assert!(!session.has_any_role(&[UserRole::Employee]));
        assert!(!session.has_all_roles(&[]));
        assert!(!session.has_permission("anything"));
    }

    #[test]
    fn update_user_merges_and_repersists() {
        let storage = Arc::new(MemoryStorage::default());
        let session = SessionStore::new(storage.clone());
        session.set_user(Some(sample_user(vec![UserRole::Employee])));

        let updated = session
            .update_user(&UpdateProfile {
                first_name: Some("Grace".into()),
                ..Default::default()
            })
            .expect("user should exist");
        assert_eq!(updated.first_name, "Grace");

        // snapshot reflects the merge
        let raw = storage.get(keys::SESSION).unwrap();
        let persisted: User = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.first_name, "Grace");
    }

    #[test]
    fn update_user_without_session_is_a_noop() {
        let session = SessionStore::new(Arc::new(MemoryStorage::default()));
        assert!(session
            .update_user(&UpdateProfile {
                first_name: Some("Grace".into()),
                ..Default::default()
            })
            .is_none());
    }
}
