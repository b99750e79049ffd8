use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::users::{
    normalize_email, NewLocation, ProfileUpdate, SavedLocation, User, UserStore,
    MAX_SAVED_LOCATIONS,
};

#[derive(Default)]
struct Users {
    by_id: HashMap<Uuid, User>,
    by_email: HashMap<String, Uuid>,
}

impl Users {
    fn user_mut(&mut self, id: Uuid) -> Result<&mut User, AppError> {
        self.by_id.get_mut(&id).ok_or(AppError::UserNotFound)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<Users>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<T>(_: T) -> AppError {
        AppError::StorageError("Lock poisoned".into())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_or_create(&self, email: &str, name: &str) -> Result<(User, bool), AppError> {
        let email = normalize_email(email);
        let mut users = self.users.write().map_err(Self::poisoned)?;

        if let Some(user) = users
            .by_email
            .get(&email)
            .and_then(|id| users.by_id.get(id))
        {
            return Ok((user.clone(), false));
        }

        let user = User::new(name, &email);
        users.by_email.insert(email, user.id);
        users.by_id.insert(user.id, user.clone());
        Ok((user, true))
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let users = self.users.read().map_err(Self::poisoned)?;
        Ok(users.by_id.get(&id).cloned())
    }

    async fn issue_renewal_token(&self, id: Uuid, token: &str) -> Result<(), AppError> {
        let mut users = self.users.write().map_err(Self::poisoned)?;
        users.user_mut(id)?.renewal.issue(token, Utc::now());
        Ok(())
    }

    async fn rotate_renewal_token(
        &self,
        id: Uuid,
        presented: &str,
        replacement: &str,
    ) -> Result<bool, AppError> {
        let mut users = self.users.write().map_err(Self::poisoned)?;
        match users.by_id.get_mut(&id) {
            Some(user) => Ok(user.renewal.supersede(presented, replacement, Utc::now())),
            None => Ok(false),
        }
    }

    async fn revoke_renewal_token(&self, id: Uuid, token: &str) -> Result<(), AppError> {
        let mut users = self.users.write().map_err(Self::poisoned)?;
        if let Some(user) = users.by_id.get_mut(&id) {
            user.renewal.revoke(token);
        }
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<User, AppError> {
        let mut users = self.users.write().map_err(Self::poisoned)?;
        let user = users.user_mut(id)?;

        if let Some(name) = update.name {
            user.name = name.trim().to_string();
        }
        if let Some(prefs) = update.preferences {
            if let Some(theme) = prefs.theme {
                user.preferences.theme = theme;
            }
            if let Some(location) = prefs.default_location {
                user.preferences.default_location = Some(location);
            }
            if let Some(topics) = prefs.news_topics {
                user.preferences.news_topics =
                    topics.into_iter().map(|t| t.trim().to_string()).collect();
            }
        }

        Ok(user.clone())
    }

    async fn add_location(
        &self,
        id: Uuid,
        location: NewLocation,
    ) -> Result<SavedLocation, AppError> {
        let mut users = self.users.write().map_err(Self::poisoned)?;
        let user = users.user_mut(id)?;

        let name = location.name.trim().to_string();
        if user
            .saved_locations
            .iter()
            .any(|l| l.name.to_lowercase() == name.to_lowercase())
        {
            return Err(AppError::LocationExists);
        }
        if user.saved_locations.len() >= MAX_SAVED_LOCATIONS {
            return Err(AppError::LocationLimit(MAX_SAVED_LOCATIONS));
        }

        let saved = SavedLocation {
            id: Uuid::new_v4(),
            name,
            country: location.country,
            lat: location.lat,
            lon: location.lon,
            temp: location.temp.trunc() as i64,
            icon: location.icon,
            condition: location.condition,
            created_at: Utc::now(),
        };
        user.saved_locations.push(saved.clone());
        Ok(saved)
    }

    async fn remove_location(
        &self,
        id: Uuid,
        location_id: Uuid,
    ) -> Result<SavedLocation, AppError> {
        let mut users = self.users.write().map_err(Self::poisoned)?;
        let user = users.user_mut(id)?;

        let index = user
            .saved_locations
            .iter()
            .position(|l| l.id == location_id)
            .ok_or(AppError::LocationNotFound)?;
        Ok(user.saved_locations.remove(index))
    }
}
