use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::common::{Favorite, Message, UserId};

use super::error::KvError;
use super::kv_store::{FAVORITES_KEY, KeyValueStore, read_json, write_json};

/// Starred messages per user, newest last. The whole map is rewritten on
/// every change.
pub struct FavoritesStore {
    store: Arc<dyn KeyValueStore>,
    by_owner: HashMap<String, Vec<Favorite>>,
}

impl FavoritesStore {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let by_owner = read_json(store.as_ref(), FAVORITES_KEY).unwrap_or_default();
        Self { store, by_owner }
    }

    pub fn list(&self, owner: &UserId) -> &[Favorite] {
        self.by_owner
            .get(owner.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, owner: &UserId, message_id: &str) -> bool {
        self.list(owner).iter().any(|f| f.message_id == message_id)
    }

    /// Stars the message, or unstars it if it already is. Returns whether
    /// it is starred afterwards.
    pub fn toggle(&mut self, owner: &UserId, message: &Message) -> Result<bool, KvError> {
        if self.remove(owner, &message.id)? {
            return Ok(false);
        }

        self.by_owner
            .entry(owner.as_str().to_string())
            .or_default()
            .push(Favorite {
                message_id: message.id.clone(),
                text: message.text.clone(),
                sender: message.sender,
                language: message.language.clone(),
                saved_at: Utc::now(),
            });
        self.persist()?;
        Ok(true)
    }

    /// Returns false if the message was not starred.
    pub fn remove(&mut self, owner: &UserId, message_id: &str) -> Result<bool, KvError> {
        let Some(favorites) = self.by_owner.get_mut(owner.as_str()) else {
            return Ok(false);
        };
        let before = favorites.len();
        favorites.retain(|f| f.message_id != message_id);
        if favorites.len() == before {
            return Ok(false);
        }
        if favorites.is_empty() {
            self.by_owner.remove(owner.as_str());
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> Result<(), KvError> {
        write_json(self.store.as_ref(), FAVORITES_KEY, &self.by_owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Sender;
    use crate::storage::kv_store::MemoryKeyValueStore;

    #[test]
    fn toggle_stars_then_unstars() {
        let mut favorites = FavoritesStore::load(Arc::new(MemoryKeyValueStore::new()));
        let owner = UserId::new("ana");
        let message = Message::new("¡Qué bonito!".to_string(), Sender::Ai, "es");

        assert!(favorites.toggle(&owner, &message).unwrap());
        assert!(favorites.contains(&owner, &message.id));
        assert_eq!(favorites.list(&owner)[0].text, "¡Qué bonito!");

        assert!(!favorites.toggle(&owner, &message).unwrap());
        assert!(favorites.list(&owner).is_empty());
    }

    #[test]
    fn favorites_are_per_user_and_survive_reload() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let ana = UserId::new("ana");
        let ben = UserId::new("ben");
        let message = Message::new("Hola".to_string(), Sender::User, "es");
        {
            let mut favorites = FavoritesStore::load(kv.clone());
            favorites.toggle(&ana, &message).unwrap();
        }

        let reloaded = FavoritesStore::load(kv);
        assert!(reloaded.contains(&ana, &message.id));
        assert!(!reloaded.contains(&ben, &message.id));
        assert!(reloaded.list(&ben).is_empty());
    }

    #[test]
    fn removing_unknown_favorite_is_a_no_op() {
        let mut favorites = FavoritesStore::load(Arc::new(MemoryKeyValueStore::new()));
        assert!(!favorites.remove(&UserId::new("ana"), "missing").unwrap());
    }
}
