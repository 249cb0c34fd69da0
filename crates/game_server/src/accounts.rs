//! Account and player records.
//!
//! Storage sits behind [`AccountStore`] so the server never depends on a
//! particular database. [`MemoryAccountStore`] keeps everything in a
//! `DashMap` and is what the server uses unless told otherwise.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats::Stats;

/// Login record for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Game state owned by one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub username: String,
    /// Creation time, seconds since the Unix epoch
    pub created: u64,
    pub crystal: i64,
    pub private_tiles: Vec<Tile>,
    pub global_tiles: Vec<Tile>,
    pub heroes: Vec<Hero>,
    pub gold: i64,
    pub food: i64,
    pub wood: i64,
    pub stone: i64,
    pub iron: i64,
}

impl Player {
    pub fn new(username: impl Into<String>, created: u64) -> Self {
        Self {
            username: username.into(),
            created,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub tid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: i8,
    pub terrain: i8,
    pub buildings: Vec<Building>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hero {
    pub id: String,
    pub name: String,
    pub stats: Stats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for accounts and their players.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find(&self, username: &str) -> Result<Option<Account>, StoreError>;

    /// Stores `account` and `player` unless the username is already taken.
    ///
    /// Returns `false` when an account with the same username exists.
    async fn insert_if_absent(&self, account: Account, player: Player) -> Result<bool, StoreError>;

    async fn player(&self, username: &str) -> Result<Option<Player>, StoreError>;
}

/// In-process store; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: DashMap<String, (Account, Player)>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts
            .get(username)
            .map(|entry| entry.value().0.clone()))
    }

    async fn insert_if_absent(&self, account: Account, player: Player) -> Result<bool, StoreError> {
        match self.accounts.entry(account.username.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert((account, player));
                Ok(true)
            }
        }
    }

    async fn player(&self, username: &str) -> Result<Option<Player>, StoreError> {
        Ok(self
            .accounts
            .get(username)
            .map(|entry| entry.value().1.clone()))
    }
}
