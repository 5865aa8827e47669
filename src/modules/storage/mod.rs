pub mod file;
pub mod memory;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::rc::Rc;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Keyed string storage with get/set/remove semantics.
///
/// Implementations use interior mutability so one store can be shared
/// between the gates through an `Rc`.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

/// Read a key and decode it as JSON. Missing keys and undecodable values both yield `None`.
pub fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    serde_json::from_str(&raw).ok()
}

/// Encode a value as JSON and store it under `key`
pub fn set_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> io::Result<()> {
    let data = serde_json::to_string(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    store.set(key, &data)
}

/// The two storage scopes the portal works with.
///
/// `durable` survives restarts and is shared by every context on the device;
/// `session` belongs to a single context and is thrown away with it.
#[derive(Clone)]
pub struct Storage {
    pub durable: Rc<dyn KeyValueStore>,
    pub session: Rc<dyn KeyValueStore>,
}

impl Storage {
    pub fn new(durable: Rc<dyn KeyValueStore>, session: Rc<dyn KeyValueStore>) -> Self {
        Self { durable, session }
    }

    /// Both scopes held in memory
    pub fn in_memory() -> Self {
        Self::new(Rc::new(MemoryStore::new()), Rc::new(MemoryStore::new()))
    }

    /// A new context over the same durable state, with empty session storage
    pub fn new_context(&self) -> Self {
        Self::new(Rc::clone(&self.durable), Rc::new(MemoryStore::new()))
    }
}
