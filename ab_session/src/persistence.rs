// Durable local state: the device session id, the progress snapshot and the latest result.

use log::{debug, warn};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io;

use crate::config::*;

pub const SESSION_ID_KEY: &str = "abTestSessionId";
pub const PROGRESS_KEY: &str = "abTestProgress";
pub const RESULT_KEY: &str = "abTestResults";

pub const SESSION_ID_LEN: usize = 10;
const SESSION_ID_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A device-local string store. Single writer, single reader.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&mut self, key: &str) -> io::Result<()>;
}

/// A store that lives as long as the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Generates a session identifier of 10 uppercase letters and digits.
pub fn generate_session_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SESSION_ID_LEN)
        .map(|_| SESSION_ID_CHARS[rng.random_range(0..SESSION_ID_CHARS.len())] as char)
        .collect()
}

fn is_session_id(s: &str) -> bool {
    s.len() == SESSION_ID_LEN && s.bytes().all(|b| SESSION_ID_CHARS.contains(&b))
}

/// Reads and writes the session records.
///
/// Saving never fails the caller: a failed write is logged and the session
/// continues in memory. Missing or malformed records read as absent.
#[derive(Debug)]
pub struct Gateway<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Gateway<S> {
    pub fn new(store: S) -> Gateway<S> {
        Gateway { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// The session id of this device, created and stored on first use.
    pub fn session_id<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        match self.read(SESSION_ID_KEY) {
            Some(id) if is_session_id(&id) => id,
            other => {
                if let Some(bad) = other {
                    warn!("session_id: ignoring malformed stored id {:?}", bad);
                }
                let id = generate_session_id(rng);
                debug!("session_id: created {}", id);
                self.write(SESSION_ID_KEY, &id);
                id
            }
        }
    }

    pub fn clear_session_id(&mut self) {
        self.delete(SESSION_ID_KEY)
    }

    pub fn save_progress(&mut self, progress: &SessionProgress) {
        self.save_json(PROGRESS_KEY, progress)
    }

    pub fn load_progress(&self) -> Option<SessionProgress> {
        self.load_json(PROGRESS_KEY)
    }

    pub fn clear_progress(&mut self) {
        self.delete(PROGRESS_KEY)
    }

    pub fn save_result(&mut self, result: &FinalResult) {
        self.save_json(RESULT_KEY, result)
    }

    pub fn load_result(&self) -> Option<FinalResult> {
        self.load_json(RESULT_KEY)
    }

    fn save_json<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(js) => self.write(key, &js),
            Err(e) => warn!("save_json: could not serialize {}: {}", key, e),
        }
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let js = self.read(key)?;
        match serde_json::from_str(&js) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("load_json: malformed record {}: {}", key, e);
                None
            }
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(v) => v,
            Err(e) => {
                warn!("read: could not read {}: {}", key, e);
                None
            }
        }
    }

    fn write(&mut self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!("write: could not write {}: {}", key, e);
        }
    }

    fn delete(&mut self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!("delete: could not remove {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> io::Result<Option<String>> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
        fn set(&mut self, _key: &str, _value: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
        fn remove(&mut self, _key: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    fn progress(session_id: &str) -> SessionProgress {
        SessionProgress {
            session_id: session_id.to_string(),
            test_data: vec![],
            current_question_index: 0,
            user_answers: vec![],
            user_notes: NoteMap::new(),
            original_labels: vec![Label::A, Label::B],
        }
    }

    #[test]
    fn session_id_is_stable() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut gw = Gateway::new(MemoryStore::new());
        let id = gw.session_id(&mut rng);
        assert!(is_session_id(&id));
        assert_eq!(gw.session_id(&mut rng), id);
        gw.clear_session_id();
        assert_ne!(gw.session_id(&mut rng), id);
    }

    #[test]
    fn malformed_session_id_is_replaced() {
        let mut store = MemoryStore::new();
        store.set(SESSION_ID_KEY, "short").unwrap();
        let mut gw = Gateway::new(store);
        let id = gw.session_id(&mut StdRng::seed_from_u64(1));
        assert!(is_session_id(&id));
    }

    #[test]
    fn progress_overwrites_and_clears() {
        let mut gw = Gateway::new(MemoryStore::new());
        assert_eq!(gw.load_progress(), None);
        gw.save_progress(&progress("AAAAAAAAAA"));
        gw.save_progress(&progress("BBBBBBBBBB"));
        assert_eq!(gw.load_progress().unwrap().session_id, "BBBBBBBBBB");
        gw.clear_progress();
        assert_eq!(gw.load_progress(), None);
    }

    #[test]
    fn clearing_progress_keeps_result() {
        let mut gw = Gateway::new(MemoryStore::new());
        let result = FinalResult {
            session_id: "AAAAAAAAAA".to_string(),
            nickname: "kim".to_string(),
            upload_time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            test_data: vec![],
            user_answers: vec![],
            user_notes: NoteMap::new(),
            original_labels: vec![],
        };
        gw.save_result(&result);
        gw.save_progress(&progress("AAAAAAAAAA"));
        gw.clear_progress();
        assert_eq!(gw.load_result(), Some(result));
    }

    #[test]
    fn malformed_records_read_as_absent() {
        let mut store = MemoryStore::new();
        store.set(PROGRESS_KEY, "{not json").unwrap();
        store.set(RESULT_KEY, r#"{"sessionId": 3}"#).unwrap();
        let gw = Gateway::new(store);
        assert_eq!(gw.load_progress(), None);
        assert_eq!(gw.load_result(), None);
    }

    #[test]
    fn store_failures_degrade_silently() {
        let mut gw = Gateway::new(BrokenStore);
        gw.save_progress(&progress("AAAAAAAAAA"));
        assert_eq!(gw.load_progress(), None);
        let id = gw.session_id(&mut StdRng::seed_from_u64(9));
        assert!(is_session_id(&id));
    }
}
