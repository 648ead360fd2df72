use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::StoreError;
use crate::script::{now_millis, Script};

const APP_DIR: &str = "vnscript";
const CURRENT_FILE: &str = "current_script.json";
const PROJECTS_FILE: &str = "projects.json";

/// Key-value persistence for the open script and the project list.
///
/// The engine never decides where scripts live; it only hands `Script`
/// values to whatever implements this.
pub trait ScriptStore {
    fn load_current(&self) -> Result<Option<Script>, StoreError>;
    fn save_current(&mut self, script: &Script) -> Result<(), StoreError>;
    fn load_projects(&self) -> Result<Option<Vec<Script>>, StoreError>;
    fn save_projects(&mut self, projects: &[Script]) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    current: Option<Script>,
    projects: Option<Vec<Script>>,
}

impl ScriptStore for MemoryStore {
    fn load_current(&self) -> Result<Option<Script>, StoreError> {
        Ok(self.current.clone())
    }

    fn save_current(&mut self, script: &Script) -> Result<(), StoreError> {
        self.current = Some(script.clone());
        Ok(())
    }

    fn load_projects(&self) -> Result<Option<Vec<Script>>, StoreError> {
        Ok(self.projects.clone())
    }

    fn save_projects(&mut self, projects: &[Script]) -> Result<(), StoreError> {
        self.projects = Some(projects.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Stores each blob as a pretty-printed JSON file under one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<data dir>/vnscript`.
    pub fn open_default() -> Result<Self, StoreError> {
        let mut root = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        root.push(APP_DIR);
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read<T: serde::de::DeserializeOwned>(&self, file: &str) -> Result<Option<T>, StoreError> {
        let path = self.root.join(file);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { path, source })
    }

    fn write<T: serde::Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;
        let path = self.root.join(file);
        let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| StoreError::Io { path, source })
    }
}

impl ScriptStore for FileStore {
    fn load_current(&self) -> Result<Option<Script>, StoreError> {
        self.read(CURRENT_FILE)
    }

    fn save_current(&mut self, script: &Script) -> Result<(), StoreError> {
        self.write(CURRENT_FILE, script)
    }

    fn load_projects(&self) -> Result<Option<Vec<Script>>, StoreError> {
        self.read(PROJECTS_FILE)
    }

    fn save_projects(&mut self, projects: &[Script]) -> Result<(), StoreError> {
        self.write(PROJECTS_FILE, projects)
    }
}

// ---------------------------------------------------------------------------
// Project list
// ---------------------------------------------------------------------------

/// The ordered list of saved scripts, newest first, kept in sync with a store.
pub struct Projects<S: ScriptStore> {
    store: S,
    projects: Vec<Script>,
}

impl<S: ScriptStore> Projects<S> {
    /// Load the list. A store that has never held one is seeded with the
    /// demo script.
    pub fn open(mut store: S) -> Result<Self, StoreError> {
        let projects = match store.load_projects()? {
            Some(projects) => projects,
            None => {
                info!("No project list yet, seeding with the demo script");
                let seeded = vec![Script::demo()];
                store.save_projects(&seeded)?;
                seeded
            }
        };
        Ok(Self { store, projects })
    }

    pub fn list(&self) -> &[Script] {
        &self.projects
    }

    pub fn get(&self, id: &str) -> Option<&Script> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        self.store.save_projects(&self.projects)
    }

    /// Replace the project with the same id, or add it at the front.
    pub fn upsert(&mut self, script: Script) -> Result<(), StoreError> {
        match self.projects.iter_mut().find(|p| p.id == script.id) {
            Some(existing) => *existing = script,
            None => self.projects.insert(0, script),
        }
        self.persist()
    }

    pub fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let before = self.projects.len();
        self.projects.retain(|p| p.id != id);
        if self.projects.len() == before {
            return Err(StoreError::UnknownProject(id.to_string()));
        }
        self.persist()
    }

    /// Add an imported script at the front. An id clash gets a new id and a
    /// marked title instead of overwriting. Returns the stored copy.
    pub fn import(&mut self, mut script: Script) -> Result<Script, StoreError> {
        if self.get(&script.id).is_some() {
            warn!("Imported script id '{}' already exists, re-keying", script.id);
            script.id = format!("imported-{}", now_millis());
            script.title.push_str("（导入）");
        }
        self.projects.insert(0, script.clone());
        self.persist()?;
        Ok(script)
    }

    pub fn duplicate(&mut self, id: &str) -> Result<Script, StoreError> {
        let source = self
            .get(id)
            .ok_or_else(|| StoreError::UnknownProject(id.to_string()))?;
        let now = now_millis();
        let mut copy = source.clone();
        copy.id = format!("copy-{now}");
        copy.title.push_str("（副本）");
        copy.created_at = now;
        copy.updated_at = now;

        self.projects.insert(0, copy.clone());
        self.persist()?;
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vnscript-{name}-{}", uuid::Uuid::new_v4()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_open_seeds_demo() {
        let projects = Projects::open(MemoryStore::default()).unwrap();
        assert_eq!(projects.list().len(), 1);
        assert_eq!(projects.list()[0].id, "demo-script");
        assert!(projects.store().load_projects().unwrap().is_some());
    }

    #[test]
    fn test_upsert_replaces_or_prepends() {
        let mut projects = Projects::open(MemoryStore::default()).unwrap();
        let blank = Script::new_blank();
        projects.upsert(blank.clone()).unwrap();
        assert_eq!(projects.list()[0].id, blank.id);

        let mut renamed = blank.clone();
        renamed.set_title("改");
        projects.upsert(renamed).unwrap();
        assert_eq!(projects.list().len(), 2);
        assert_eq!(projects.get(&blank.id).unwrap().title, "改");
    }

    #[test]
    fn test_import_rekeys_on_clash() {
        let mut projects = Projects::open(MemoryStore::default()).unwrap();
        let saved = projects.import(Script::demo()).unwrap();
        assert!(saved.id.starts_with("imported-"));
        assert_eq!(saved.title, "记忆碎片（导入）");
        assert_eq!(projects.list().len(), 2);

        let fresh = Script::new_blank();
        let kept = projects.import(fresh.clone()).unwrap();
        assert_eq!(kept.id, fresh.id);
    }

    #[test]
    fn test_duplicate_and_delete() {
        let mut projects = Projects::open(MemoryStore::default()).unwrap();
        let copy = projects.duplicate("demo-script").unwrap();
        assert!(copy.id.starts_with("copy-"));
        assert!(copy.title.ends_with("（副本）"));
        assert_eq!(projects.list()[0].id, copy.id);

        projects.delete(&copy.id).unwrap();
        assert_eq!(projects.list().len(), 1);
        assert!(matches!(
            projects.delete("nope"),
            Err(StoreError::UnknownProject(_))
        ));
        assert!(projects.duplicate("nope").is_err());
    }

    #[test]
    fn test_file_store_round_trip() {
        let root = temp_root("roundtrip");
        let mut store = FileStore::new(&root);
        assert!(store.load_current().unwrap().is_none());

        let demo = Script::demo();
        store.save_current(&demo).unwrap();
        assert_eq!(store.load_current().unwrap(), Some(demo));

        let projects = Projects::open(FileStore::new(&root)).unwrap();
        assert_eq!(projects.list().len(), 1);
        assert!(root.join(PROJECTS_FILE).exists());

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_file_store_reports_corruption() {
        let root = temp_root("corrupt");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(CURRENT_FILE), "{ not json").unwrap();

        let store = FileStore::new(&root);
        assert!(matches!(
            store.load_current(),
            Err(StoreError::Corrupt { .. })
        ));

        fs::remove_dir_all(&root).unwrap();
    }
}
