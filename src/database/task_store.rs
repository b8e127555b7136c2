use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::models::{Deleted, NewTask, Task, TaskPatch};

/// On-disk layout: `{ "tasks": [...], "nextId": n }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreDocument {
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default = "first_id")]
    next_id: i64,
}

fn first_id() -> i64 {
    1
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: first_id(),
        }
    }
}

/// JSON-file backed task list. Every mutation rewrites the whole file.
#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
    doc: StoreDocument,
}

impl TaskStore {
    /// Load the store at `path`, or start empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        let mut doc = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<StoreDocument>(&content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => StoreDocument::default(),
            Err(e) => return Err(e.into()),
        };

        let max_id = doc.tasks.iter().map(|t| t.id).max().unwrap_or(0);
        let floor = following_id(max_id)?;
        if doc.next_id < floor {
            log::warn!(
                "[TaskStore] nextId {} is behind stored ids, raising to {}",
                doc.next_id,
                floor
            );
            doc.next_id = floor;
        }

        log::info!(
            "[TaskStore] Opened {} ({} tasks, nextId={})",
            path.display(),
            doc.tasks.len(),
            doc.next_id
        );

        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn next_id(&self) -> i64 {
        self.doc.next_id
    }

    /// All tasks, most recently created first.
    pub fn list_tasks(&self) -> Vec<Task> {
        let mut tasks = self.doc.tasks.clone();
        tasks.sort_by(|a, b| b.id.cmp(&a.id));
        tasks
    }

    pub fn create_task(&mut self, new_task: NewTask) -> StoreResult<Task> {
        validate_title(&new_task.title)?;
        let next_id = following_id(self.doc.next_id)?;

        let task = Task {
            id: self.doc.next_id,
            title: new_task.title,
            status: new_task.status.unwrap_or_default(),
        };

        let mut doc = self.doc.clone();
        doc.tasks.push(task.clone());
        doc.next_id = next_id;
        self.commit(doc)?;

        Ok(task)
    }

    pub fn update_task(&mut self, patch: TaskPatch) -> StoreResult<Task> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }

        let idx = self
            .doc
            .tasks
            .iter()
            .position(|t| t.id == patch.id)
            .ok_or(StoreError::NotFound(patch.id))?;

        let existing = &self.doc.tasks[idx];
        let updated = Task {
            id: existing.id,
            title: patch.title.unwrap_or_else(|| existing.title.clone()),
            status: patch.status.unwrap_or(existing.status),
        };

        let mut doc = self.doc.clone();
        doc.tasks[idx] = updated.clone();
        self.commit(doc)?;

        Ok(updated)
    }

    /// Removing an id that does not exist is not an error.
    pub fn delete_task(&mut self, id: i64) -> StoreResult<Deleted> {
        let mut doc = self.doc.clone();
        doc.tasks.retain(|t| t.id != id);
        self.commit(doc)?;

        Ok(Deleted { id })
    }

    pub fn flush(&self) -> StoreResult<()> {
        write_document(&self.path, &self.doc)
    }

    // Memory only changes once the new document is on disk.
    fn commit(&mut self, doc: StoreDocument) -> StoreResult<()> {
        write_document(&self.path, &doc)?;
        self.doc = doc;
        Ok(())
    }
}

fn validate_title(title: &str) -> StoreResult<()> {
    if title.trim().is_empty() {
        return Err(StoreError::InvalidInput(
            "task title must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn following_id(id: i64) -> StoreResult<i64> {
    id.checked_add(1)
        .ok_or_else(|| StoreError::InvalidInput("task id space exhausted".to_string()))
}

fn write_document(path: &Path, doc: &StoreDocument) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let content = serde_json::to_vec_pretty(doc)?;
    fs::write(&tmp_path, content)?;
    fs::rename(&tmp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use tempfile::TempDir;

    fn setup_store() -> (TaskStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = TaskStore::open(temp_dir.path().join("tasks.json")).unwrap();
        (store, temp_dir)
    }

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_fresh_store_defaults() {
        let (store, temp) = setup_store();
        assert!(store.list_tasks().is_empty());
        assert_eq!(store.next_id(), 1);
        // Nothing is written until the first mutation.
        assert!(!temp.path().join("tasks.json").exists());
    }

    #[test]
    fn test_task_lifecycle_scenario() {
        let (mut store, _temp) = setup_store();

        let milk = store.create_task(NewTask::new("Buy milk")).unwrap();
        assert_eq!(
            milk,
            Task {
                id: 1,
                title: "Buy milk".to_string(),
                status: TaskStatus::Todo,
            }
        );

        let bob = store
            .create_task(NewTask::new("Call Bob").with_status(TaskStatus::InProgress))
            .unwrap();
        assert_eq!(bob.id, 2);
        assert_eq!(bob.status, TaskStatus::InProgress);

        assert_eq!(ids(&store.list_tasks()), vec![2, 1]);

        let done = store
            .update_task(TaskPatch {
                id: 1,
                status: Some(TaskStatus::Done),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(done.title, "Buy milk");
        assert_eq!(done.status, TaskStatus::Done);

        assert_eq!(store.delete_task(2).unwrap(), Deleted { id: 2 });
        assert_eq!(
            store.list_tasks(),
            vec![Task {
                id: 1,
                title: "Buy milk".to_string(),
                status: TaskStatus::Done,
            }]
        );
    }

    #[test]
    fn test_ids_strictly_increase_and_are_never_reused() {
        let (mut store, _temp) = setup_store();

        let mut seen = Vec::new();
        for i in 0..5 {
            let task = store.create_task(NewTask::new(format!("task {}", i))).unwrap();
            seen.push(task.id);
        }
        assert!(seen.windows(2).all(|w| w[0] < w[1]));

        store.delete_task(5).unwrap();
        let next = store.create_task(NewTask::new("after delete")).unwrap();
        assert_eq!(next.id, 6);
    }

    #[test]
    fn test_list_is_sorted_newest_first() {
        let (mut store, _temp) = setup_store();
        for title in ["a", "b", "c"] {
            store.create_task(NewTask::new(title)).unwrap();
        }
        assert_eq!(ids(&store.list_tasks()), vec![3, 2, 1]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (mut store, _temp) = setup_store();
        store.create_task(NewTask::new("a")).unwrap();
        store.create_task(NewTask::new("b")).unwrap();

        store.delete_task(1).unwrap();
        let after_first = store.list_tasks();

        assert_eq!(store.delete_task(1).unwrap(), Deleted { id: 1 });
        assert_eq!(store.list_tasks(), after_first);
        assert_eq!(store.delete_task(42).unwrap(), Deleted { id: 42 });
    }

    #[test]
    fn test_update_missing_task_leaves_store_unchanged() {
        let (mut store, _temp) = setup_store();
        store.create_task(NewTask::new("a")).unwrap();
        let before = store.list_tasks();

        let err = store
            .update_task(TaskPatch {
                id: 9,
                status: Some(TaskStatus::Done),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(9)));
        assert_eq!(err.to_string(), "Task with id 9 not found");
        assert_eq!(store.list_tasks(), before);
    }

    #[test]
    fn test_update_title_keeps_status() {
        let (mut store, _temp) = setup_store();
        store
            .create_task(NewTask::new("draft").with_status(TaskStatus::Backlog))
            .unwrap();

        let updated = store
            .update_task(TaskPatch {
                id: 1,
                title: Some("final".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.title, "final");
        assert_eq!(updated.status, TaskStatus::Backlog);
    }

    #[test]
    fn test_blank_titles_are_rejected() {
        let (mut store, _temp) = setup_store();
        assert!(matches!(
            store.create_task(NewTask::new("   ")),
            Err(StoreError::InvalidInput(_))
        ));
        assert_eq!(store.next_id(), 1);

        store.create_task(NewTask::new("real")).unwrap();
        let err = store
            .update_task(TaskPatch {
                id: 1,
                title: Some(String::new()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert_eq!(store.list_tasks()[0].title, "real");
    }

    #[test]
    fn test_reload_yields_identical_collection() {
        let (mut store, temp) = setup_store();
        store.create_task(NewTask::new("one")).unwrap();
        store
            .create_task(NewTask::new("two").with_status(TaskStatus::Done))
            .unwrap();
        store.create_task(NewTask::new("three")).unwrap();
        store.delete_task(2).unwrap();
        let before = store.list_tasks();
        store.flush().unwrap();

        let reloaded = TaskStore::open(temp.path().join("tasks.json")).unwrap();
        assert_eq!(reloaded.list_tasks(), before);
        assert_eq!(reloaded.next_id(), 4);
    }

    #[test]
    fn test_file_layout_matches_wire_names() {
        let (mut store, temp) = setup_store();
        store.create_task(NewTask::new("x")).unwrap();

        let raw = fs::read_to_string(temp.path().join("tasks.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["nextId"], 2);
        assert_eq!(value["tasks"][0]["status"], "todo");
        assert!(!temp.path().join("tasks.json.tmp").exists());
    }

    #[test]
    fn test_stale_counter_is_raised_on_open() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tasks.json");
        fs::write(
            &path,
            r#"{"tasks":[{"id":7,"title":"old","status":"done"}],"nextId":3}"#,
        )
        .unwrap();

        let mut store = TaskStore::open(&path).unwrap();
        assert_eq!(store.next_id(), 8);
        assert_eq!(store.create_task(NewTask::new("new")).unwrap().id, 8);
    }

    #[test]
    fn test_corrupt_file_fails_to_open() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tasks.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            TaskStore::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_mutations_persist_without_flush() {
        let (mut store, temp) = setup_store();
        store.create_task(NewTask::new("keep")).unwrap();
        store.create_task(NewTask::new("drop")).unwrap();
        store
            .update_task(TaskPatch {
                id: 1,
                title: Some("kept".to_string()),
                status: Some(TaskStatus::InProgress),
            })
            .unwrap();
        store.delete_task(2).unwrap();
        let before = store.list_tasks();
        drop(store);

        let reloaded = TaskStore::open(temp.path().join("tasks.json")).unwrap();
        assert_eq!(
            reloaded.list_tasks(),
            vec![Task {
                id: 1,
                title: "kept".to_string(),
                status: TaskStatus::InProgress,
            }]
        );
        assert_eq!(reloaded.list_tasks(), before);
        assert_eq!(reloaded.next_id(), 3);
    }

    #[test]
    fn test_exhausted_id_space_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tasks.json");
        fs::write(
            &path,
            format!(
                r#"{{"tasks":[{{"id":{},"title":"last","status":"todo"}}],"nextId":1}}"#,
                i64::MAX
            ),
        )
        .unwrap();
        assert!(matches!(
            TaskStore::open(&path),
            Err(StoreError::InvalidInput(_))
        ));

        fs::write(&path, format!(r#"{{"tasks":[],"nextId":{}}}"#, i64::MAX)).unwrap();
        let mut store = TaskStore::open(&path).unwrap();
        let err = store.create_task(NewTask::new("one too many")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert!(store.list_tasks().is_empty());
        assert_eq!(store.next_id(), i64::MAX);
    }

    #[test]
    fn test_creates_missing_parent_directories() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("dir").join("tasks.json");
        let mut store = TaskStore::open(&path).unwrap();
        store.create_task(NewTask::new("deep")).unwrap();
        assert!(path.exists());
    }
}
