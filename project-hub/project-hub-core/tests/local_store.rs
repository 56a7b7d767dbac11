use async_trait::async_trait;
use bytes::Bytes;
use project_hub_core::gates::auth::{AuthToken, CredentialIssuer};
use project_hub_core::store::local::LocalFsStore;
use project_hub_core::store::recent::RecentDocumentsFile;
use project_hub_core::store::DocumentStore;
use project_hub_core::ui::{
    ChoiceDialog, Confirmation, DocumentChooser, Message, Presentation, SaveAsFlow, UiContext,
    UndoHistory,
};
use project_hub_core::{
    Collaborators, DocumentRef, HubConfig, OpenOutcome, Project, ProjectHub, WriteErrorCode,
    WritePermission,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

const PLAN: &str = r#"{"name":"Roadmap","tasks":[{"name":"kickoff","duration":0},{"name":"build","duration":5,"owner":"ana"}],"calendar":"iso"}"#;

fn blocked_code(permission: WritePermission) -> u32 {
    match permission {
        WritePermission::Blocked { code, .. } => code,
        WritePermission::Granted => panic!("expected a blocked write"),
    }
}

#[tokio::test]
async fn write_permission_reports_catalog_codes() {
    let tempdir = tempfile::tempdir().unwrap();
    let store = LocalFsStore::new();

    let dir = DocumentRef::local(tempdir.path());
    assert_eq!(
        blocked_code(store.probe_write_permission(&dir).await),
        WriteErrorCode::IsDirectory.code()
    );

    let orphan = DocumentRef::local(tempdir.path().join("missing").join("a.json"));
    assert_eq!(
        blocked_code(store.probe_write_permission(&orphan).await),
        WriteErrorCode::CantCreate.code()
    );

    let fresh = DocumentRef::local(tempdir.path().join("a.json"));
    assert!(store.probe_write_permission(&fresh).await.is_granted());

    let locked_path = tempdir.path().join("locked.json");
    std::fs::write(&locked_path, PLAN).unwrap();
    let mut perms = std::fs::metadata(&locked_path).unwrap().permissions();
    perms.set_readonly(true);
    std::fs::set_permissions(&locked_path, perms).unwrap();
    assert_eq!(
        blocked_code(store.probe_write_permission(&DocumentRef::local(&locked_path)).await),
        WriteErrorCode::NotWritable.code()
    );
}

#[tokio::test]
async fn write_replaces_file_without_leftovers() {
    let tempdir = tempfile::tempdir().unwrap();
    let store = LocalFsStore::new();
    let doc = DocumentRef::local(tempdir.path().join("plan.json"));
    let mut written = store.subscribe();

    store.write(&doc, Bytes::from_static(PLAN.as_bytes()), false).await.unwrap();

    let fetched = store.fetch(&doc).await.unwrap();
    assert_eq!(fetched.content().as_ref(), PLAN.as_bytes());
    assert_eq!(written.recv().await.unwrap().document(), &doc);
    let names: Vec<_> = std::fs::read_dir(tempdir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["plan.json".to_string()]);
    assert!(store.can_read(&doc).await);
    assert!(!store.can_read(&DocumentRef::local(tempdir.path())).await);
}

#[tokio::test]
async fn only_foreign_writes_count_as_changes() {
    let tempdir = tempfile::tempdir().unwrap();
    let store = LocalFsStore::new();
    let path = tempdir.path().join("plan.json");
    let doc = DocumentRef::local(&path);

    store.write(&doc, Bytes::from_static(PLAN.as_bytes()), false).await.unwrap();
    assert!(store.check_external_change(&path).await.is_none());

    std::fs::write(&path, r#"{"tasks":[]}"#).unwrap();
    let event = store.check_external_change(&path).await.unwrap();
    assert_eq!(event.document(), &doc);
    assert!(store.check_external_change(&path).await.is_none());
}

#[tokio::test]
async fn online_documents_are_refused() {
    let store = LocalFsStore::new();
    let doc = DocumentRef::online("https://docs.example/p/1");
    assert_eq!(
        blocked_code(store.probe_write_permission(&doc).await),
        WriteErrorCode::GenericNetworkError.code()
    );
    assert!(store.fetch(&doc).await.is_err());
}

#[tokio::test]
async fn watching_a_path_without_file_name_fails() {
    let store = LocalFsStore::new();
    assert!(store.watch(&DocumentRef::local("/")).await.is_err());
    assert!(store.watch(&DocumentRef::local("..")).await.is_err());
}

#[derive(Default)]
struct QuietPresentation {
    errors: Mutex<Vec<String>>,
    titles: Mutex<Vec<String>>,
}

#[async_trait]
impl Presentation for QuietPresentation {
    async fn show_confirmation(&self, _question: &Message) -> Confirmation {
        Confirmation::Yes
    }
    async fn show_error(&self, error: &(dyn std::error::Error + Send + Sync)) {
        self.errors.lock().unwrap().push(error.to_string());
    }
    async fn show_choice(&self, dialog: &ChoiceDialog) -> usize {
        dialog.default
    }
    fn set_window_title(&self, title: &str) {
        self.titles.lock().unwrap().push(title.to_string());
    }
    fn set_status_text(&self, _text: &Message) {}
}

struct NoUndo;

impl UndoHistory for NoUndo {
    fn terminate(&self) {}
}

struct Nobody;

#[async_trait]
impl SaveAsFlow for Nobody {
    async fn choose_target(&self, _current: Option<&DocumentRef>) -> Option<DocumentRef> {
        None
    }
}

#[async_trait]
impl DocumentChooser for Nobody {
    async fn choose_document(&self, _dir: Option<&Path>) -> Option<DocumentRef> {
        None
    }
}

#[async_trait]
impl CredentialIssuer for Nobody {
    async fn begin_sign_in(&self) -> anyhow::Result<Option<AuthToken>> {
        Ok(None)
    }
}

#[tokio::test]
async fn open_edit_save_round_trip() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("plan.json");
    std::fs::write(&path, PLAN).unwrap();
    let recent_path = tempdir.path().join("state").join("recent.json");

    let (ui, _ui_task) = UiContext::spawn();
    let presentation = Arc::new(QuietPresentation::default());
    let recent = Arc::new(RecentDocumentsFile::open(&recent_path, 5).await.unwrap());
    let hub = ProjectHub::new(
        HubConfig {
            reopen_on_change: false,
            ..HubConfig::default()
        },
        Collaborators {
            presentation: presentation.clone(),
            store: Arc::new(LocalFsStore::new()),
            recent: recent.clone(),
            issuer: Arc::new(Nobody),
            undo: Arc::new(NoUndo),
            save_as: Arc::new(Nobody),
            chooser: Arc::new(Nobody),
        },
        ui,
    );
    let project = Project::new().shared();
    let doc = DocumentRef::local(&path);

    let opened = hub.open(doc.clone(), &project).await.unwrap();
    assert_eq!(opened, OpenOutcome::Opened(doc.clone()));

    project.lock().model_mut().tasks[1].duration = 8;
    assert!(hub.save(&project).await.is_saved());
    assert!(!project.lock().is_modified());

    let saved: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(saved["tasks"][1]["duration"], 8);
    assert_eq!(saved["tasks"][1]["owner"], "ana");
    assert_eq!(saved["tasks"][0]["milestone"], true);
    assert_eq!(saved["calendar"], "iso");

    assert!(presentation.errors.lock().unwrap().is_empty());
    assert_eq!(
        presentation.titles.lock().unwrap().last().unwrap(),
        "Project Hub [plan.json]"
    );
    let reloaded = RecentDocumentsFile::open(&recent_path, 5).await.unwrap();
    let entries = reloaded.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].document, doc);
}
