#![allow(dead_code)]

pub mod temp_files {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

    /// Unique path in the temp dir; nothing is created
    pub fn temp_path(ext: &str) -> PathBuf {
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "brrt_core_test_{}_{}_{}.{}",
            std::process::id(),
            counter,
            nanos,
            ext
        ))
    }

    /// Write `content` to a fresh temp file with extension `ext`
    pub fn create_temp_file(content: &str, ext: &str) -> PathBuf {
        let path = temp_path(ext);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn create_temp_yaml(content: &str) -> PathBuf {
        create_temp_file(content, "yaml")
    }

    /// Cleanup temporary files (best effort)
    pub fn cleanup_temp_files(paths: &[PathBuf]) {
        for path in paths {
            let _ = std::fs::remove_file(path);
        }
    }
}

pub mod fixtures {
    use brrtrouter_core::definition::{CommandDefinition, RouteDefinition};
    use brrtrouter_core::manifest::ManifestScanner;
    use brrtrouter_core::registry::{Registry, SetupOptions};
    use brrtrouter_core::router::Router;
    use std::path::Path;
    use std::sync::Arc;

    /// Routes and commands of a small zoo service
    pub const ZOO_MANIFEST: &str = r#"
routes:
  - name: root
    path: /
    methods: [GET]
    target: Zoo::root
  - name: animals.list
    path: /zoo/animals
    methods: [GET]
    target: Animals::list
  - name: animals.create
    path: /zoo/animals
    methods: [POST]
    target: Animals::create
  - name: animals.show
    path: /zoo/animals/{id}
    methods: [GET, PUT, PATCH, DELETE]
    target: Animals::show
    parameters:
      - name: id
        pattern: '\d+'
        cast: integer
  - name: animals.by_species
    path: /zoo/animals/{species}
    methods: [GET]
    target: Animals::by_species
  - name: enclosures.page
    path: /zoo/enclosures/{page?}
    methods: [GET]
    target: Enclosures::page
    parameters:
      - name: page
        pattern: '\d+'
        cast: integer
        default: 1
  - name: files
    path: /zoo/files/{path}
    target: Files::show
    parameters:
      - name: path
        repeatable: true
  - name: health
    path: /zoo/health
    methods: [GET]
    target: Zoo::health

commands:
  - name: feed
    signature: "feed {animal} {--portions=} {--dry-run}"
    description: Feed an animal
    target: FeedCommand
    parameters:
      - name: portions
        pattern: '\d+'
        cast: integer
        default: 1
  - name: tag
    signature: "tag {animal} {labels}"
    target: TagCommand
    parameters:
      - name: labels
        repeatable: true
"#;

    pub fn route_registry(manifest: &Path) -> Registry<RouteDefinition> {
        let mut registry = Registry::new();
        registry
            .setup(&ManifestScanner::new(manifest), &SetupOptions::default())
            .unwrap();
        registry
    }

    pub fn command_registry(manifest: &Path) -> Registry<CommandDefinition> {
        let mut registry = Registry::new();
        registry
            .setup(&ManifestScanner::new(manifest), &SetupOptions::default())
            .unwrap();
        registry
    }

    pub fn route_router(manifest: &Path) -> Router<RouteDefinition> {
        Router::new(Arc::new(route_registry(manifest)))
    }

    pub fn command_router(manifest: &Path) -> Router<CommandDefinition> {
        Router::new(Arc::new(command_registry(manifest)))
    }
}
