use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use parking_lot::Mutex;
use crate::error::{Error, Result};
use crate::template::Template;


/// Supplies template source text for a logical path.
pub trait Loader: Send + Sync {
    fn read_source(&self, path: &str) -> io::Result<String>;
}

impl<F> Loader for F
where F: Fn(&str) -> io::Result<String> + Send + Sync {
    fn read_source(&self, path: &str) -> io::Result<String> {
        self(path)
    }
}


/// Reads templates from files below a root directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileLoader { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Loader for FileLoader {
    fn read_source(&self, path: &str) -> io::Result<String> {
        let relative = Path::new(path);
        let escapes_root = relative.components().any(|component| !matches!(
            component,
            Component::Normal(_) | Component::CurDir
        ));
        if escapes_root {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("template path `{}` must stay below the template root", path)
            ));
        }
        fs::read_to_string(self.root.join(relative))
    }
}


/// In-memory templates, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        MemoryLoader { templates: HashMap::new() }
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(path.into(), source.into());
    }

    pub fn with(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }
}

impl Loader for MemoryLoader {
    fn read_source(&self, path: &str) -> io::Result<String> {
        self.templates.get(path).cloned().ok_or_else(|| io::Error::new(
            io::ErrorKind::NotFound,
            format!("no template named `{}`", path)
        ))
    }
}


/// Parsed templates by path, each read and parsed at most once.
///
/// Cached templates are never invalidated: later changes to the
/// underlying source are not observed.
pub struct TemplateStore {
    loader: Box<dyn Loader>,
    cache: Mutex<HashMap<String, Arc<Template>>>,
}

impl TemplateStore {
    pub fn new(loader: impl Loader + 'static) -> Self {
        TemplateStore {
            loader: Box::new(loader),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn load(&self, path: &str) -> Result<Arc<Template>> {
        // held across read and parse so concurrent callers never parse twice
        let mut cache = self.cache.lock();
        if let Some(template) = cache.get(path) {
            tracing::trace!(path, "template cache hit");
            return Ok(Arc::clone(template));
        }
        let source = self.loader.read_source(path).map_err(|source| Error::Load {
            path: path.to_owned(),
            source,
        })?;
        let template = Arc::new(Template::parse(path, &source)?);
        tracing::debug!(path, nodes = template.nodes().len(), "template parsed and cached");
        cache.insert(path.to_owned(), Arc::clone(&template));
        Ok(template)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.cache.lock().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}
