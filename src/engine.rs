use std::sync::Arc;
use crate::context::Context;
use crate::error::Result;
use crate::filters::FilterRegistry;
use crate::processor::Processor;
use crate::store::{Loader, TemplateStore};
use crate::template::Template;
use crate::value::Value;


/// Loads templates by path and renders them.
///
/// An engine owns its template cache; independent engines never share
/// parsed templates. It can be shared between threads.
pub struct Engine {
    store: TemplateStore,
    filters: FilterRegistry,
}

impl Engine {
    /// An engine with the built-in filters.
    pub fn new(loader: impl Loader + 'static) -> Self {
        Engine::with_filters(loader, FilterRegistry::default())
    }

    pub fn with_filters(loader: impl Loader + 'static, filters: FilterRegistry) -> Self {
        Engine {
            store: TemplateStore::new(loader),
            filters,
        }
    }

    /// Add a filter, replacing any filter of the same name.
    pub fn register_filter<F>(&mut self, name: impl Into<String>, filter: F)
    where F: Fn(Value, Option<Value>) -> Value + Send + Sync + 'static {
        self.filters.register(name, filter);
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn load(&self, path: &str) -> Result<Arc<Template>> {
        self.store.load(path)
    }

    /// Load (or reuse) the template at `path` and render it.
    ///
    /// Syntax errors surface before any output is produced; missing
    /// values in the context never fail a render.
    pub fn render_template(&self, path: &str, context: &Context) -> Result<String> {
        let template = self.store.load(path)?;
        tracing::trace!(path, "rendering template");
        Processor::new(&self.store, &self.filters).render(&template, context)
    }
}
