pub use minijinja::{path_loader, Environment, Value};
pub use minijinja_autoreload::AutoReloader;
pub use minijinja_embed;
use std::sync::Arc;

/// Shown in page titles and headings.
pub const PORTAL_NAME: &str = "Compliance Assistant";

pub trait ProvidesTemplateEngine {
    fn template_engine(&self) -> &Arc<TemplateEngine>;
}

/// Where rendered templates come from.
///
/// Debug builds watch the template directory. Release builds and tests render
/// from a fixed environment.
#[derive(Clone)]
pub enum TemplateEngine {
    #[cfg(debug_assertions)]
    AutoReload(Arc<AutoReloader>),
    Fixed(Arc<Environment<'static>>),
}

/// Builds a [`TemplateEngine`] for the calling crate.
///
/// The path is relative to the caller's `CARGO_MANIFEST_DIR`. Release builds
/// expect the caller's build script to have run `minijinja_embed::embed_templates!`.
#[macro_export]
macro_rules! create_template_engine {
    ($relative_path:expr) => {{
        #[cfg(debug_assertions)]
        {
            let crate_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            $crate::utils::template_engine::TemplateEngine::watching(crate_dir.join($relative_path))
        }
        #[cfg(not(debug_assertions))]
        {
            let mut env = $crate::utils::template_engine::Environment::new();
            $crate::utils::template_engine::minijinja_embed::load_templates!(&mut env);
            $crate::utils::template_engine::TemplateEngine::fixed(env)
        }
    }};
}

/// Registers the contrib filters plus the portal's own `pluralize` filter and
/// `portal_name` global.
pub fn configure_environment(env: &mut Environment<'_>) {
    minijinja_contrib::add_to_environment(env);
    env.add_filter("pluralize", pluralize);
    env.add_global("portal_name", PORTAL_NAME);
}

/// `{{ n | pluralize("question") }}` gives `1 question` or `3 questions`.
fn pluralize(count: i64, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

impl TemplateEngine {
    /// Reloads templates below `template_dir` whenever they change on disk.
    #[cfg(debug_assertions)]
    pub fn watching(template_dir: std::path::PathBuf) -> Self {
        let reloader = AutoReloader::new(move |notifier| {
            let mut env = Environment::new();
            env.set_loader(path_loader(&template_dir));
            notifier.set_fast_reload(true);
            notifier.watch_path(&template_dir, true);
            configure_environment(&mut env);
            Ok(env)
        });
        Self::AutoReload(Arc::new(reloader))
    }

    pub fn fixed(mut env: Environment<'static>) -> Self {
        configure_environment(&mut env);
        Self::Fixed(Arc::new(env))
    }

    /// Engine over in-memory `(name, source)` pairs.
    pub fn from_sources<I, N, S>(sources: I) -> Result<Self, minijinja::Error>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let mut env = Environment::new();
        for (name, source) in sources {
            env.add_template_owned(name.into(), source.into())?;
        }
        Ok(Self::fixed(env))
    }

    fn with_env<R>(
        &self,
        f: impl FnOnce(&Environment<'static>) -> Result<R, minijinja::Error>,
    ) -> Result<R, minijinja::Error> {
        match self {
            #[cfg(debug_assertions)]
            Self::AutoReload(reloader) => {
                let env = reloader.acquire_env()?;
                f(&*env)
            }
            Self::Fixed(env) => f(&**env),
        }
    }

    pub fn render(&self, name: &str, ctx: &Value) -> Result<String, minijinja::Error> {
        self.with_env(|env| env.get_template(name)?.render(ctx))
    }

    /// Renders a single block, used for htmx partial swaps.
    pub fn render_block(
        &self,
        template_name: &str,
        block_name: &str,
        ctx: &Value,
    ) -> Result<String, minijinja::Error> {
        self.with_env(|env| {
            env.get_template(template_name)?
                .eval_to_state(ctx)?
                .render_block(block_name)
        })
    }
}
