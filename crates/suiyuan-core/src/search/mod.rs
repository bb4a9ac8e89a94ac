//! Search and homepage URLs for the built-in and custom engines.

use crate::error::{Error, Result};
use crate::models::{CustomEngine, SettingsRecord};
use crate::util::is_http_url;

/// Engines available without configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinEngine {
    Bing,
    Google,
    Baidu,
}

impl BuiltinEngine {
    pub const ALL: [Self; 3] = [Self::Bing, Self::Google, Self::Baidu];

    pub const fn id(self) -> &'static str {
        match self {
            Self::Bing => "bing",
            Self::Google => "google",
            Self::Baidu => "baidu",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|engine| engine.id() == id)
    }

    const fn search_prefix(self) -> &'static str {
        match self {
            Self::Bing => "https://www.bing.com/search?q=",
            Self::Google => "https://www.google.com/search?q=",
            Self::Baidu => "https://www.baidu.com/s?wd=",
        }
    }

    pub const fn homepage(self) -> &'static str {
        match self {
            Self::Bing => "https://www.bing.com",
            Self::Google => "https://www.google.com",
            Self::Baidu => "https://www.baidu.com",
        }
    }
}

/// An engine resolved from its id: custom engines shadow built-in ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine<'a> {
    Builtin(BuiltinEngine),
    Custom(&'a CustomEngine),
}

impl<'a> Engine<'a> {
    /// Look up `id` among the custom engines of `settings`, then the built-ins.
    pub fn lookup(settings: &'a SettingsRecord, id: &str) -> Option<Self> {
        settings
            .custom_engine(id)
            .map(Engine::Custom)
            .or_else(|| BuiltinEngine::from_id(id).map(Engine::Builtin))
    }

    /// Results page for `query`.
    pub fn search_url(self, query: &str) -> String {
        let encoded = urlencoding::encode(query);
        match self {
            Self::Builtin(engine) => format!("{}{encoded}", engine.search_prefix()),
            Self::Custom(engine) => engine.url.replacen("%s", &encoded, 1),
        }
    }

    /// Landing page; custom engines without a homepage use their URL's origin.
    pub fn homepage_url(self) -> String {
        match self {
            Self::Builtin(engine) => engine.homepage().to_string(),
            Self::Custom(engine) if !engine.homepage.trim().is_empty() => engine.homepage.clone(),
            Self::Custom(engine) => origin_of(&engine.url).unwrap_or_default(),
        }
    }

    /// Search URL, or the homepage when the query is blank.
    pub fn target_url(self, query: &str) -> String {
        let query = query.trim();
        if query.is_empty() {
            self.homepage_url()
        } else {
            self.search_url(query)
        }
    }
}

/// Target URL for `query` on the engine `engine_id`.
pub fn target_url(settings: &SettingsRecord, engine_id: &str, query: &str) -> Result<String> {
    let engine = Engine::lookup(settings, engine_id)
        .ok_or_else(|| Error::InvalidInput(format!("Unknown search engine: {engine_id}")))?;
    Ok(engine.target_url(query))
}

/// Check a user-supplied custom engine before it is added to the settings.
pub fn validate_custom_engine(engine: &CustomEngine) -> Result<()> {
    if engine.id.trim().is_empty() || engine.name.trim().is_empty() {
        return Err(Error::InvalidInput(
            "Custom engine needs an id and a name".into(),
        ));
    }
    if BuiltinEngine::from_id(&engine.id).is_some() {
        return Err(Error::InvalidInput(format!(
            "Custom engine id {} is reserved",
            engine.id
        )));
    }
    if !is_http_url(&engine.url) || !engine.url.contains("%s") {
        return Err(Error::InvalidInput(
            "Custom engine URL must be http(s) and contain %s".into(),
        ));
    }
    Ok(())
}

fn origin_of(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split(['/', '?', '#']).next()?;
    (!host.is_empty()).then(|| format!("{scheme}://{host}"))
}
