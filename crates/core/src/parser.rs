//! Parser registry: maps source file names to a parser identity and priority.
//!
//! Parsing itself happens in the workers; the scheduler only needs to know
//! whether a file is parseable and how urgently.

use regex::Regex;

use crate::error::{Error, Result};
use crate::file::basename;

/// A registered parser and the file names it accepts.
#[derive(Debug, Clone)]
pub struct ParserSpec {
    pub name: String,
    pattern: Regex,
    /// Queue priority for files handled by this parser (higher runs first).
    pub priority: i32,
}

impl ParserSpec {
    pub fn new(name: impl Into<String>, pattern: &str, priority: i32) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::config(format!("invalid parser pattern {:?}: {}", pattern, e)))?;
        Ok(Self {
            name: name.into(),
            pattern,
            priority,
        })
    }

    pub fn matches(&self, basename: &str) -> bool {
        self.pattern.is_match(basename)
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Built-in parsers: (name, file name pattern, priority).
const DEFAULT_PARSERS: &[(&str, &str, i32)] = &[
    ("synop", r"^Z__C_EDZW_\d+_.*\.json\.bz2$", 40),
    ("current", r"^\w{5}-BEOB\.csv$", 30),
    ("mosmix", r"^MOSMIX_[SL]_LATEST(_240)?\.kmz$", 20),
    (
        "observations",
        r"^(stunden|10minuten)werte_[A-Za-z0-9]+_\d{5}_(\d{8}_\d{8}_hist|akt|row)\.zip$",
        10,
    ),
];

/// Ordered collection of parsers; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    parsers: Vec<ParserSpec>,
}

impl ParserRegistry {
    pub fn new(parsers: Vec<ParserSpec>) -> Self {
        Self { parsers }
    }

    /// Registry with the built-in parsers.
    pub fn with_defaults() -> Result<Self> {
        let parsers = DEFAULT_PARSERS
            .iter()
            .map(|(name, pattern, priority)| ParserSpec::new(*name, pattern, *priority))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(parsers))
    }

    pub fn register(&mut self, spec: ParserSpec) {
        self.parsers.push(spec);
    }

    pub fn parsers(&self) -> &[ParserSpec] {
        &self.parsers
    }

    /// Finds the parser for a file name.
    pub fn resolve(&self, basename: &str) -> Result<&ParserSpec> {
        self.parsers
            .iter()
            .find(|p| p.matches(basename))
            .ok_or_else(|| Error::unknown_format(basename))
    }

    /// Resolves the parser for a direct single-file request.
    ///
    /// Unlike bulk scheduling, an unknown format here is returned to the
    /// caller as an error; there is nothing to fall back to.
    pub fn resolve_request(&self, request: &ProcessRequest) -> Result<&ParserSpec> {
        self.resolve(request.basename())
    }
}

/// A request to process exactly one file, given by local path and/or URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub path: Option<String>,
    pub url: Option<String>,
}

impl ProcessRequest {
    /// Fails with `InvalidArgument` when neither a path nor a URL is given,
    /// or when the URL is not absolute.
    pub fn new(path: Option<String>, url: Option<String>) -> Result<Self> {
        let path = path.filter(|p| !p.trim().is_empty());
        let url = url.filter(|u| !u.trim().is_empty());
        if path.is_none() && url.is_none() {
            return Err(Error::invalid_argument("please provide either path or url"));
        }
        if let Some(url) = &url {
            url::Url::parse(url)
                .map_err(|e| Error::invalid_argument(format!("invalid url {:?}: {}", url, e)))?;
        }
        Ok(Self { path, url })
    }

    /// Path when given, otherwise the URL.
    pub fn location(&self) -> &str {
        self.path
            .as_deref()
            .or(self.url.as_deref())
            .unwrap_or_default()
    }

    pub fn basename(&self) -> &str {
        basename(self.location())
    }
}
