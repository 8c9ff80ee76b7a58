use std::{fmt, str::FromStr};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::trace;

use crate::error::{Error, OgmResult};

mod source;
pub use source::*;

/// How index and constraint definitions are handled at startup.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AutoIndexMode {
    #[default]
    None,
    Assert,
    Validate,
    Dump,
    Update,
}

impl FromStr for AutoIndexMode {
    type Err = Error;

    fn from_str(s: &str) -> OgmResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(AutoIndexMode::None),
            "assert" => Ok(AutoIndexMode::Assert),
            "validate" => Ok(AutoIndexMode::Validate),
            "dump" => Ok(AutoIndexMode::Dump),
            "update" => Ok(AutoIndexMode::Update),
            other => Err(Error::configuration(format!(
                "invalid auto index mode `{other}`"
            ))),
        }
    }
}

/// The transport a URI scheme calls for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DriverKind {
    Http,
    Bolt,
    Embedded,
    Memory,
}

impl DriverKind {
    fn from_scheme(scheme: &str) -> OgmResult<DriverKind> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" | "https" => Ok(DriverKind::Http),
            "bolt" | "bolt+s" | "bolt+routing" | "neo4j" | "neo4j+s" => Ok(DriverKind::Bolt),
            "file" => Ok(DriverKind::Embedded),
            "memory" | "mem" => Ok(DriverKind::Memory),
            other => Err(Error::configuration(format!(
                "no known driver for URI scheme `{other}`"
            ))),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DriverKind::Http => "http",
            DriverKind::Bolt => "bolt",
            DriverKind::Embedded => "embedded",
            DriverKind::Memory => "memory",
        })
    }
}

/// Credentials used to authenticate against the store.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Credentials {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the base64 encoded `username:password` pair, as used by basic
    /// authentication.
    pub fn token(&self) -> String {
        BASE64.encode(format!("{}:{}", self.username, self.password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolved configuration. Immutable; see [`ConfigurationBuilder`].
#[derive(Debug, Clone)]
pub struct Configuration {
    uri: String,
    driver_kind: DriverKind,
    credentials: Option<Credentials>,
    connection_pool_size: usize,
    encryption_level: Option<String>,
    trust_strategy: Option<String>,
    trust_cert_file: Option<String>,
    connection_liveness_check_timeout: Option<u64>,
    auto_index: AutoIndexMode,
    dump_dir: String,
    dump_filename: String,
    fetch_size: usize,
}

impl Configuration {
    pub const DEFAULT_POOL_SIZE: usize = 50;
    pub const DEFAULT_FETCH_SIZE: usize = 100;
    pub const DEFAULT_DUMP_DIR: &'static str = ".";
    pub const DEFAULT_DUMP_FILENAME: &'static str = "generated_indexes.cql";

    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// The store URI, without any user information.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn driver_kind(&self) -> DriverKind {
        self.driver_kind
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn connection_pool_size(&self) -> usize {
        self.connection_pool_size
    }

    pub fn encryption_level(&self) -> Option<&str> {
        self.encryption_level.as_deref()
    }

    pub fn trust_strategy(&self) -> Option<&str> {
        self.trust_strategy.as_deref()
    }

    pub fn trust_cert_file(&self) -> Option<&str> {
        self.trust_cert_file.as_deref()
    }

    /// Liveness check timeout, in milliseconds.
    pub fn connection_liveness_check_timeout(&self) -> Option<u64> {
        self.connection_liveness_check_timeout
    }

    pub fn auto_index(&self) -> AutoIndexMode {
        self.auto_index
    }

    pub fn dump_dir(&self) -> &str {
        &self.dump_dir
    }

    pub fn dump_filename(&self) -> &str {
        &self.dump_filename
    }

    /// Maximum number of rows pulled from a driver at once.
    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }
}

/// Builds a [`Configuration`]. Validation happens in [`build`].
///
/// [`build`]: ConfigurationBuilder::build
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    uri: Option<String>,
    credentials: Option<Credentials>,
    connection_pool_size: Option<usize>,
    encryption_level: Option<String>,
    trust_strategy: Option<String>,
    trust_cert_file: Option<String>,
    connection_liveness_check_timeout: Option<u64>,
    auto_index: Option<AutoIndexMode>,
    dump_dir: Option<String>,
    dump_filename: Option<String>,
    fetch_size: Option<usize>,
}

impl ConfigurationBuilder {
    pub fn new() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// Starts a builder from the properties of the given source.
    pub fn from_source(source: &dyn ConfigurationSource) -> OgmResult<ConfigurationBuilder> {
        let mut builder = ConfigurationBuilder::new();
        let mut username = None;
        let mut password = None;

        for (key, value) in source.properties() {
            let name = key
                .strip_prefix("spring.data.ogm.")
                .or_else(|| key.strip_prefix("ogm."))
                .unwrap_or(key);
            builder = match name {
                "URI" | "uri" => builder.uri(value),
                "username" => {
                    username = Some(value.clone());
                    builder
                }
                "password" => {
                    password = Some(value.clone());
                    builder
                }
                "connection.pool.size" => builder.connection_pool_size(parse_number(key, value)?),
                "encryption.level" => builder.encryption_level(value),
                "trust.strategy" => builder.trust_strategy(value),
                "trust.certificate.file" => builder.trust_cert_file(value),
                "connection.liveness.check.timeout" => {
                    builder.connection_liveness_check_timeout(parse_number(key, value)?)
                }
                "indexes.auto" => builder.auto_index(value.parse()?),
                "indexes.auto.dump.dir" => builder.generated_indexes_output_dir(value),
                "indexes.auto.dump.filename" => builder.generated_indexes_output_filename(value),
                "fetch.size" => builder.fetch_size(parse_number(key, value)?),
                _ => {
                    trace!(%key, "ignoring unknown configuration property");
                    builder
                }
            };
        }

        if let Some(username) = username {
            builder = builder.credentials(username, password.unwrap_or_default());
        }
        Ok(builder)
    }

    /// Sets the store URI. User information (`user:password@`) is moved into
    /// the credentials, unless explicit credentials are also given.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn connection_pool_size(mut self, size: usize) -> Self {
        self.connection_pool_size = Some(size);
        self
    }

    pub fn encryption_level(mut self, level: impl Into<String>) -> Self {
        self.encryption_level = Some(level.into());
        self
    }

    pub fn trust_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.trust_strategy = Some(strategy.into());
        self
    }

    pub fn trust_cert_file(mut self, path: impl Into<String>) -> Self {
        self.trust_cert_file = Some(path.into());
        self
    }

    pub fn connection_liveness_check_timeout(mut self, millis: u64) -> Self {
        self.connection_liveness_check_timeout = Some(millis);
        self
    }

    pub fn auto_index(mut self, mode: AutoIndexMode) -> Self {
        self.auto_index = Some(mode);
        self
    }

    pub fn generated_indexes_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    pub fn generated_indexes_output_filename(mut self, filename: impl Into<String>) -> Self {
        self.dump_filename = Some(filename.into());
        self
    }

    pub fn fetch_size(mut self, rows: usize) -> Self {
        self.fetch_size = Some(rows);
        self
    }

    /// Validates and resolves the configuration.
    pub fn build(self) -> OgmResult<Configuration> {
        let raw_uri = self
            .uri
            .ok_or_else(|| Error::configuration("no URI configured"))?;
        let parsed = ParsedUri::parse(&raw_uri)?;
        let driver_kind = DriverKind::from_scheme(parsed.scheme)?;

        let connection_pool_size = self
            .connection_pool_size
            .unwrap_or(Configuration::DEFAULT_POOL_SIZE);
        if connection_pool_size == 0 {
            return Err(Error::configuration("connection pool size must be positive"));
        }
        let fetch_size = self.fetch_size.unwrap_or(Configuration::DEFAULT_FETCH_SIZE);
        if fetch_size == 0 {
            return Err(Error::configuration("fetch size must be positive"));
        }

        Ok(Configuration {
            uri: parsed.uri,
            driver_kind,
            credentials: self.credentials.or(parsed.credentials),
            connection_pool_size,
            encryption_level: self.encryption_level,
            trust_strategy: self.trust_strategy,
            trust_cert_file: self.trust_cert_file,
            connection_liveness_check_timeout: self.connection_liveness_check_timeout,
            auto_index: self.auto_index.unwrap_or_default(),
            dump_dir: self
                .dump_dir
                .unwrap_or_else(|| Configuration::DEFAULT_DUMP_DIR.into()),
            dump_filename: self
                .dump_filename
                .unwrap_or_else(|| Configuration::DEFAULT_DUMP_FILENAME.into()),
            fetch_size,
        })
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> OgmResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::configuration(format!("invalid number `{value}` for `{key}`")))
}

/// A URI split into its scheme, the URI without user information, and the
/// credentials found in the user information.
struct ParsedUri<'a> {
    scheme: &'a str,
    uri: String,
    credentials: Option<Credentials>,
}

impl ParsedUri<'_> {
    fn parse(raw: &str) -> OgmResult<ParsedUri<'_>> {
        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| Error::configuration(format!("URI `{raw}` has no scheme")))?;
        let valid_scheme = scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(Error::configuration(format!(
                "URI `{raw}` has an invalid scheme"
            )));
        }

        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);
        let Some((user_info, host)) = authority.rsplit_once('@') else {
            return Ok(ParsedUri {
                scheme,
                uri: raw.to_owned(),
                credentials: None,
            });
        };

        let (username, password) = user_info.split_once(':').unwrap_or((user_info, ""));
        Ok(ParsedUri {
            scheme,
            uri: format!("{scheme}://{host}{tail}"),
            credentials: Some(Credentials::new(username, password)),
        })
    }
}
