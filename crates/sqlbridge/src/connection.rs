//! A SQL connection that can host virtual-table modules.

use std::path::{Path, PathBuf};

use sqlbridge_error::{BridgeError, Result};
use sqlbridge_types::Cx;
use sqlbridge_vtab::{Module, ModuleRegistration, ModuleRegistry};

/// A `rusqlite` connection plus the modules registered on it.
///
/// Modules receive a child of the connection's [`Cx`]; cancelling
/// [`Connection::cx`] makes every later host callback on this connection
/// fail with [`BridgeError::Cancelled`].
pub struct Connection {
    conn: rusqlite::Connection,
    registry: ModuleRegistry,
    cx: Cx,
}

impl Connection {
    /// Open (creating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::CannotOpen`] with the engine's reason.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = rusqlite::Connection::open(path).map_err(|err| BridgeError::CannotOpen {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })?;
        tracing::debug!(target: "sqlbridge", path = %path.display(), "connection opened");
        Ok(Self::from_rusqlite(conn))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// [`BridgeError::CannotOpen`] if the engine cannot allocate one.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(|err| BridgeError::CannotOpen {
            path: PathBuf::from(":memory:"),
            detail: err.to_string(),
        })?;
        Ok(Self::from_rusqlite(conn))
    }

    /// Adopt an already open connection. Modules registered on it through
    /// other means are not listed by [`Connection::modules`].
    #[must_use]
    pub fn from_rusqlite(conn: rusqlite::Connection) -> Self {
        Self {
            conn,
            registry: ModuleRegistry::new(),
            cx: Cx::new(),
        }
    }

    /// The underlying connection, for running SQL.
    #[must_use]
    pub const fn sql(&self) -> &rusqlite::Connection {
        &self.conn
    }

    /// The context handed to this connection's modules.
    #[must_use]
    pub const fn cx(&self) -> &Cx {
        &self.cx
    }

    /// Register `module` under `name`, replacing any module of that name.
    /// `None` drops the name, like [`Connection::drop_module`].
    ///
    /// # Errors
    ///
    /// [`BridgeError::InteriorNul`] for an unrepresentable name, or the
    /// engine's refusal.
    #[allow(unsafe_code)]
    pub fn register_module<M: Module>(&mut self, name: &str, module: Option<M>) -> Result<()> {
        let Some(module) = module else {
            return self.drop_module(name);
        };
        let cx = self.cx.create_child();
        // SAFETY: the handle belongs to `self.conn`, which owns the registry's
        // registrations for as long as it stays open.
        unsafe {
            self.registry
                .register(self.conn.handle(), name, Some(module), &cx)
        }
    }

    /// Drop the module registered under `name`. Tables already connected
    /// through it keep working until they disconnect; new tables fail with
    /// "no such module".
    ///
    /// # Errors
    ///
    /// [`BridgeError::InteriorNul`] for an unrepresentable name, or the
    /// engine's refusal.
    #[allow(unsafe_code)]
    pub fn drop_module(&mut self, name: &str) -> Result<()> {
        // SAFETY: as in `register_module`.
        unsafe { self.registry.unregister(self.conn.handle(), name) }
    }

    /// What is registered under `name`, if anything.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&ModuleRegistration> {
        self.registry.get(name)
    }

    /// Registered module names, sorted.
    #[must_use]
    pub fn modules(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Close the connection, releasing every registered module.
    ///
    /// # Errors
    ///
    /// The engine's close status, typically BUSY while statements are
    /// still outstanding.
    pub fn close(self) -> Result<()> {
        let modules = self.registry.len();
        self.conn.close().map_err(|(_, err)| sql_error(err))?;
        tracing::debug!(target: "sqlbridge", modules, "connection closed");
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.conn.path())
            .field("modules", &self.registry.names())
            .finish_non_exhaustive()
    }
}

/// Translate a driver error into the bridge taxonomy.
#[must_use]
pub fn sql_error(err: rusqlite::Error) -> BridgeError {
    match err {
        rusqlite::Error::SqliteFailure(failure, message) => BridgeError::Engine {
            code: failure.extended_code,
            message: message.unwrap_or_else(|| failure.to_string()),
        },
        rusqlite::Error::NulError(_) => BridgeError::InteriorNul {
            what: "SQL text".to_owned(),
        },
        other => BridgeError::internal(other.to_string()),
    }
}
