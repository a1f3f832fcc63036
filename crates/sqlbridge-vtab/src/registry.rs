//! Per-connection module registry.

use std::collections::HashMap;
use std::ptr;

use sqlbridge_error::Result;
use sqlbridge_native::{error_from_handle, ffi, to_cstring};
use sqlbridge_types::cx::Cx;

use crate::dispatch::{HostModule, drop_host};
use crate::module::Module;

/// What the registry remembers about a registered module name.
///
/// The dispatch table itself belongs to the engine once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRegistration {
    name: String,
    version: i32,
    type_name: &'static str,
}

impl ModuleRegistration {
    /// The name as given at registration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `iVersion` the dispatch table advertises.
    #[must_use]
    pub const fn version(&self) -> i32 {
        self.version
    }

    /// Rust type name of the module.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Module names registered on one connection.
///
/// Names are case-insensitive, as they are to the engine. Replacing or
/// dropping a name while tables created from it are still connected is
/// allowed; the engine keeps the old dispatch table alive for them.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleRegistration>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `module` under `name` on `db`, replacing any module already
    /// registered there. `None` drops the name.
    ///
    /// # Errors
    ///
    /// Marshaling errors for `name`, or the engine's refusal. On failure the
    /// engine has already released the module.
    ///
    /// # Safety
    ///
    /// `db` must be the live connection this registry belongs to.
    pub unsafe fn register<M: Module>(
        &mut self,
        db: *mut ffi::sqlite3,
        name: &str,
        module: Option<M>,
        cx: &Cx,
    ) -> Result<()> {
        let Some(module) = module else {
            return self.unregister(db, name);
        };
        let c_name = to_cstring("module name", name)?;
        let host = Box::into_raw(HostModule::new(name, module, cx.clone()));
        let version = (*host).version();

        let rc = ffi::sqlite3_create_module_v2(
            db,
            c_name.as_ptr(),
            HostModule::native_ptr(host),
            host.cast(),
            Some(drop_host::<M>),
        );
        if rc != ffi::SQLITE_OK {
            let err = error_from_handle(db, rc);
            tracing::warn!(target: "sqlbridge.vtab", module = name, error = %err, "module registration failed");
            return Err(err);
        }

        let registration = ModuleRegistration {
            name: name.to_owned(),
            version,
            type_name: std::any::type_name::<M>(),
        };
        let replaced = self
            .modules
            .insert(name.to_ascii_lowercase(), registration)
            .is_some();
        tracing::info!(
            target: "sqlbridge.vtab",
            module = name,
            version,
            replaced,
            "module registered"
        );
        Ok(())
    }

    /// Drop `name` from `db`. Dropping a name that was never registered is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Marshaling errors for `name`, or the engine's refusal.
    ///
    /// # Safety
    ///
    /// `db` must be the live connection this registry belongs to.
    pub unsafe fn unregister(&mut self, db: *mut ffi::sqlite3, name: &str) -> Result<()> {
        let c_name = to_cstring("module name", name)?;
        let rc = ffi::sqlite3_create_module_v2(db, c_name.as_ptr(), ptr::null(), ptr::null_mut(), None);
        if rc != ffi::SQLITE_OK {
            return Err(error_from_handle(db, rc));
        }
        if self.modules.remove(&name.to_ascii_lowercase()).is_some() {
            tracing::info!(target: "sqlbridge.vtab", module = name, "module dropped");
        } else {
            tracing::debug!(target: "sqlbridge.vtab", module = name, "drop of unregistered module");
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ModuleRegistration> {
        self.modules.get(&name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.values().map(ModuleRegistration::name).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

