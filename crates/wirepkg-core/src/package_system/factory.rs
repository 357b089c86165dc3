//! Builds [`Component`]s from manifest entries.
use std::path::{Component as PathComponent, Path, PathBuf};
use std::sync::Arc;

use globset::{GlobBuilder, GlobSetBuilder};
use walkdir::WalkDir;

use crate::kernel::constants;
use crate::package_system::component::{
    Component, ComponentKind, DissectorComponent, FileComponent, FilterMacroComponent,
    LibraryComponent, PanelComponent, RendererComponent, StyleComponent, TokenComponent,
};
use crate::package_system::error::PackageSystemError;
use crate::package_system::manifest::ComponentEntry;
use crate::package_system::session::SessionRegistry;

type FactoryResult<T> = std::result::Result<T, PackageSystemError>;

/// Validates manifest entries and turns them into components. Only reads
/// the filesystem.
#[derive(Debug, Clone)]
pub struct ComponentFactory {
    session: Arc<dyn SessionRegistry>,
    build_profiles: Vec<String>,
}

impl ComponentFactory {
    pub fn new(session: Arc<dyn SessionRegistry>, build_profiles: Vec<String>) -> Self {
        Self { session, build_profiles }
    }

    pub fn create(&self, entry: &ComponentEntry, dir: &Path) -> FactoryResult<Box<dyn Component>> {
        let kind: ComponentKind = entry
            .kind
            .parse()
            .map_err(|e| PackageSystemError::construction(&entry.kind, dir, format!("{}", e)))?;
        let session = Arc::clone(&self.session);

        let component: Box<dyn Component> = match kind {
            ComponentKind::Token => {
                Box::new(TokenComponent::new(session, self.resolve_files(kind, entry, dir)?))
            }
            ComponentKind::Style => {
                Box::new(StyleComponent::new(session, self.resolve_files(kind, entry, dir)?))
            }
            ComponentKind::PacketDissector | ComponentKind::StreamDissector => {
                let library = self.resolve_main(kind, entry, dir)?;
                Box::new(DissectorComponent::new(session, kind == ComponentKind::StreamDissector, library))
            }
            ComponentKind::AttrRenderer | ComponentKind::LayerRenderer => {
                let id = entry
                    .id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| PackageSystemError::construction(kind.as_str(), dir, "id field required"))?;
                let module = self.resolve_main(kind, entry, dir)?;
                Box::new(RendererComponent::new(session, kind == ComponentKind::LayerRenderer, id, module))
            }
            ComponentKind::Panel => {
                let module = self.resolve_main(kind, entry, dir)?;
                Box::new(PanelComponent::new(session, module, entry.name.clone(), entry.slot.clone()))
            }
            ComponentKind::FilterMacro => {
                Box::new(FilterMacroComponent::new(session, self.resolve_main(kind, entry, dir)?))
            }
            ComponentKind::FileImporter | ComponentKind::FileExporter => {
                let module = self.resolve_main(kind, entry, dir)?;
                Box::new(FileComponent::new(
                    session,
                    kind == ComponentKind::FileExporter,
                    module,
                    entry.extensions.clone(),
                ))
            }
            ComponentKind::Library => {
                Box::new(LibraryComponent::new(session, self.resolve_main(kind, entry, dir)?))
            }
        };
        Ok(component)
    }

    fn resolve_files(&self, kind: ComponentKind, entry: &ComponentEntry, dir: &Path) -> FactoryResult<Vec<PathBuf>> {
        entry
            .files
            .iter()
            .map(|file| -> FactoryResult<PathBuf> {
                check_relative(file).map_err(|message| PackageSystemError::construction(kind.as_str(), dir, message))?;
                Ok(dir.join(file))
            })
            .collect()
    }

    /// Resolves `main`: the literal path first, then a compiled native
    /// artifact under `crates/<main>/target/<profile>/`.
    fn resolve_main(&self, kind: ComponentKind, entry: &ComponentEntry, dir: &Path) -> FactoryResult<PathBuf> {
        let main = entry
            .main
            .as_deref()
            .filter(|main| !main.is_empty())
            .ok_or_else(|| PackageSystemError::construction(kind.as_str(), dir, "main field required"))?;
        check_relative(main).map_err(|message| PackageSystemError::construction(kind.as_str(), dir, message))?;

        let literal = dir.join(main);
        if literal.is_file() {
            return Ok(literal);
        }

        self.find_native_artifact(dir, main)
            .map_err(|message| PackageSystemError::construction(kind.as_str(), dir, message))?
            .ok_or_else(|| {
                PackageSystemError::construction(
                    kind.as_str(),
                    dir,
                    format!("could not resolve {} in {}", main, dir.display()),
                )
            })
    }

    fn find_native_artifact(&self, dir: &Path, main: &str) -> std::result::Result<Option<PathBuf>, String> {
        let target_dir = dir.join("crates").join(main).join("target");
        if !target_dir.is_dir() {
            return Ok(None);
        }

        let mut builder = GlobSetBuilder::new();
        for profile in &self.build_profiles {
            let pattern = format!("{}/*.{{{}}}", profile, constants::NATIVE_LIBRARY_EXTENSIONS.join(","));
            let glob = GlobBuilder::new(&pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| format!("invalid build profile '{}': {}", profile, e))?;
            builder.add(glob);
        }
        let matcher = builder.build().map_err(|e| e.to_string())?;

        let mut matches: Vec<PathBuf> = WalkDir::new(&target_dir)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .strip_prefix(&target_dir)
                    .is_ok_and(|relative| matcher.is_match(relative))
            })
            .map(|entry| entry.into_path())
            .collect();

        let host_ext = std::env::consts::DLL_EXTENSION;
        matches.sort_by(|a, b| {
            let a_foreign = a.extension().is_none_or(|ext| ext != host_ext);
            let b_foreign = b.extension().is_none_or(|ext| ext != host_ext);
            a_foreign.cmp(&b_foreign).then_with(|| a.cmp(b))
        });

        if let Some(found) = matches.first() {
            log::debug!("Resolved {} to native artifact {}", main, found.display());
        }
        Ok(matches.into_iter().next())
    }
}

fn check_relative(reference: &str) -> std::result::Result<(), String> {
    let path = Path::new(reference);
    if path.is_absolute() || path.has_root() {
        return Err(format!("'{}' must be relative to the package directory", reference));
    }
    if path.components().any(|c| c == PathComponent::ParentDir) {
        return Err(format!("'{}' must not leave the package directory", reference));
    }
    Ok(())
}
