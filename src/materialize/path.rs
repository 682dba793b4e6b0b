//! Output path resolution
//!
//! Paths come from a fixed table keyed by artifact kind and architecture.
//! Each entry is a path template over the entity's derived names:
//! `{kebab}`, `{snake}`, `{pascal}` and the file extension `{ext}`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::naming::NameSet;
use crate::options::Architecture;

/// What a rendered file is, which decides where it goes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ArtifactKind {
    Entity,
    Dto,
    Service,
    Controller,
    Module,
    Test,
    Readme,
    Other,
}

impl ArtifactKind {
    /// Kind named by a template category, or failing that, contained in its code
    pub fn for_template(category: &str, code: &str) -> ArtifactKind {
        if let Ok(kind) = category.trim().parse::<ArtifactKind>() {
            return kind;
        }
        let code = code.to_lowercase();
        ArtifactKind::iter()
            .filter(|k| *k != ArtifactKind::Other)
            .find(|k| code.contains(&k.to_string()))
            .unwrap_or(ArtifactKind::Other)
    }
}

const FLAT: &[(ArtifactKind, &str)] = &[
    (ArtifactKind::Entity, "src/entities/{kebab}.entity.{ext}"),
    (ArtifactKind::Dto, "src/dto/{kebab}.dto.{ext}"),
    (ArtifactKind::Service, "src/services/{kebab}.service.{ext}"),
    (ArtifactKind::Controller, "src/controllers/{kebab}.controller.{ext}"),
    (ArtifactKind::Module, "src/modules/{kebab}.module.{ext}"),
    (ArtifactKind::Test, "test/{kebab}.spec.{ext}"),
    (ArtifactKind::Readme, "docs/{kebab}.md"),
    (ArtifactKind::Other, "src/generated/{kebab}.{ext}"),
];

const LAYERED: &[(ArtifactKind, &str)] = &[
    (ArtifactKind::Entity, "src/base/entities/{kebab}.base.entity.{ext}"),
    (ArtifactKind::Dto, "src/base/dto/{kebab}.base.dto.{ext}"),
    (ArtifactKind::Service, "src/base/services/{kebab}.base.service.{ext}"),
    (ArtifactKind::Controller, "src/base/controllers/{kebab}.base.controller.{ext}"),
    (ArtifactKind::Module, "src/biz/modules/{kebab}.biz.module.{ext}"),
    (ArtifactKind::Test, "test/{kebab}.spec.{ext}"),
    (ArtifactKind::Readme, "docs/{kebab}.md"),
    (ArtifactKind::Other, "src/biz/generated/{kebab}.biz.{ext}"),
];

fn path_template(kind: ArtifactKind, architecture: Architecture) -> &'static str {
    let table = match architecture {
        Architecture::Flat => FLAT,
        Architecture::Layered => LAYERED,
    };
    table
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, template)| *template)
        .unwrap_or("src/generated/{kebab}.{ext}")
}

/// Relative output path for one artifact of one entity
pub fn resolve_path(
    kind: ArtifactKind,
    names: &NameSet,
    architecture: Architecture,
    extension: &str,
) -> PathBuf {
    let path = path_template(kind, architecture)
        .replace("{kebab}", &names.kebab)
        .replace("{snake}", &names.snake)
        .replace("{pascal}", &names.pascal)
        .replace("{ext}", extension);
    PathBuf::from(path)
}

/// Relative path of one join query artifact, `src/<kebab>-join/<kebab>-join.<suffix>`
pub fn resolve_join_path(names: &NameSet, suffix: &str) -> PathBuf {
    PathBuf::from(format!("src/{0}-join/{0}-join.{1}", names.kebab, suffix))
}
