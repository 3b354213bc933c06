use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::clip::{ClipConf, ClipId, ClipKind, ClipNode, ClipTree};
use crate::foundation::error::{MontageError, MontageResult};
use crate::session::RenderConfig;

/// Scene file: session configuration at the top level plus the root's children.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SceneDef {
    #[serde(flatten)]
    pub config: RenderConfig,
    #[serde(default)]
    pub children: Vec<ClipDef>,
}

/// One clip in a scene file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClipDef {
    #[serde(rename = "type")]
    pub kind: ClipKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ClipDef>,
    #[serde(flatten)]
    pub conf: ClipConf,
}

fn default_active() -> bool {
    true
}

impl ClipDef {
    pub fn new(kind: ClipKind) -> Self {
        Self {
            kind,
            id: None,
            active: true,
            children: Vec::new(),
            conf: ClipConf::default(),
        }
    }
}

impl SceneDef {
    pub fn from_json(json: &str) -> MontageResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| MontageError::validation(format!("invalid scene json: {e}")))
    }

    pub fn load(path: &Path) -> MontageResult<Self> {
        use anyhow::Context as _;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read scene '{}'", path.display()))?;
        Self::from_json(&text)
    }

    /// Build the clip tree.
    ///
    /// Without an explicit spine, every non-audio top-level clip is moved into an implicit one;
    /// top-level audio stays under the root as background tracks.
    pub fn build_tree(&self) -> MontageResult<ClipTree> {
        self.config.validate()?;

        let mut tree = ClipTree::new(self.config.canvas());
        tree.set_root_duration(self.config.duration.unwrap_or(0.0));

        let spines = self
            .children
            .iter()
            .filter(|c| c.kind == ClipKind::Spine)
            .count();
        if spines > 1 {
            return Err(MontageError::validation(format!(
                "a scene may contain at most one spine, found {spines}"
            )));
        }
        if self.children.iter().any(|c| c.kind == ClipKind::Root) {
            return Err(MontageError::validation("'root' is not a valid clip type"));
        }

        let mut ids = IdGen::default();
        let root = tree.root();
        for def in &self.children {
            add_def(&mut tree, root, def, &mut ids)?;
        }

        if spines == 0 {
            wrap_in_spine(&mut tree, &mut ids)?;
        }
        Ok(tree)
    }
}

fn wrap_in_spine(tree: &mut ClipTree, ids: &mut IdGen) -> MontageResult<()> {
    let root = tree.root();
    let movable: Vec<ClipId> = tree
        .node(root)
        .children()
        .iter()
        .copied()
        .filter(|c| tree.node(*c).kind() != ClipKind::Audio)
        .collect();

    let spine_id = ids.fresh(tree, ClipKind::Spine);
    let spine = tree.insert_child(root, 0, ClipNode::new(ClipKind::Spine, spine_id))?;
    for child in movable {
        tree.reparent(child, spine);
    }
    Ok(())
}

fn add_def(
    tree: &mut ClipTree,
    parent: ClipId,
    def: &ClipDef,
    ids: &mut IdGen,
) -> MontageResult<ClipId> {
    let id = match &def.id {
        Some(id) if !id.trim().is_empty() => id.clone(),
        _ => ids.fresh(tree, def.kind),
    };
    if !def.kind.is_container() && !def.children.is_empty() {
        return Err(MontageError::validation(format!(
            "{}[id={id}] cannot have children",
            def.kind
        )));
    }
    let node = ClipNode::new(def.kind, id)
        .with_conf(def.conf.clone())
        .with_active(def.active);
    let this = tree.add_child(parent, node)?;
    for child in &def.children {
        add_def(tree, this, child, ids)?;
    }
    Ok(this)
}

/// Generates `<kind>_<n>` ids for clips authored without one.
#[derive(Default)]
struct IdGen {
    next: u32,
}

impl IdGen {
    fn fresh(&mut self, tree: &ClipTree, kind: ClipKind) -> String {
        loop {
            let candidate = format!("{kind}_{}", self.next);
            self.next += 1;
            if tree.find(&candidate).is_none() {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
