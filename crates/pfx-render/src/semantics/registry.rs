// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Name → producer lookup for automatic semantics.

use super::{ModelSemantic, NodeSemantic};
use ahash::AHashMap;
use std::sync::OnceLock;

/// Highest bone index addressable by name (`BONEMATRIX99`).
const MAX_BONE_INDEX: u32 = 99;
/// Highest camera index addressable by name (`VIEWMATRIX9`).
const MAX_CAMERA_INDEX: u32 = 9;
/// Highest light index addressable by name (`LIGHTPOS99`).
const MAX_LIGHT_INDEX: u32 = 99;

#[derive(Debug)]
struct Table<T> {
    exact: AHashMap<String, T>,
    indexed: AHashMap<String, (fn(u32) -> T, u32)>,
}

impl<T: Copy> Table<T> {
    fn new() -> Self {
        Self {
            exact: AHashMap::new(),
            indexed: AHashMap::new(),
        }
    }

    fn alias(&mut self, names: &[&str], value: T) {
        for name in names {
            self.exact.insert((*name).to_string(), value);
        }
    }

    /// Names taking a trailing index up to `max`.
    fn indexed(&mut self, names: &[&str], make: fn(u32) -> T, max: u32) {
        for name in names {
            self.indexed.insert((*name).to_string(), (make, max));
        }
    }

    /// Same as `indexed`, and the bare name means index 0.
    fn indexed_or_zero(&mut self, names: &[&str], make: fn(u32) -> T, max: u32) {
        self.alias(names, make(0));
        self.indexed(names, make, max);
    }

    fn lookup(&self, name: &str) -> Option<T> {
        let upper = name.to_ascii_uppercase();
        if let Some(value) = self.exact.get(&upper) {
            return Some(*value);
        }
        let base = upper.trim_end_matches(|c: char| c.is_ascii_digit());
        if base.len() == upper.len() {
            return None;
        }
        let index: u32 = upper[base.len()..].parse().ok()?;
        let (make, max) = self.indexed.get(base)?;
        (index <= *max).then(|| make(index))
    }
}

/// The table of every semantic the render manager can compute.
///
/// Lookups are case-insensitive. Names ending in a decimal index (`BONE12`,
/// `LIGHTPOS3`, `VIEWMATRIX1`) select a bone, light or camera.
#[derive(Debug)]
pub struct SemanticRegistry {
    node: Table<NodeSemantic>,
    model: Table<ModelSemantic>,
}

impl SemanticRegistry {
    /// The process-wide registry, built on first use.
    pub fn global() -> &'static SemanticRegistry {
        static REGISTRY: OnceLock<SemanticRegistry> = OnceLock::new();
        REGISTRY.get_or_init(SemanticRegistry::build)
    }

    /// Resolves a per-node semantic.
    pub fn node_producer(&self, name: &str) -> Option<NodeSemantic> {
        self.node.lookup(name)
    }

    /// Resolves a per-model semantic.
    pub fn model_producer(&self, name: &str) -> Option<ModelSemantic> {
        self.model.lookup(name)
    }

    fn build() -> Self {
        let mut node = Table::new();
        node.alias(
            &[
                "WORLD",
                "WORLDMATRIX",
                "WORLDMTX",
                "MODEL",
                "MODELMATRIX",
                "MODELMTX",
                "MODELWORLD",
                "MODELWORLDMATRIX",
                "MODELWORLDMTX",
            ],
            NodeSemantic::WorldMatrix,
        );
        node.alias(
            &[
                "WORLDIT",
                "WORLDITMATRIX",
                "WORLDITMTX",
                "WORLDMATRIXIT",
                "WORLDMTXIT",
                "MODELIT",
                "MODELITMATRIX",
                "MODELITMTX",
                "MODELMATRIXIT",
                "MODELMTXIT",
                "MODELWORLDIT",
                "MODELWORLDITMATRIX",
                "MODELWORLDITMTX",
                "MODELWORLDMATRIXIT",
                "MODELWORLDMTXIT",
            ],
            NodeSemantic::WorldMatrixIT,
        );
        node.alias(
            &["MODELVIEW", "MODELVIEWMATRIX", "MODELVIEWMTX", "MV", "MVMATRIX", "MVMTX"],
            NodeSemantic::ModelView,
        );
        node.alias(
            &[
                "MODELVIEWPROJECTION",
                "MODELVIEWPROJECTIONMATRIX",
                "MODELVIEWPROJECTIONMTX",
                "MVP",
                "MVPMATRIX",
                "MVPMTX",
            ],
            NodeSemantic::ModelViewProjection,
        );
        node.alias(&["BONECOUNT", "NUMBONES"], NodeSemantic::BoneCount);
        node.alias(
            &["BONE", "BONEMTX", "BONEMATRIX", "BONEMATRICES", "BONEMATRIXARRAY"],
            NodeSemantic::BoneMatrices,
        );
        node.alias(
            &[
                "BONEIT",
                "BONEMTXIT",
                "BONEMATRIXIT",
                "BONEMATRICESIT",
                "BONEMATRIXARRAYIT",
                "BONEMATRICESITARRAY",
                "BONEMATRIXITARRAY",
            ],
            NodeSemantic::BoneMatricesIT,
        );
        node.indexed(&["BONE", "BONEMTX", "BONEMATRIX"], NodeSemantic::BoneMatrix, MAX_BONE_INDEX);
        node.indexed(
            &["BONEIT", "BONEMTXIT", "BONEMATRIXIT"],
            NodeSemantic::BoneMatrixIT,
            MAX_BONE_INDEX,
        );

        let mut model = Table::new();
        model.indexed_or_zero(
            &[
                "PROJECTION",
                "PROJECTIONMATRIX",
                "PROJECTIONMTX",
                "PERSPECTIVE",
                "PERSPECTIVEMATRIX",
                "PERSPECTIVEMTX",
            ],
            ModelSemantic::Projection,
            MAX_CAMERA_INDEX,
        );
        model.indexed_or_zero(
            &["VIEW", "VIEWMATRIX", "VIEWMTX"],
            ModelSemantic::View,
            MAX_CAMERA_INDEX,
        );
        model.indexed_or_zero(
            &[
                "VIEWPROJECTION",
                "VIEWPROJECTIONMATRIX",
                "VIEWPROJECTIONMTX",
                "VIEWPROJ",
                "VIEWPROJMATRIX",
                "VIEWPROJMTX",
                "VPMATRIX",
            ],
            ModelSemantic::ViewProjection,
            MAX_CAMERA_INDEX,
        );
        model.indexed_or_zero(
            &["LIGHTPOSITION", "LIGHTPOS"],
            ModelSemantic::LightPosition,
            MAX_LIGHT_INDEX,
        );
        model.indexed_or_zero(
            &["LIGHTDIRECTION", "LIGHTDIR"],
            ModelSemantic::LightDirection,
            MAX_LIGHT_INDEX,
        );
        model.indexed_or_zero(
            &["LIGHTCOLOR", "LIGHTCOLOUR"],
            ModelSemantic::LightColor,
            MAX_LIGHT_INDEX,
        );

        Self { node, model }
    }
}
